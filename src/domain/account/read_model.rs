use async_trait::async_trait;
use scylla::client::session::Session;
use scylla::statement::unprepared::Statement;
use scylla::statement::{Consistency, SerialConsistency};
use scylla::value::{CqlValue, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::value_objects::Money;

// ============================================================================
// Account Read Model
// ============================================================================
//
// One denormalized row per account. Every write carries the version of the
// event that produced it, and a write only lands on a row holding an older
// version. Redelivering an event is therefore a no-op.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct AccountSummary {
    pub account_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub balance: Money,
    pub version: i64,
}

/// Outcome of a guarded read-model write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryWrite {
    Applied,
    /// The row already reflects this version or a later one
    Stale,
    /// No row exists for the account yet
    Missing,
}

#[async_trait]
pub trait AccountSummaryStore: Send + Sync {
    /// Insert the row unless it already exists
    async fn create(&self, summary: &AccountSummary) -> anyhow::Result<SummaryWrite>;

    /// Overwrite the balance when `version` is newer than the stored one
    async fn set_balance(&self, account_id: Uuid, balance: Money, version: i64) -> anyhow::Result<SummaryWrite>;

    async fn get(&self, account_id: Uuid) -> anyhow::Result<Option<AccountSummary>>;
}

// ============================================================================
// In-Memory Store
// ============================================================================

#[derive(Default)]
pub struct InMemoryAccountSummaryStore {
    rows: RwLock<HashMap<Uuid, AccountSummary>>,
}

impl InMemoryAccountSummaryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountSummaryStore for InMemoryAccountSummaryStore {
    async fn create(&self, summary: &AccountSummary) -> anyhow::Result<SummaryWrite> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&summary.account_id) {
            return Ok(SummaryWrite::Stale);
        }
        rows.insert(summary.account_id, summary.clone());
        Ok(SummaryWrite::Applied)
    }

    async fn set_balance(&self, account_id: Uuid, balance: Money, version: i64) -> anyhow::Result<SummaryWrite> {
        let mut rows = self.rows.write().await;
        let Some(row) = rows.get_mut(&account_id) else {
            return Ok(SummaryWrite::Missing);
        };
        if row.version >= version {
            return Ok(SummaryWrite::Stale);
        }
        row.balance = balance;
        row.version = version;
        Ok(SummaryWrite::Applied)
    }

    async fn get(&self, account_id: Uuid) -> anyhow::Result<Option<AccountSummary>> {
        Ok(self.rows.read().await.get(&account_id).cloned())
    }
}

// ============================================================================
// ScyllaDB Store
// ============================================================================
//
//   account_summary (account_id uuid PRIMARY KEY, first_name text,
//                    last_name text, balance_cents bigint, version bigint)
//
// Both writes are LWTs so the version guard is evaluated atomically.
//
// ============================================================================

pub const ACCOUNT_SUMMARY_TABLE: &str = "account_summary";

pub struct ScyllaAccountSummaryStore {
    session: Arc<Session>,
}

impl ScyllaAccountSummaryStore {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        self.session
            .query_unpaged(
                "CREATE TABLE IF NOT EXISTS account_summary (
                    account_id uuid PRIMARY KEY,
                    first_name text,
                    last_name text,
                    balance_cents bigint,
                    version bigint
                )",
                &[],
            )
            .await?;

        tracing::info!(table = ACCOUNT_SUMMARY_TABLE, "Account summary table ready");
        Ok(())
    }

    fn lwt(query: &str) -> Statement {
        let mut statement = Statement::new(query);
        statement.set_consistency(Consistency::Quorum);
        statement.set_serial_consistency(Some(SerialConsistency::Serial));
        statement
    }
}

/// Read `[applied]` and the current `version` column of an LWT result row
fn lwt_outcome(row: Option<Row>) -> SummaryWrite {
    let Some(row) = row else {
        return SummaryWrite::Missing;
    };
    match row.columns.first() {
        Some(Some(CqlValue::Boolean(true))) => SummaryWrite::Applied,
        _ => {
            let has_version = row
                .columns
                .iter()
                .skip(1)
                .any(|column| matches!(column, Some(CqlValue::BigInt(_))));
            if has_version {
                SummaryWrite::Stale
            } else {
                SummaryWrite::Missing
            }
        }
    }
}

#[async_trait]
impl AccountSummaryStore for ScyllaAccountSummaryStore {
    async fn create(&self, summary: &AccountSummary) -> anyhow::Result<SummaryWrite> {
        let statement = Self::lwt(
            "INSERT INTO account_summary (account_id, first_name, last_name, balance_cents, version)
             VALUES (?, ?, ?, ?, ?) IF NOT EXISTS",
        );

        let result = self
            .session
            .query_unpaged(
                statement,
                (
                    summary.account_id,
                    &summary.first_name,
                    &summary.last_name,
                    summary.balance.cents(),
                    summary.version,
                ),
            )
            .await?;

        let row = result.into_rows_result()?.maybe_first_row::<Row>()?;
        Ok(match lwt_outcome(row) {
            // An existing row answers with its own columns
            SummaryWrite::Missing => SummaryWrite::Stale,
            outcome => outcome,
        })
    }

    async fn set_balance(&self, account_id: Uuid, balance: Money, version: i64) -> anyhow::Result<SummaryWrite> {
        let statement = Self::lwt(
            "UPDATE account_summary SET balance_cents = ?, version = ?
             WHERE account_id = ? IF version < ?",
        );

        let result = self
            .session
            .query_unpaged(statement, (balance.cents(), version, account_id, version))
            .await?;

        let row = result.into_rows_result()?.maybe_first_row::<Row>()?;
        Ok(lwt_outcome(row))
    }

    async fn get(&self, account_id: Uuid) -> anyhow::Result<Option<AccountSummary>> {
        let mut statement = Statement::new(
            "SELECT account_id, first_name, last_name, balance_cents, version
             FROM account_summary WHERE account_id = ?",
        );
        statement.set_consistency(Consistency::Quorum);

        let result = self.session.query_unpaged(statement, (account_id,)).await?;
        let row = result
            .into_rows_result()?
            .maybe_first_row::<(Uuid, String, String, i64, i64)>()?;

        Ok(row.map(|(account_id, first_name, last_name, balance_cents, version)| AccountSummary {
            account_id,
            first_name,
            last_name,
            balance: Money::from_cents(balance_cents),
            version,
        }))
    }
}
