use async_trait::async_trait;
use std::sync::Arc;

use super::events::{AccountEvent, AccountEventKind};
use super::read_model::{AccountSummary, AccountSummaryStore, SummaryWrite};
use super::value_objects::Money;
use crate::event_sourcing::core::EventEnvelope;
use crate::projection::{ProjectionBus, ProjectionHandler};

// ============================================================================
// Account Summary Projection
// ============================================================================
//
// Writes the balance each event carries. The overdraft charge is already
// part of the Overdrawn balance and is never subtracted again here.
//
// ============================================================================

pub struct AccountSummaryProjection {
    store: Arc<dyn AccountSummaryStore>,
}

impl AccountSummaryProjection {
    pub fn new(store: Arc<dyn AccountSummaryStore>) -> Arc<Self> {
        Arc::new(Self { store })
    }

    /// Register for every account event kind, returns how many registrations won
    pub fn register_all(self: &Arc<Self>, bus: &mut ProjectionBus<AccountEvent>) -> usize {
        AccountEventKind::ALL
            .into_iter()
            .filter(|kind| bus.register(kind.as_str(), self.clone()))
            .count()
    }
}

#[async_trait]
impl ProjectionHandler<AccountEvent> for AccountSummaryProjection {
    fn name(&self) -> &'static str {
        "account_summary"
    }

    async fn handle(&self, envelope: &EventEnvelope<AccountEvent>) -> anyhow::Result<()> {
        let outcome = match &envelope.event_data {
            AccountEvent::Created(e) => {
                self.store
                    .create(&AccountSummary {
                        account_id: e.account_id,
                        first_name: e.first_name.clone(),
                        last_name: e.last_name.clone(),
                        balance: Money::ZERO,
                        version: envelope.version,
                    })
                    .await?
            }
            event => {
                let balance = event
                    .resulting_balance()
                    .ok_or_else(|| anyhow::anyhow!("{} carries no balance", envelope.kind))?;
                self.store
                    .set_balance(envelope.aggregate_id, balance, envelope.version)
                    .await?
            }
        };

        match outcome {
            SummaryWrite::Applied => Ok(()),
            SummaryWrite::Stale => {
                tracing::debug!(
                    aggregate_id = %envelope.aggregate_id,
                    version = envelope.version,
                    "Summary already at or past this version"
                );
                Ok(())
            }
            SummaryWrite::Missing => anyhow::bail!(
                "no account summary for {} while projecting version {}",
                envelope.aggregate_id,
                envelope.version
            ),
        }
    }
}
