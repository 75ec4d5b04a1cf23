use uuid::Uuid;

use crate::event_sourcing::core::EventSourcingError;
use crate::event_sourcing::Repository;
use crate::utils::{retry_on_transient, RetryConfig};

use super::aggregate::Account;
use super::commands::AccountCommand;
use super::value_objects::Money;

// ============================================================================
// Account Command Handler
// ============================================================================
//
// Orchestrates: Command → Aggregate → Events → Event Store
//
// Each attempt is a full cycle: load the latest history, run the command
// against it, save at the loaded version. A collision means another writer
// got there first, so the next attempt sees its events.
//
// ============================================================================

pub struct AccountCommandHandler {
    repository: Repository<Account>,
    retry: RetryConfig,
}

impl AccountCommandHandler {
    pub fn new(repository: Repository<Account>) -> Self {
        Self {
            repository,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Open a new account under the given id
    ///
    /// Not retried: a collision here means the id is already taken.
    pub async fn open(
        &self,
        account_id: Uuid,
        first_name: &str,
        last_name: &str,
    ) -> Result<i64, EventSourcingError> {
        let mut account = self.repository.create(account_id);
        account.execute(&AccountCommand::Open {
            account_id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        })?;

        let version = self.repository.save(&mut account).await?;
        tracing::info!(account_id = %account_id, "Account opened");
        Ok(version)
    }

    pub async fn deposit(&self, account_id: Uuid, amount: Money) -> Result<i64, EventSourcingError> {
        self.run(account_id, AccountCommand::Deposit { amount }).await
    }

    pub async fn withdraw(&self, account_id: Uuid, amount: Money) -> Result<i64, EventSourcingError> {
        self.run(account_id, AccountCommand::Withdraw { amount }).await
    }

    async fn run(&self, account_id: Uuid, command: AccountCommand) -> Result<i64, EventSourcingError> {
        let version = retry_on_transient(self.retry.clone(), |attempt| {
            let command = &command;
            async move {
                let mut account = self.repository.get_by_id(account_id).await?;
                account.execute(command)?;
                let version = self.repository.save(&mut account).await?;

                tracing::info!(
                    account_id = %account_id,
                    version = version,
                    attempt = attempt,
                    balance = %account.state().balance(),
                    "Account command committed"
                );
                Ok::<i64, EventSourcingError>(version)
            }
        })
        .await
        .into_result()?;

        Ok(version)
    }
}
