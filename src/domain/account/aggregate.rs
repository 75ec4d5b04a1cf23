use chrono::Utc;
use uuid::Uuid;

use super::commands::AccountCommand;
use super::errors::AccountError;
use super::events::*;
use super::value_objects::Money;
use crate::event_sourcing::core::Aggregate;

// ============================================================================
// Account Aggregate - Domain Logic
// ============================================================================

/// Service charge recorded whenever a withdrawal leaves the balance negative
pub const OVERDRAFT_CHARGE: Money = Money::from_units(10);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Account {
    id: Option<Uuid>,
    first_name: String,
    last_name: String,
    balance: Money,
}

impl Account {
    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.id.is_some()
    }

    pub fn balance(&self) -> Money {
        self.balance
    }

    pub fn owner(&self) -> (&str, &str) {
        (&self.first_name, &self.last_name)
    }

    fn open_id(&self) -> Result<Uuid, AccountError> {
        self.id.ok_or(AccountError::NotOpened)
    }

    fn validate_amount(amount: Money) -> Result<(), AccountError> {
        if !amount.is_positive() {
            return Err(AccountError::NonPositiveAmount(amount));
        }
        Ok(())
    }

    fn credited(balance: Money, amount: Money) -> Result<Money, AccountError> {
        balance
            .checked_add(amount)
            .ok_or(AccountError::AmountOutOfRange { balance, amount })
    }

    fn debited(balance: Money, amount: Money) -> Result<Money, AccountError> {
        balance
            .checked_sub(amount)
            .ok_or(AccountError::AmountOutOfRange { balance, amount })
    }
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for Account {
    type Event = AccountEvent;
    type Command = AccountCommand;
    type Error = AccountError;

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            AccountEvent::Created(e) => {
                if self.is_open() {
                    return Err(AccountError::AlreadyOpened);
                }
                self.id = Some(e.account_id);
                self.first_name = e.first_name.clone();
                self.last_name = e.last_name.clone();
                Ok(())
            }
            AccountEvent::Deposited(_) | AccountEvent::Withdrew(_) | AccountEvent::Overdrawn(_) => {
                self.open_id()?;
                if let Some(balance) = event.resulting_balance() {
                    self.balance = balance;
                }
                Ok(())
            }
        }
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AccountCommand::Open {
                account_id,
                first_name,
                last_name,
            } => {
                if self.is_open() {
                    return Err(AccountError::AlreadyOpened);
                }
                if account_id.is_nil() || first_name.trim().is_empty() || last_name.trim().is_empty() {
                    return Err(AccountError::IncompleteOpening);
                }

                Ok(vec![AccountEvent::Created(AccountCreated {
                    account_id: *account_id,
                    first_name: first_name.clone(),
                    last_name: last_name.clone(),
                })])
            }

            AccountCommand::Deposit { amount } => {
                Self::validate_amount(*amount)?;
                let account_id = self.open_id()?;
                let balance = Self::credited(self.balance, *amount)?;

                Ok(vec![AccountEvent::Deposited(Deposited {
                    account_id,
                    transaction_id: Uuid::new_v4(),
                    amount: *amount,
                    balance,
                    occurred_at: Utc::now(),
                })])
            }

            AccountCommand::Withdraw { amount } => {
                Self::validate_amount(*amount)?;
                let account_id = self.open_id()?;

                let transaction_id = Uuid::new_v4();
                let occurred_at = Utc::now();
                let balance = Self::debited(self.balance, *amount)?;

                let mut events = vec![AccountEvent::Withdrew(Withdrew {
                    account_id,
                    transaction_id,
                    amount: *amount,
                    balance,
                    occurred_at,
                })];

                if balance.is_negative() {
                    events.push(AccountEvent::Overdrawn(Overdrawn {
                        account_id,
                        transaction_id,
                        service_charge: OVERDRAFT_CHARGE,
                        balance: Self::debited(balance, OVERDRAFT_CHARGE)?,
                        occurred_at,
                    }));
                }

                Ok(events)
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
