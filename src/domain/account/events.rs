use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::value_objects::Money;
use crate::event_sourcing::core::{deserialize_event, serialize_event, DomainEvent, EventCodecError};

// ============================================================================
// Account Events - Domain Events for Account Aggregate
// ============================================================================
//
// Monetary events record the balance they produced. Replay assigns that
// balance instead of recomputing it, and projections write it verbatim.
//
// ============================================================================

/// Account Event - Union type for all account events
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AccountEvent {
    Created(AccountCreated),
    Deposited(Deposited),
    Withdrew(Withdrew),
    Overdrawn(Overdrawn),
}

/// Stable wire names, one per event variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountEventKind {
    AccountCreated,
    Deposited,
    Withdrew,
    Overdrawn,
}

impl AccountEventKind {
    pub const ALL: [AccountEventKind; 4] = [
        AccountEventKind::AccountCreated,
        AccountEventKind::Deposited,
        AccountEventKind::Withdrew,
        AccountEventKind::Overdrawn,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            AccountEventKind::AccountCreated => "AccountCreated",
            AccountEventKind::Deposited => "Deposited",
            AccountEventKind::Withdrew => "Withdrew",
            AccountEventKind::Overdrawn => "Overdrawn",
        }
    }
}

impl fmt::Display for AccountEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountEventKind {
    type Err = EventCodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccountEventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EventCodecError::UnknownKind(s.to_string()))
    }
}

impl AccountEvent {
    pub fn event_kind(&self) -> AccountEventKind {
        match self {
            AccountEvent::Created(_) => AccountEventKind::AccountCreated,
            AccountEvent::Deposited(_) => AccountEventKind::Deposited,
            AccountEvent::Withdrew(_) => AccountEventKind::Withdrew,
            AccountEvent::Overdrawn(_) => AccountEventKind::Overdrawn,
        }
    }

    /// Balance after this event, None for the opening event
    pub fn resulting_balance(&self) -> Option<Money> {
        match self {
            AccountEvent::Created(_) => None,
            AccountEvent::Deposited(e) => Some(e.balance),
            AccountEvent::Withdrew(e) => Some(e.balance),
            AccountEvent::Overdrawn(e) => Some(e.balance),
        }
    }
}

impl DomainEvent for AccountEvent {
    fn kind(&self) -> &'static str {
        self.event_kind().as_str()
    }

    fn aggregate_id(&self) -> Uuid {
        match self {
            AccountEvent::Created(e) => e.account_id,
            AccountEvent::Deposited(e) => e.account_id,
            AccountEvent::Withdrew(e) => e.account_id,
            AccountEvent::Overdrawn(e) => e.account_id,
        }
    }

    fn encode(&self) -> Result<String, EventCodecError> {
        match self {
            AccountEvent::Created(e) => serialize_event(e),
            AccountEvent::Deposited(e) => serialize_event(e),
            AccountEvent::Withdrew(e) => serialize_event(e),
            AccountEvent::Overdrawn(e) => serialize_event(e),
        }
    }

    fn decode(kind: &str, payload: &str) -> Result<Self, EventCodecError> {
        match kind.parse::<AccountEventKind>()? {
            AccountEventKind::AccountCreated => deserialize_event(kind, payload).map(AccountEvent::Created),
            AccountEventKind::Deposited => deserialize_event(kind, payload).map(AccountEvent::Deposited),
            AccountEventKind::Withdrew => deserialize_event(kind, payload).map(AccountEvent::Withdrew),
            AccountEventKind::Overdrawn => deserialize_event(kind, payload).map(AccountEvent::Overdrawn),
        }
    }
}

// ============================================================================
// Individual Event Types
// ============================================================================

/// Account Created - Initial event in account lifecycle
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountCreated {
    pub account_id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

/// Deposited - Money added to the account
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Deposited {
    pub account_id: Uuid,
    pub transaction_id: Uuid,
    pub amount: Money,
    pub balance: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Withdrew - Money taken from the account, may leave it negative
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Withdrew {
    pub account_id: Uuid,
    pub transaction_id: Uuid,
    pub amount: Money,
    pub balance: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Overdrawn - Service charge for the withdrawal with the same transaction id
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Overdrawn {
    pub account_id: Uuid,
    pub transaction_id: Uuid,
    pub service_charge: Money,
    pub balance: Money,
    pub occurred_at: DateTime<Utc>,
}
