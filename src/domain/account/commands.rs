use uuid::Uuid;

use super::value_objects::Money;

// ============================================================================
// Account Commands - Represent user intent
// ============================================================================

#[derive(Debug, Clone)]
pub enum AccountCommand {
    Open {
        account_id: Uuid,
        first_name: String,
        last_name: String,
    },
    Deposit {
        amount: Money,
    },
    Withdraw {
        amount: Money,
    },
}
