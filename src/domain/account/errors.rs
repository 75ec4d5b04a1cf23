use super::value_objects::Money;

// ============================================================================
// Account Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Amount must be greater than zero, got {0}")]
    NonPositiveAmount(Money),

    #[error("Account id, first name and last name are required")]
    IncompleteOpening,

    #[error("Account is already open")]
    AlreadyOpened,

    #[error("Account has not been opened")]
    NotOpened,

    #[error("Balance {balance} cannot absorb {amount}")]
    AmountOutOfRange { balance: Money, amount: Money },
}
