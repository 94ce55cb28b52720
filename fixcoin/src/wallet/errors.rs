//! Wallet error types.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    UserId,
    promo::{PromoCodeId, PromoError},
};

/// Wallet errors
#[derive(Debug, Error)]
pub enum WalletError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Insufficient balance
    #[error("Insufficient funds for user {user_id}: available {available}, required {required}")]
    InsufficientFunds {
        user_id: UserId,
        available: Decimal,
        required: Decimal,
    },

    /// Invalid amount (must be positive, at most two decimal places)
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Buyer and seller are the same user
    #[error("User {0} cannot purchase their own course")]
    SelfPurchaseRejected(UserId),

    /// Commission rate outside 0..=1
    #[error("Invalid commission rate: {0}")]
    InvalidCommissionRate(Decimal),

    /// Transaction type not allowed for the operation, or unknown
    #[error("Invalid transaction type: {0}")]
    InvalidTransactionType(String),

    /// Deposit above the configured limit
    #[error("Deposit of {requested} exceeds the limit of {limit}")]
    DepositLimitExceeded { limit: Decimal, requested: Decimal },

    /// Course or course type already bought by this user
    #[error("User {0} already purchased this item")]
    AlreadyPurchased(UserId),

    /// Wallet not found
    #[error("Wallet not found for user {0}")]
    WalletNotFound(UserId),

    /// No promo code with this code
    #[error("Promo code not found: {0}")]
    PromoNotFound(String),

    /// Promo code already exists
    #[error("Promo code already exists: {0}")]
    DuplicatePromoCode(String),

    /// Promo usage counter could not be incremented
    #[error("Promo code {0} has no uses left")]
    PromoUsageExhausted(PromoCodeId),

    /// Promo code not applicable or malformed
    #[error(transparent)]
    Promo(#[from] PromoError),

    /// Outbox payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transaction failed
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
}

impl WalletError {
    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Database errors are sanitized to prevent information disclosure about
    /// the internal system structure, and user IDs are redacted.
    pub fn client_message(&self) -> String {
        match self {
            WalletError::Database(_)
            | WalletError::Serialization(_)
            | WalletError::TransactionFailed(_) => "Internal server error".to_string(),
            WalletError::WalletNotFound(_) => "Wallet not found".to_string(),
            WalletError::InsufficientFunds { .. } => "Insufficient funds".to_string(),
            WalletError::SelfPurchaseRejected(_) => {
                "You cannot purchase your own course".to_string()
            }
            WalletError::AlreadyPurchased(_) => "You have already purchased this item".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for wallet operations
pub type WalletResult<T> = Result<T, WalletError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::dec;

    #[test]
    fn test_client_message_hides_user_ids() {
        let err = WalletError::InsufficientFunds {
            user_id: 77,
            available: dec!(10.00),
            required: dec!(15.00),
        };
        assert!(err.to_string().contains("77"));
        assert_eq!(err.client_message(), "Insufficient funds");

        let err = WalletError::WalletNotFound(77);
        assert!(!err.client_message().contains("77"));
    }

    #[test]
    fn test_client_message_hides_database_details() {
        let err = WalletError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.client_message(), "Internal server error");
    }

    #[test]
    fn test_promo_errors_pass_through() {
        let err = WalletError::from(PromoError::Inactive("SPRING".to_string()));
        assert_eq!(err.client_message(), err.to_string());
        assert!(err.to_string().contains("SPRING"));
    }
}
