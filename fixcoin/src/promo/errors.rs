//! Promo code error types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

/// Reasons a promo code cannot be used or created
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PromoError {
    /// Code switched off by an operator
    #[error("Promo code {0} is not active")]
    Inactive(String),

    /// Validity window has not started
    #[error("Promo code {code} is valid from {valid_from}")]
    NotYetValid {
        code: String,
        valid_from: DateTime<Utc>,
    },

    /// Validity window has ended
    #[error("Promo code {code} expired at {valid_to}")]
    Expired {
        code: String,
        valid_to: DateTime<Utc>,
    },

    /// `uses` reached `max_uses`
    #[error("Promo code {0} has reached its usage limit")]
    UsageLimitReached(String),

    /// Code restricted to other courses or course types
    #[error("Promo code {0} does not apply to this item")]
    NotApplicable(String),

    /// Code string empty or too long
    #[error("Invalid promo code: {0:?}")]
    InvalidCode(String),

    /// Discount value out of range for its type
    #[error("Invalid promo value: {0}")]
    InvalidValue(Decimal),

    /// `valid_to` before `valid_from`
    #[error("Promo validity window ends before it starts")]
    InvalidWindow,
}
