//! FixCoin amount helpers.
//!
//! Balances are stored as `NUMERIC(15,2)`, so every amount that reaches the
//! ledger carries at most two decimal places.

use rust_decimal::{Decimal, RoundingStrategy, dec};

use super::errors::{WalletError, WalletResult};

/// Decimal places kept for FixCoin amounts
pub const MONEY_SCALE: u32 = 2;

/// Largest magnitude a `NUMERIC(15,2)` column holds
pub const MAX_AMOUNT: Decimal = dec!(9999999999999.99);

/// Round a derived amount (commission, percentage) to ledger precision.
///
/// Uses banker's rounding, which is what the database applies when a wider
/// value is cast to `NUMERIC(15,2)`.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// True if `value` needs no rounding to be stored
pub fn has_money_scale(value: Decimal) -> bool {
    value.normalize().scale() <= MONEY_SCALE
}

/// True if `value` fits the ledger columns: scale and magnitude
pub fn is_storable(value: Decimal) -> bool {
    has_money_scale(value) && value.abs() <= MAX_AMOUNT
}

/// Validate an amount for `add_balance`/`subtract_balance`: strictly positive,
/// at most two decimal places, within [`MAX_AMOUNT`].
pub fn ensure_positive(amount: Decimal) -> WalletResult<Decimal> {
    if amount <= Decimal::ZERO || !is_storable(amount) {
        return Err(WalletError::InvalidAmount(amount));
    }
    Ok(amount)
}

/// Validate a settlement amount: zero allowed (fully discounted purchase).
pub fn ensure_non_negative(amount: Decimal) -> WalletResult<Decimal> {
    if amount < Decimal::ZERO || !is_storable(amount) {
        return Err(WalletError::InvalidAmount(amount));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::dec;

    #[test]
    fn test_round_money_bankers() {
        assert_eq!(round_money(dec!(1.005)), dec!(1.00));
        assert_eq!(round_money(dec!(1.015)), dec!(1.02));
        assert_eq!(round_money(dec!(4.9995)), dec!(5.00));
    }

    #[test]
    fn test_ensure_positive() {
        assert!(ensure_positive(dec!(0.01)).is_ok());
        assert!(ensure_positive(dec!(12.50)).is_ok());
        assert!(ensure_positive(dec!(3.1000)).is_ok());

        assert!(matches!(
            ensure_positive(Decimal::ZERO),
            Err(WalletError::InvalidAmount(_))
        ));
        assert!(matches!(
            ensure_positive(dec!(-5)),
            Err(WalletError::InvalidAmount(_))
        ));
        assert!(matches!(
            ensure_positive(dec!(0.001)),
            Err(WalletError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_ensure_non_negative_accepts_zero() {
        assert_eq!(ensure_non_negative(Decimal::ZERO).unwrap(), Decimal::ZERO);
        assert!(ensure_non_negative(dec!(-0.01)).is_err());
    }

    #[test]
    fn test_amounts_beyond_column_range_rejected() {
        assert!(ensure_positive(MAX_AMOUNT).is_ok());
        assert!(matches!(
            ensure_positive(MAX_AMOUNT + dec!(0.01)),
            Err(WalletError::InvalidAmount(_))
        ));
        assert!(matches!(
            ensure_non_negative(Decimal::MAX),
            Err(WalletError::InvalidAmount(_))
        ));
    }
}
