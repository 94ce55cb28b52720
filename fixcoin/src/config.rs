//! Ledger configuration.

use rust_decimal::{Decimal, dec};

use crate::UserId;

/// Default platform commission rate (5%)
pub const DEFAULT_COMMISSION_RATE: Decimal = dec!(0.05);

/// Default upper bound for a single deposit
pub const DEFAULT_MAX_DEPOSIT: Decimal = dec!(100000);

/// Default number of attempts for one outbox entry
pub const DEFAULT_OUTBOX_MAX_ATTEMPTS: u32 = 5;

/// Default number of outbox entries processed per drain pass
pub const DEFAULT_OUTBOX_BATCH_SIZE: i64 = 100;

/// Ledger settings
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    /// Share of every sale credited to the platform account (0..=1)
    pub commission_rate: Decimal,

    /// Largest amount accepted by a single deposit
    pub max_deposit: Decimal,

    /// Platform account receiving commissions. When unset, the lowest-id
    /// superuser is used.
    pub platform_user_id: Option<UserId>,

    /// Attempts before an outbox entry is marked failed
    pub outbox_max_attempts: u32,

    /// Entries fetched per outbox drain pass
    pub outbox_batch_size: i64,
}

impl LedgerConfig {
    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `FIXCOIN_COMMISSION_RATE`: commission rate (default: 0.05)
    /// - `FIXCOIN_MAX_DEPOSIT`: per-deposit limit (default: 100000)
    /// - `FIXCOIN_PLATFORM_USER_ID`: platform account (default: first superuser)
    /// - `FIXCOIN_OUTBOX_MAX_ATTEMPTS`: retry budget (default: 5)
    /// - `FIXCOIN_OUTBOX_BATCH_SIZE`: drain batch size (default: 100)
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_env() -> Self {
        Self {
            commission_rate: parse_env_or("FIXCOIN_COMMISSION_RATE", DEFAULT_COMMISSION_RATE),
            max_deposit: parse_env_or("FIXCOIN_MAX_DEPOSIT", DEFAULT_MAX_DEPOSIT),
            platform_user_id: std::env::var("FIXCOIN_PLATFORM_USER_ID")
                .ok()
                .and_then(|v| v.parse().ok()),
            outbox_max_attempts: parse_env_or(
                "FIXCOIN_OUTBOX_MAX_ATTEMPTS",
                DEFAULT_OUTBOX_MAX_ATTEMPTS,
            ),
            outbox_batch_size: parse_env_or("FIXCOIN_OUTBOX_BATCH_SIZE", DEFAULT_OUTBOX_BATCH_SIZE),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            commission_rate: DEFAULT_COMMISSION_RATE,
            max_deposit: DEFAULT_MAX_DEPOSIT,
            platform_user_id: None,
            outbox_max_attempts: DEFAULT_OUTBOX_MAX_ATTEMPTS,
            outbox_batch_size: DEFAULT_OUTBOX_BATCH_SIZE,
        }
    }
}

/// Parse an environment variable, falling back to `default`
pub(crate) fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert_eq!(config.commission_rate, dec!(0.05));
        assert_eq!(config.max_deposit, dec!(100000));
        assert_eq!(config.platform_user_id, None);
        assert_eq!(config.outbox_max_attempts, 5);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        unsafe {
            std::env::set_var("FIXCOIN_COMMISSION_RATE", "0.10");
            std::env::set_var("FIXCOIN_PLATFORM_USER_ID", "42");
        }

        let config = LedgerConfig::from_env();
        assert_eq!(config.commission_rate, dec!(0.10));
        assert_eq!(config.platform_user_id, Some(42));

        unsafe {
            std::env::remove_var("FIXCOIN_COMMISSION_RATE");
            std::env::remove_var("FIXCOIN_PLATFORM_USER_ID");
        }
    }

    #[test]
    #[serial]
    fn test_from_env_ignores_garbage() {
        unsafe {
            std::env::set_var("FIXCOIN_MAX_DEPOSIT", "lots");
        }

        let config = LedgerConfig::from_env();
        assert_eq!(config.max_deposit, DEFAULT_MAX_DEPOSIT);

        unsafe {
            std::env::remove_var("FIXCOIN_MAX_DEPOSIT");
        }
    }
}
