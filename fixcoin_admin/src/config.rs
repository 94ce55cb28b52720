//! Admin configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use fixcoin::{LedgerConfig, db::DatabaseConfig};
use rust_decimal::Decimal;

/// Complete admin configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Ledger settings (commission, limits, outbox)
    pub ledger: LedgerConfig,
}

impl AdminConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `database_url_override` - Optional database URL override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when neither the override nor
    /// `DATABASE_URL` is set.
    pub fn from_env(database_url_override: Option<String>) -> Result<Self, ConfigError> {
        let database_url = database_url_override
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .ok_or_else(|| ConfigError::MissingRequired {
                var: "DATABASE_URL".to_string(),
                hint: "Set it in .env or pass --db-url".to_string(),
            })?;

        let database = DatabaseConfig {
            database_url,
            ..DatabaseConfig::from_env()
        };

        Ok(AdminConfig {
            database,
            ledger: LedgerConfig::from_env(),
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rate = self.ledger.commission_rate;
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            return Err(ConfigError::Invalid {
                var: "FIXCOIN_COMMISSION_RATE".to_string(),
                reason: format!("Must be between 0 and 1, got {rate}"),
            });
        }

        if self.ledger.max_deposit <= Decimal::ZERO {
            return Err(ConfigError::Invalid {
                var: "FIXCOIN_MAX_DEPOSIT".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.ledger.outbox_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "FIXCOIN_OUTBOX_MAX_ATTEMPTS".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed max connections ({})",
                    self.database.max_connections
                ),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}
