//! Structured logging configuration.
//!
//! Installs a `tracing` subscriber. Its `log` bridge also captures the
//! records emitted by the `fixcoin` library.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var
/// (default: `info,sqlx=warn`).
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// Log a ledger operation performed by an operator
///
/// # Arguments
///
/// * `event_type` - Command name (deposit, withdraw, ...)
/// * `user_id` - Affected wallet, if any
/// * `amount` - Amount moved, if any
/// * `message` - Event message
pub fn log_ledger_event(
    event_type: &str,
    user_id: Option<i64>,
    amount: Option<&str>,
    message: &str,
) {
    tracing::info!(
        event_type = event_type,
        user_id = user_id,
        amount = amount,
        "LEDGER: {}",
        message
    );
}

/// Log an audit result; mismatches are warnings
pub fn log_audit_result(mismatched: usize) {
    if mismatched > 0 {
        tracing::warn!(mismatched = mismatched, "AUDIT: wallets out of balance");
    } else {
        tracing::info!("AUDIT: all wallets consistent");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_ledger_event() {
        // Just ensure it doesn't panic
        log_ledger_event("deposit", Some(1), Some("10.00"), "Test message");
        log_ledger_event("migrate", None, None, "Schema up to date");
    }

    #[test]
    fn test_log_audit_result() {
        log_audit_result(0);
        log_audit_result(1);
    }
}
