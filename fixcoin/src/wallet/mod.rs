//! Wallet module providing FixCoin balances backed by an append-only ledger.
//!
//! This module implements:
//! - Balance mutations that always write exactly one ledger row
//! - Guarded debits that never drive a balance negative
//! - Statements, per-wallet statistics and reconciliation audits
//!
//! ## Example
//!
//! ```no_run
//! use fixcoin::{LedgerConfig, db::{Database, PgLedgerRepository}};
//! use fixcoin::wallet::{StatementFilter, WalletManager};
//! use rust_decimal::dec;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let repo = Arc::new(PgLedgerRepository::new(db.pool().clone()));
//!     let wallets = WalletManager::new(repo, &LedgerConfig::from_env());
//!
//!     wallets.deposit(1, dec!(50.00), None).await?;
//!     for row in wallets.statement(1, &StatementFilter::default()).await? {
//!         println!("{} {} -> {}", row.transaction_type.label(), row.amount, row.balance_after);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod manager;
pub mod models;
pub mod money;

pub use errors::{WalletError, WalletResult};
pub use manager::WalletManager;
pub use models::{
    NewTransaction, Reconciliation, StatementFilter, TransactionId, TransactionType, Wallet,
    WalletStats, WalletTransaction,
};
