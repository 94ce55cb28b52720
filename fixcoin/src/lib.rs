//! # FixCoin
//!
//! Wallet ledger for the FixCoin virtual currency used to buy courses and
//! course types on the platform.
//!
//! ## Architecture
//!
//! Every balance change goes through a [`db::LedgerRepository`], which keeps
//! two tables in lockstep: the wallet balance and an append-only list of
//! wallet transactions. The sum of a wallet's transaction amounts always equals
//! its balance.
//!
//! A course purchase runs in two phases:
//!
//! - **Settlement**: buyer debit, seller credit and the mutual link between
//!   the two rows commit in one database transaction, together with the
//!   side effects the purchase produced.
//! - **Side effects**: promo usage and the platform commission credit are
//!   applied afterwards from the outbox. A failure there is recorded and
//!   retried later; it never undoes the settlement.
//!
//! ## Core Modules
//!
//! - [`wallet`]: balances, postings, statements and reconciliation
//! - [`purchase`]: course purchase settlement and checkout
//! - [`promo`]: promo codes and discount quotes
//! - [`outbox`]: deferred side effects of purchases
//! - [`db`]: repository trait with PostgreSQL and in-memory backends
//!
//! ## Example
//!
//! ```
//! use fixcoin::{Ledger, LedgerConfig, db::MemoryLedgerRepository};
//! use rust_decimal::dec;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), fixcoin::WalletError> {
//! let ledger = Ledger::new(Arc::new(MemoryLedgerRepository::new()), LedgerConfig::default());
//!
//! ledger.wallets().deposit(1, dec!(250.00), None).await?;
//! let wallet = ledger.wallets().get_wallet(1).await?;
//! assert_eq!(wallet.balance, dec!(250.00));
//! # Ok(())
//! # }
//! ```

/// Ledger settings read from the environment.
pub mod config;
/// Persistence: connection pool, schema migrations, repositories.
pub mod db;
mod ledger;
/// Deferred side effects of purchases.
pub mod outbox;
/// Promo codes and discount computation.
pub mod promo;
/// Course and course-type purchase settlement.
pub mod purchase;
/// Wallets, ledger postings and reporting.
pub mod wallet;

pub use config::LedgerConfig;
pub use ledger::Ledger;
pub use wallet::{WalletError, WalletResult};

/// User ID type
pub type UserId = i64;

/// Course ID type
pub type CourseId = i64;

/// Course type ID type
pub type CourseTypeId = i64;
