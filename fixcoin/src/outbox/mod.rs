//! Outbox of purchase side effects.
//!
//! A purchase enqueues its side effects (promo usage, platform commission) in
//! the same database transaction that moves the money. The dispatcher applies
//! them right after the commit and `drain` retries whatever is still pending.

pub mod dispatcher;
pub mod models;

pub use dispatcher::OutboxDispatcher;
pub use models::{DrainReport, OutboxEntry, OutboxId, OutboxStatus, SideEffect, SideEffectOutcome};
