//! Course and course-type purchases.
//!
//! Settlement is split in two phases. The money movement commits atomically;
//! the promo usage and platform commission it produces go through the
//! [`outbox`](crate::outbox) and can be retried without touching the buyer
//! or the seller again.

pub mod models;
pub mod service;
pub mod settlement;

pub use models::{
    CheckoutReceipt, CourseRef, CourseTypeRef, PurchaseOrder, PurchaseReceipt, Settlement,
    SettlementRecord, TransferRequest,
};
pub use service::PurchaseService;
pub use settlement::{plan_settlement, split_commission};
