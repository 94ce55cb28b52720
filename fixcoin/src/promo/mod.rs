//! Promo codes: percentage or flat FixCoin discounts, optionally restricted
//! to specific courses or course types, with a usage limit and a validity
//! window.
//!
//! Discounts are computed by [`Quote::new`]; the usage counter is advanced
//! by the outbox after a purchase commits.

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::PromoError;
pub use manager::PromoManager;
pub use models::{DiscountType, NewPromoCode, PromoCode, PromoCodeId, PurchaseTarget, Quote};
