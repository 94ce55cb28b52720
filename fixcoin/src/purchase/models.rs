//! Purchase data models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    CourseId, CourseTypeId, UserId,
    outbox::{OutboxId, SideEffect, SideEffectOutcome},
    promo::{PromoCode, PromoCodeId, PurchaseTarget},
    wallet::{NewTransaction, TransactionType, WalletTransaction},
};

/// Course being sold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRef {
    pub id: CourseId,
    pub title: String,
}

/// Course type being sold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseTypeRef {
    pub id: CourseTypeId,
    pub name: String,
}

/// Transfer request for one course or course-type purchase
///
/// `amount` is what the buyer pays after discounts. `original_amount`
/// defaults to `amount` and `discount_amount` to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub course: CourseRef,
    pub amount: Decimal,
    pub commission_rate: Decimal,
    pub course_type: Option<CourseTypeRef>,
    pub transaction_type: TransactionType,
    pub original_amount: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub promo_code: Option<PromoCodeId>,
    /// Refuse the transfer if the buyer already owns the item
    #[serde(default)]
    pub once_per_buyer: bool,
}

impl TransferRequest {
    pub fn new(
        buyer_id: UserId,
        seller_id: UserId,
        course: CourseRef,
        amount: Decimal,
        commission_rate: Decimal,
    ) -> Self {
        Self {
            buyer_id,
            seller_id,
            course,
            amount,
            commission_rate,
            course_type: None,
            transaction_type: TransactionType::CoursePurchase,
            original_amount: None,
            discount_amount: None,
            promo_code: None,
            once_per_buyer: false,
        }
    }

    /// Re-check ownership inside the settlement transaction
    pub fn once_per_buyer(mut self) -> Self {
        self.once_per_buyer = true;
        self
    }

    /// Buy one course type of the course instead of the whole course
    pub fn with_course_type(mut self, course_type: CourseTypeRef) -> Self {
        self.course_type = Some(course_type);
        self.transaction_type = TransactionType::CourseTypePurchase;
        self
    }

    pub fn with_transaction_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = transaction_type;
        self
    }

    /// Record the undiscounted price and the promo code that reduced it
    pub fn with_discount(
        mut self,
        original_amount: Decimal,
        discount_amount: Decimal,
        promo_code: Option<PromoCodeId>,
    ) -> Self {
        self.original_amount = Some(original_amount);
        self.discount_amount = Some(discount_amount);
        self.promo_code = promo_code;
        self
    }

    /// Name shown in ledger descriptions
    pub fn item_name(&self) -> &str {
        self.course_type
            .as_ref()
            .map_or(self.course.title.as_str(), |ct| ct.name.as_str())
    }

    pub fn target(&self) -> PurchaseTarget {
        PurchaseTarget {
            course_id: self.course.id,
            course_type_id: self.course_type.as_ref().map(|ct| ct.id),
        }
    }
}

/// Fully computed settlement, handed to the repository to commit atomically
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub buyer_id: UserId,
    pub seller_id: UserId,
    /// Debited from the buyer
    pub amount: Decimal,
    /// Platform share of `amount`
    pub commission: Decimal,
    /// Credited to the seller: `amount - commission`
    pub seller_earning: Decimal,
    /// Buyer-side row (magnitude; stored negated)
    pub buyer_posting: NewTransaction,
    /// Seller-side row
    pub seller_posting: NewTransaction,
    /// Enqueued in the same database transaction
    pub side_effects: Vec<SideEffect>,
    /// Item the buyer must not own yet, checked under the buyer's wallet lock
    #[serde(default)]
    pub repeat_guard: Option<PurchaseTarget>,
}

/// What the repository committed for a settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub buyer_transaction: WalletTransaction,
    pub seller_transaction: WalletTransaction,
    pub outbox_ids: Vec<OutboxId>,
}

/// Result of a purchase: both ledger rows plus the side-effect outcomes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub buyer_transaction: WalletTransaction,
    pub seller_transaction: WalletTransaction,
    pub commission: Decimal,
    pub seller_earning: Decimal,
    pub side_effects: Vec<SideEffectOutcome>,
}

impl PurchaseReceipt {
    /// `(buyer_tx, seller_tx)`
    pub fn into_pair(self) -> (WalletTransaction, WalletTransaction) {
        (self.buyer_transaction, self.seller_transaction)
    }
}

/// Checkout request: the catalog has already resolved seller and price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub course: CourseRef,
    pub course_type: Option<CourseTypeRef>,
    /// List price before any promo code
    pub price: Decimal,
    pub promo_code: Option<String>,
}

impl PurchaseOrder {
    pub fn target(&self) -> PurchaseTarget {
        PurchaseTarget {
            course_id: self.course.id,
            course_type_id: self.course_type.as_ref().map(|ct| ct.id),
        }
    }
}

/// Checkout result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub receipt: PurchaseReceipt,
    pub promo: Option<PromoCode>,
    pub original_amount: Decimal,
    pub discount_amount: Decimal,
    pub paid_amount: Decimal,
}
