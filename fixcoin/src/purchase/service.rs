//! Purchase service: settles course sales and runs checkout.

use std::sync::Arc;

use rust_decimal::Decimal;

use super::{
    models::{CheckoutReceipt, PurchaseOrder, PurchaseReceipt, TransferRequest},
    settlement::plan_settlement,
};
use crate::{
    config::LedgerConfig,
    db::LedgerRepository,
    outbox::OutboxDispatcher,
    promo::{PromoManager, Quote},
    wallet::{WalletError, WalletResult, money::ensure_non_negative},
};

/// Purchase service
#[derive(Clone)]
pub struct PurchaseService {
    repo: Arc<dyn LedgerRepository>,
    dispatcher: OutboxDispatcher,
    promos: PromoManager,
    commission_rate: Decimal,
}

impl PurchaseService {
    pub fn new(repo: Arc<dyn LedgerRepository>, config: &LedgerConfig) -> Self {
        Self {
            dispatcher: OutboxDispatcher::new(repo.clone(), config),
            promos: PromoManager::new(repo.clone()),
            repo,
            commission_rate: config.commission_rate,
        }
    }

    /// Commission rate used by [`purchase`](Self::purchase)
    pub fn commission_rate(&self) -> Decimal {
        self.commission_rate
    }

    /// Move FixCoin from buyer to seller for a course or course type.
    ///
    /// The debit, the credit and the link between both rows commit together;
    /// on any error nothing is written. Promo usage and the platform
    /// commission are applied afterwards, and their outcome is reported in
    /// the receipt instead of failing the purchase.
    ///
    /// # Errors
    ///
    /// * `WalletError::SelfPurchaseRejected` - Buyer and seller are the same user
    /// * `WalletError::InsufficientFunds` - Buyer cannot pay `amount`
    /// * `WalletError::InvalidAmount` / `WalletError::InvalidCommissionRate`
    pub async fn transfer_for_course_purchase(
        &self,
        request: TransferRequest,
    ) -> WalletResult<PurchaseReceipt> {
        let settlement = plan_settlement(&request)?;
        let record = self.repo.settle_purchase(&settlement).await?;

        log::info!(
            "User {} bought '{}' from user {} for {} (commission {})",
            request.buyer_id,
            request.item_name(),
            request.seller_id,
            settlement.amount,
            settlement.commission
        );

        let side_effects = self.dispatcher.dispatch(&record.outbox_ids).await;

        Ok(PurchaseReceipt {
            buyer_transaction: record.buyer_transaction,
            seller_transaction: record.seller_transaction,
            commission: settlement.commission,
            seller_earning: settlement.seller_earning,
            side_effects,
        })
    }

    /// Checkout: reject repeat purchases, apply the promo code (if any) and
    /// settle at the configured commission rate.
    ///
    /// Ownership is checked up front and again while settling, so concurrent
    /// checkouts of the same item charge the buyer at most once.
    ///
    /// # Errors
    ///
    /// * `WalletError::InvalidAmount` - Negative, sub-cent or out-of-range price
    /// * `WalletError::AlreadyPurchased` - Buyer already owns the item
    /// * `WalletError::PromoNotFound` / `WalletError::Promo` - Unusable promo code
    pub async fn purchase(&self, order: PurchaseOrder) -> WalletResult<CheckoutReceipt> {
        ensure_non_negative(order.price)?;
        let target = order.target();
        if self.repo.has_purchased(order.buyer_id, &target).await? {
            return Err(WalletError::AlreadyPurchased(order.buyer_id));
        }

        let promo = match order.promo_code.as_deref() {
            Some(code) => Some(self.promos.resolve_now(code, &target).await?),
            None => None,
        };
        let quote = Quote::new(order.price, promo.as_ref());

        let mut request = TransferRequest::new(
            order.buyer_id,
            order.seller_id,
            order.course,
            quote.final_amount,
            self.commission_rate,
        )
        .with_discount(
            quote.original_amount,
            quote.discount_amount,
            promo.as_ref().map(|p| p.id),
        )
        .once_per_buyer();
        if let Some(course_type) = order.course_type {
            request = request.with_course_type(course_type);
        }

        let receipt = self.transfer_for_course_purchase(request).await?;

        Ok(CheckoutReceipt {
            receipt,
            promo,
            original_amount: quote.original_amount,
            discount_amount: quote.discount_amount,
            paid_amount: quote.final_amount,
        })
    }
}
