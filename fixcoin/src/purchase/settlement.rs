//! Settlement planning: validation and the commission split.
//!
//! Nothing here touches storage. The planned [`Settlement`] is committed by
//! [`LedgerRepository::settle_purchase`](crate::db::LedgerRepository::settle_purchase).

use rust_decimal::Decimal;

use super::models::{Settlement, TransferRequest};
use crate::{
    outbox::SideEffect,
    wallet::{
        NewTransaction, TransactionType, WalletError, WalletResult,
        money::{ensure_non_negative, round_money},
    },
};

/// Split `amount` into `(commission, seller_earning)`.
///
/// The commission is rounded to cents; the seller gets the exact remainder, so
/// the two always add up to `amount`.
pub fn split_commission(amount: Decimal, rate: Decimal) -> WalletResult<(Decimal, Decimal)> {
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(WalletError::InvalidCommissionRate(rate));
    }
    let commission = round_money(amount * rate);
    Ok((commission, amount - commission))
}

/// Validate a transfer request and compute everything the repository commits.
///
/// # Errors
///
/// * `WalletError::SelfPurchaseRejected` - Buyer and seller are the same user
/// * `WalletError::InvalidAmount` - Negative amount or sub-cent precision
/// * `WalletError::InvalidCommissionRate` - Rate outside 0..=1
/// * `WalletError::InvalidTransactionType` - Not a purchase type
pub fn plan_settlement(request: &TransferRequest) -> WalletResult<Settlement> {
    if request.buyer_id == request.seller_id {
        return Err(WalletError::SelfPurchaseRejected(request.buyer_id));
    }

    let amount = ensure_non_negative(request.amount)?;
    let original_amount = ensure_non_negative(request.original_amount.unwrap_or(amount))?;
    let discount_amount = ensure_non_negative(request.discount_amount.unwrap_or(Decimal::ZERO))?;
    let (commission, seller_earning) = split_commission(amount, request.commission_rate)?;

    let purchase_type = request.transaction_type;
    let earning_type = purchase_type
        .earning_counterpart()
        .ok_or_else(|| WalletError::InvalidTransactionType(purchase_type.to_string()))?;

    let item_name = request.item_name();
    let (buy_label, sell_label) = match purchase_type {
        TransactionType::CourseTypePurchase => ("Course type purchase", "Course type sale earning"),
        _ => ("Course purchase", "Course sale earning"),
    };
    let course_type_id = request.course_type.as_ref().map(|ct| ct.id);

    let buyer_posting =
        NewTransaction::new(purchase_type, amount, format!("{buy_label}: {item_name}"))
            .with_course(request.course.id, course_type_id)
            .with_parties(request.buyer_id, request.seller_id)
            .with_pricing(original_amount, discount_amount)
            .with_promo_code(request.promo_code);

    let seller_posting =
        NewTransaction::new(earning_type, seller_earning, format!("{sell_label}: {item_name}"))
            .with_course(request.course.id, course_type_id)
            .with_parties(request.buyer_id, request.seller_id);

    let mut side_effects = Vec::new();
    if let Some(promo_code_id) = request.promo_code {
        side_effects.push(SideEffect::IncrementPromoUses { promo_code_id });
    }
    if commission > Decimal::ZERO {
        side_effects.push(SideEffect::CreditPlatformCommission {
            amount: commission,
            buyer_id: request.buyer_id,
            course_id: request.course.id,
            course_type_id,
            item_name: item_name.to_string(),
        });
    }

    Ok(Settlement {
        buyer_id: request.buyer_id,
        seller_id: request.seller_id,
        amount,
        commission,
        seller_earning,
        buyer_posting,
        seller_posting,
        side_effects,
        repeat_guard: request.once_per_buyer.then(|| request.target()),
    })
}
