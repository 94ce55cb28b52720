//! In-memory ledger repository.
//!
//! Used by tests and by embedders that do not want a database. All state sits
//! behind one async mutex, so every operation is serialized. Multi-row
//! operations check everything that can fail before the first write, which
//! keeps them all-or-nothing.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use super::repository::{LedgerRepository, commission_posting};
use crate::{
    UserId,
    outbox::{OutboxEntry, OutboxId, OutboxStatus, SideEffect},
    promo::{NewPromoCode, PromoCode, PromoCodeId, PurchaseTarget},
    purchase::{Settlement, SettlementRecord},
    wallet::{
        NewTransaction, Reconciliation, StatementFilter, TransactionId, TransactionType, Wallet,
        WalletError, WalletResult, WalletStats, WalletTransaction, money::MAX_AMOUNT,
    },
};

#[derive(Debug, Default)]
struct LedgerState {
    wallets: BTreeMap<UserId, Wallet>,
    /// Row `n` has id `n + 1`
    transactions: Vec<WalletTransaction>,
    promos: Vec<PromoCode>,
    outbox: Vec<OutboxEntry>,
    superusers: BTreeSet<UserId>,
}

impl LedgerState {
    fn wallet_mut(&mut self, user_id: UserId) -> &mut Wallet {
        self.wallets.entry(user_id).or_insert_with(|| {
            let now = Utc::now();
            Wallet {
                user_id,
                balance: Decimal::ZERO,
                created_at: now,
                updated_at: now,
            }
        })
    }

    fn balance(&self, user_id: UserId) -> Decimal {
        self.wallets
            .get(&user_id)
            .map_or(Decimal::ZERO, |w| w.balance)
    }

    fn post(
        &mut self,
        user_id: UserId,
        signed_amount: Decimal,
        posting: &NewTransaction,
    ) -> WalletTransaction {
        let now = Utc::now();
        let wallet = self.wallet_mut(user_id);
        wallet.balance += signed_amount;
        wallet.updated_at = now;
        let balance_after = wallet.balance;

        let row = WalletTransaction {
            id: self.transactions.len() as TransactionId + 1,
            user_id,
            transaction_type: posting.transaction_type,
            amount: signed_amount,
            original_amount: posting.original_amount,
            discount_amount: posting.discount_amount,
            balance_after,
            description: posting.description.clone(),
            course_id: posting.course_id,
            course_type_id: posting.course_type_id,
            from_user_id: posting.from_user_id,
            to_user_id: posting.to_user_id,
            related_transaction_id: posting.related_transaction_id,
            promo_code_id: posting.promo_code_id,
            created_at: now,
        };
        self.transactions.push(row.clone());
        row
    }

    fn ensure_covers(&self, user_id: UserId, amount: Decimal) -> WalletResult<()> {
        let available = self.balance(user_id);
        if available < amount {
            log::warn!("Rejected debit of {amount} for user {user_id}: balance {available}");
            return Err(WalletError::InsufficientFunds {
                user_id,
                available,
                required: amount,
            });
        }
        Ok(())
    }

    /// Reject a credit that would push the balance past the column range
    fn ensure_fits(&self, user_id: UserId, amount: Decimal) -> WalletResult<()> {
        let fits = self
            .balance(user_id)
            .checked_add(amount)
            .is_some_and(|balance| balance <= MAX_AMOUNT);
        if !fits {
            return Err(WalletError::InvalidAmount(amount));
        }
        Ok(())
    }

    fn owns(&self, user_id: UserId, target: &PurchaseTarget) -> bool {
        self.transactions.iter().any(|t| {
            t.user_id == user_id
                && match target.course_type_id {
                    Some(course_type_id) => {
                        t.transaction_type == TransactionType::CourseTypePurchase
                            && t.course_type_id == Some(course_type_id)
                    }
                    None => {
                        t.transaction_type == TransactionType::CoursePurchase
                            && t.course_id == Some(target.course_id)
                    }
                }
        })
    }

    fn transaction_mut(&mut self, id: TransactionId) -> Option<&mut WalletTransaction> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.transactions.get_mut(index)
    }

    fn outbox_mut(&mut self, id: OutboxId) -> WalletResult<&mut OutboxEntry> {
        usize::try_from(id)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| self.outbox.get_mut(i))
            .ok_or_else(|| WalletError::TransactionFailed(format!("Outbox entry {id} not found")))
    }

    fn reconciliation(&self, wallet: &Wallet) -> Reconciliation {
        let rows = self
            .transactions
            .iter()
            .filter(|t| t.user_id == wallet.user_id);
        let (ledger_sum, transactions_count) = rows.fold((Decimal::ZERO, 0), |(sum, n), t| {
            (sum + t.amount, n + 1)
        });
        Reconciliation {
            user_id: wallet.user_id,
            stored_balance: wallet.balance,
            ledger_sum,
            transactions_count,
        }
    }
}

/// Ledger repository kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryLedgerRepository {
    state: Mutex<LedgerState>,
}

impl MemoryLedgerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a superuser, the fallback platform account
    pub fn with_superuser(mut self, user_id: UserId) -> Self {
        self.state.get_mut().superusers.insert(user_id);
        self
    }

    pub async fn register_superuser(&self, user_id: UserId) {
        self.state.lock().await.superusers.insert(user_id);
    }

    /// Overwrite a stored balance without a ledger row.
    ///
    /// Only useful for exercising reconciliation.
    #[doc(hidden)]
    pub async fn corrupt_balance(&self, user_id: UserId, balance: Decimal) {
        self.state.lock().await.wallet_mut(user_id).balance = balance;
    }
}

#[async_trait]
impl LedgerRepository for MemoryLedgerRepository {
    async fn get_or_create_wallet(&self, user_id: UserId) -> WalletResult<Wallet> {
        Ok(self.state.lock().await.wallet_mut(user_id).clone())
    }

    async fn credit(
        &self,
        user_id: UserId,
        posting: &NewTransaction,
    ) -> WalletResult<WalletTransaction> {
        let mut state = self.state.lock().await;
        state.ensure_fits(user_id, posting.amount)?;
        Ok(state.post(user_id, posting.amount, posting))
    }

    async fn debit(
        &self,
        user_id: UserId,
        posting: &NewTransaction,
    ) -> WalletResult<WalletTransaction> {
        let mut state = self.state.lock().await;
        state.wallet_mut(user_id);
        state.ensure_covers(user_id, posting.amount)?;
        Ok(state.post(user_id, -posting.amount, posting))
    }

    async fn settle_purchase(&self, settlement: &Settlement) -> WalletResult<SettlementRecord> {
        let mut state = self.state.lock().await;
        if let Some(target) = &settlement.repeat_guard
            && state.owns(settlement.buyer_id, target)
        {
            return Err(WalletError::AlreadyPurchased(settlement.buyer_id));
        }
        state.wallet_mut(settlement.buyer_id);
        state.wallet_mut(settlement.seller_id);
        state.ensure_covers(settlement.buyer_id, settlement.amount)?;
        state.ensure_fits(settlement.seller_id, settlement.seller_earning)?;

        let mut buyer_transaction = state.post(
            settlement.buyer_id,
            -settlement.amount,
            &settlement.buyer_posting,
        );
        let seller_posting = settlement
            .seller_posting
            .clone()
            .with_related(Some(buyer_transaction.id));
        let seller_transaction = state.post(
            settlement.seller_id,
            settlement.seller_earning,
            &seller_posting,
        );

        if let Some(row) = state.transaction_mut(buyer_transaction.id) {
            row.related_transaction_id = Some(seller_transaction.id);
        }
        buyer_transaction.related_transaction_id = Some(seller_transaction.id);

        let now = Utc::now();
        let mut outbox_ids = Vec::with_capacity(settlement.side_effects.len());
        for effect in &settlement.side_effects {
            let id = state.outbox.len() as OutboxId + 1;
            state.outbox.push(OutboxEntry {
                id,
                effect: effect.clone(),
                status: OutboxStatus::Pending,
                attempts: 0,
                last_error: None,
                source_transaction_id: Some(buyer_transaction.id),
                created_at: now,
                processed_at: None,
            });
            outbox_ids.push(id);
        }

        Ok(SettlementRecord {
            buyer_transaction,
            seller_transaction,
            outbox_ids,
        })
    }

    async fn get_transaction(&self, id: TransactionId) -> WalletResult<Option<WalletTransaction>> {
        Ok(self.state.lock().await.transaction_mut(id).cloned())
    }

    async fn list_transactions(
        &self,
        user_id: UserId,
        filter: &StatementFilter,
    ) -> WalletResult<Vec<WalletTransaction>> {
        let filter = filter.normalized();
        let state = self.state.lock().await;

        // Rows are appended in time order, so reverse iteration is newest first
        Ok(state
            .transactions
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .filter(|t| filter.transaction_type.is_none_or(|ty| t.transaction_type == ty))
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .cloned()
            .collect())
    }

    async fn wallet_stats(&self, user_id: UserId) -> WalletResult<WalletStats> {
        let mut state = self.state.lock().await;
        let balance = state.wallet_mut(user_id).balance;

        let mut stats = WalletStats {
            balance,
            total_income: Decimal::ZERO,
            total_expense: Decimal::ZERO,
            transactions_count: 0,
            courses_purchased: 0,
            courses_sold: 0,
            last_transaction_date: None,
        };

        for t in state.transactions.iter().filter(|t| t.user_id == user_id) {
            stats.transactions_count += 1;
            if t.is_income() {
                stats.total_income += t.amount;
            } else if t.is_expense() {
                stats.total_expense -= t.amount;
            }
            if t.transaction_type.is_purchase() {
                stats.courses_purchased += 1;
            }
            if t.transaction_type.is_earning() {
                stats.courses_sold += 1;
            }
            stats.last_transaction_date = stats.last_transaction_date.max(Some(t.created_at));
        }

        Ok(stats)
    }

    async fn reconcile(&self, user_id: UserId) -> WalletResult<Reconciliation> {
        let state = self.state.lock().await;
        let wallet = state
            .wallets
            .get(&user_id)
            .ok_or(WalletError::WalletNotFound(user_id))?;
        Ok(state.reconciliation(wallet))
    }

    async fn reconcile_all(&self) -> WalletResult<Vec<Reconciliation>> {
        let state = self.state.lock().await;
        Ok(state
            .wallets
            .values()
            .map(|w| state.reconciliation(w))
            .collect())
    }

    async fn has_purchased(&self, user_id: UserId, target: &PurchaseTarget) -> WalletResult<bool> {
        Ok(self.state.lock().await.owns(user_id, target))
    }

    async fn find_platform_user(&self) -> WalletResult<Option<UserId>> {
        Ok(self.state.lock().await.superusers.first().copied())
    }

    async fn create_promo(&self, promo: &NewPromoCode) -> WalletResult<PromoCode> {
        let mut state = self.state.lock().await;
        if state.promos.iter().any(|p| p.code == promo.code) {
            return Err(WalletError::DuplicatePromoCode(promo.code.clone()));
        }

        let mut courses = promo.courses.clone();
        courses.sort_unstable();
        courses.dedup();
        let mut course_types = promo.course_types.clone();
        course_types.sort_unstable();
        course_types.dedup();

        let created = PromoCode {
            id: state.promos.len() as PromoCodeId + 1,
            code: promo.code.clone(),
            discount_type: promo.discount_type,
            value: promo.value,
            max_uses: promo.max_uses,
            uses: 0,
            valid_from: promo.valid_from,
            valid_to: promo.valid_to,
            is_active: true,
            courses,
            course_types,
            created_at: Utc::now(),
        };
        state.promos.push(created.clone());
        Ok(created)
    }

    async fn find_promo_by_code(&self, code: &str) -> WalletResult<Option<PromoCode>> {
        let state = self.state.lock().await;
        Ok(state.promos.iter().find(|p| p.code == code).cloned())
    }

    async fn find_promo(&self, id: PromoCodeId) -> WalletResult<Option<PromoCode>> {
        let state = self.state.lock().await;
        Ok(state.promos.iter().find(|p| p.id == id).cloned())
    }

    async fn set_promo_active(&self, code: &str, active: bool) -> WalletResult<bool> {
        let mut state = self.state.lock().await;
        match state.promos.iter_mut().find(|p| p.code == code) {
            Some(promo) => {
                promo.is_active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_outbox_entry(&self, id: OutboxId) -> WalletResult<Option<OutboxEntry>> {
        let state = self.state.lock().await;
        Ok(state.outbox.iter().find(|e| e.id == id).cloned())
    }

    async fn pending_outbox(&self, limit: i64) -> WalletResult<Vec<OutboxEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .outbox
            .iter()
            .filter(|e| e.status == OutboxStatus::Pending)
            .take(limit.max(1) as usize)
            .cloned()
            .collect())
    }

    async fn apply_side_effect(
        &self,
        id: OutboxId,
        platform_user: Option<UserId>,
    ) -> WalletResult<OutboxStatus> {
        let mut state = self.state.lock().await;
        let entry = state.outbox_mut(id)?.clone();
        if entry.status.is_final() {
            return Ok(entry.status);
        }

        let status = match &entry.effect {
            SideEffect::IncrementPromoUses { promo_code_id } => {
                let promo = state
                    .promos
                    .iter_mut()
                    .find(|p| p.id == *promo_code_id)
                    .ok_or_else(|| {
                        WalletError::TransactionFailed(format!(
                            "Promo code {promo_code_id} not found"
                        ))
                    })?;
                if promo.is_exhausted() {
                    return Err(WalletError::PromoUsageExhausted(*promo_code_id));
                }
                promo.uses += 1;
                OutboxStatus::Done
            }
            SideEffect::CreditPlatformCommission {
                amount,
                buyer_id,
                course_id,
                course_type_id,
                item_name,
            } => match platform_user {
                None => OutboxStatus::Skipped,
                Some(platform_id) => {
                    let posting = commission_posting(
                        *amount,
                        *buyer_id,
                        platform_id,
                        *course_id,
                        *course_type_id,
                        item_name,
                    );
                    state.ensure_fits(platform_id, *amount)?;
                    state.post(platform_id, *amount, &posting);
                    OutboxStatus::Done
                }
            },
        };

        let entry = state.outbox_mut(id)?;
        entry.status = status;
        entry.attempts += 1;
        entry.last_error = None;
        entry.processed_at = Some(Utc::now());
        Ok(status)
    }

    async fn record_side_effect_failure(
        &self,
        id: OutboxId,
        error: &str,
        max_attempts: u32,
    ) -> WalletResult<OutboxStatus> {
        let mut state = self.state.lock().await;
        let entry = state.outbox_mut(id)?;
        if entry.status.is_final() {
            return Ok(entry.status);
        }

        entry.attempts += 1;
        entry.last_error = Some(error.to_string());
        if u32::try_from(entry.attempts).unwrap_or(u32::MAX) >= max_attempts {
            entry.status = OutboxStatus::Failed;
            entry.processed_at = Some(Utc::now());
        }
        Ok(entry.status)
    }
}
