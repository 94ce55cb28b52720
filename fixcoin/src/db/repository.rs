//! Repository trait for the ledger and its PostgreSQL implementation.
//!
//! Every method that changes balances runs in a single database transaction.
//! Debits never read-then-write: they use a guarded update
//! (`balance >= amount`) and treat zero affected rows as insufficient funds.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool, Postgres, Row, Transaction, postgres::PgRow, types::Json};

use crate::{
    UserId,
    outbox::{OutboxEntry, OutboxId, OutboxStatus, SideEffect},
    promo::{DiscountType, NewPromoCode, PromoCode, PromoCodeId, PurchaseTarget},
    purchase::{Settlement, SettlementRecord},
    wallet::{
        NewTransaction, Reconciliation, StatementFilter, TransactionId, TransactionType, Wallet,
        WalletError, WalletResult, WalletStats, WalletTransaction,
    },
};

/// Storage operations of the ledger
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Get the user's wallet, creating an empty one if missing
    async fn get_or_create_wallet(&self, user_id: UserId) -> WalletResult<Wallet>;

    /// Increase the balance by `posting.amount` and append one positive row
    async fn credit(&self, user_id: UserId, posting: &NewTransaction)
    -> WalletResult<WalletTransaction>;

    /// Decrease the balance by `posting.amount` and append one negative row
    ///
    /// Fails with `InsufficientFunds` without touching the balance when it is
    /// lower than the amount.
    async fn debit(&self, user_id: UserId, posting: &NewTransaction)
    -> WalletResult<WalletTransaction>;

    /// Commit a purchase: buyer debit, seller credit, the mutual link and the
    /// outbox entries, all or nothing.
    async fn settle_purchase(&self, settlement: &Settlement) -> WalletResult<SettlementRecord>;

    /// Get a single ledger row
    async fn get_transaction(&self, id: TransactionId) -> WalletResult<Option<WalletTransaction>>;

    /// Ledger rows of a wallet, newest first
    async fn list_transactions(
        &self,
        user_id: UserId,
        filter: &StatementFilter,
    ) -> WalletResult<Vec<WalletTransaction>>;

    /// Aggregated figures of a wallet (created if missing)
    async fn wallet_stats(&self, user_id: UserId) -> WalletResult<WalletStats>;

    /// Stored balance versus ledger sum for one wallet
    async fn reconcile(&self, user_id: UserId) -> WalletResult<Reconciliation>;

    /// Stored balance versus ledger sum for every wallet
    async fn reconcile_all(&self) -> WalletResult<Vec<Reconciliation>>;

    /// True if the user already bought this course (or course type)
    async fn has_purchased(&self, user_id: UserId, target: &PurchaseTarget) -> WalletResult<bool>;

    /// Account that collects commissions when none is configured
    async fn find_platform_user(&self) -> WalletResult<Option<UserId>>;

    /// Create a promo code with its restriction sets
    async fn create_promo(&self, promo: &NewPromoCode) -> WalletResult<PromoCode>;

    /// Find promo code by its code string (case-sensitive)
    async fn find_promo_by_code(&self, code: &str) -> WalletResult<Option<PromoCode>>;

    /// Find promo code by ID
    async fn find_promo(&self, id: PromoCodeId) -> WalletResult<Option<PromoCode>>;

    /// Switch a promo code on or off; false if the code does not exist
    async fn set_promo_active(&self, code: &str, active: bool) -> WalletResult<bool>;

    /// Get a single outbox entry
    async fn get_outbox_entry(&self, id: OutboxId) -> WalletResult<Option<OutboxEntry>>;

    /// Oldest pending outbox entries
    async fn pending_outbox(&self, limit: i64) -> WalletResult<Vec<OutboxEntry>>;

    /// Apply a pending side effect and mark its entry in one transaction.
    ///
    /// Entries that are no longer pending are left alone and their current
    /// status is returned.
    async fn apply_side_effect(
        &self,
        id: OutboxId,
        platform_user: Option<UserId>,
    ) -> WalletResult<OutboxStatus>;

    /// Count a failed attempt; the entry becomes `failed` once `max_attempts`
    /// is reached.
    async fn record_side_effect_failure(
        &self,
        id: OutboxId,
        error: &str,
        max_attempts: u32,
    ) -> WalletResult<OutboxStatus>;
}

const TRANSACTION_COLUMNS: &str = "id, user_id, transaction_type, amount, original_amount, \
    discount_amount, balance_after, description, course_id, course_type_id, from_user_id, \
    to_user_id, related_transaction_id, promo_code_id, created_at";

const OUTBOX_COLUMNS: &str =
    "id, effect, status, attempts, last_error, source_transaction_id, created_at, processed_at";

const PROMO_SELECT: &str = r#"
    SELECT p.id, p.code, p.discount_type, p.value, p.max_uses, p.uses,
           p.valid_from, p.valid_to, p.is_active, p.created_at,
           ARRAY(SELECT c.course_id FROM promo_code_courses c
                 WHERE c.promo_code_id = p.id ORDER BY c.course_id) AS courses,
           ARRAY(SELECT t.course_type_id FROM promo_code_course_types t
                 WHERE t.promo_code_id = p.id ORDER BY t.course_type_id) AS course_types
    FROM promo_codes p
"#;

/// Default PostgreSQL implementation of `LedgerRepository`
#[derive(Clone)]
pub struct PgLedgerRepository {
    pool: PgPool,
}

impl PgLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerRepository for PgLedgerRepository {
    async fn get_or_create_wallet(&self, user_id: UserId) -> WalletResult<Wallet> {
        sqlx::query("INSERT INTO wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        let row = sqlx::query(
            r#"
            SELECT user_id, balance, created_at, updated_at
            FROM wallets
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(WalletError::WalletNotFound(user_id))?;

        Ok(Wallet {
            user_id: row.try_get("user_id")?,
            balance: row.try_get("balance")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn credit(
        &self,
        user_id: UserId,
        posting: &NewTransaction,
    ) -> WalletResult<WalletTransaction> {
        let mut tx = self.pool.begin().await?;

        ensure_wallet(&mut tx, user_id).await?;
        let new_balance = credit_wallet(&mut tx, user_id, posting.amount).await?;
        let row = insert_transaction(&mut tx, user_id, posting.amount, new_balance, posting).await?;

        tx.commit().await?;
        Ok(row)
    }

    async fn debit(
        &self,
        user_id: UserId,
        posting: &NewTransaction,
    ) -> WalletResult<WalletTransaction> {
        let mut tx = self.pool.begin().await?;

        ensure_wallet(&mut tx, user_id).await?;
        let new_balance = debit_wallet(&mut tx, user_id, posting.amount).await?;
        let row =
            insert_transaction(&mut tx, user_id, -posting.amount, new_balance, posting).await?;

        tx.commit().await?;
        Ok(row)
    }

    async fn settle_purchase(&self, settlement: &Settlement) -> WalletResult<SettlementRecord> {
        let mut tx = self.pool.begin().await?;

        ensure_wallet(&mut tx, settlement.buyer_id).await?;
        ensure_wallet(&mut tx, settlement.seller_id).await?;

        // Lock both rows in a fixed order so opposite purchases cannot deadlock
        sqlx::query(
            "SELECT user_id FROM wallets WHERE user_id = ANY($1) ORDER BY user_id FOR UPDATE",
        )
        .bind(vec![settlement.buyer_id, settlement.seller_id])
        .fetch_all(&mut *tx)
        .await?;

        // The buyer lock serializes this buyer's checkouts
        if let Some(target) = &settlement.repeat_guard
            && purchase_exists(&mut *tx, settlement.buyer_id, target).await?
        {
            return Err(WalletError::AlreadyPurchased(settlement.buyer_id));
        }

        let buyer_balance = debit_wallet(&mut tx, settlement.buyer_id, settlement.amount).await?;
        let mut buyer_transaction = insert_transaction(
            &mut tx,
            settlement.buyer_id,
            -settlement.amount,
            buyer_balance,
            &settlement.buyer_posting,
        )
        .await?;

        let seller_balance =
            credit_wallet(&mut tx, settlement.seller_id, settlement.seller_earning).await?;
        let seller_posting = settlement
            .seller_posting
            .clone()
            .with_related(Some(buyer_transaction.id));
        let seller_transaction = insert_transaction(
            &mut tx,
            settlement.seller_id,
            settlement.seller_earning,
            seller_balance,
            &seller_posting,
        )
        .await?;

        sqlx::query("UPDATE wallet_transactions SET related_transaction_id = $1 WHERE id = $2")
            .bind(seller_transaction.id)
            .bind(buyer_transaction.id)
            .execute(&mut *tx)
            .await?;
        buyer_transaction.related_transaction_id = Some(seller_transaction.id);

        let mut outbox_ids = Vec::with_capacity(settlement.side_effects.len());
        for effect in &settlement.side_effects {
            let row = sqlx::query(
                r#"
                INSERT INTO ledger_outbox (effect, source_transaction_id)
                VALUES ($1, $2)
                RETURNING id
                "#,
            )
            .bind(Json(effect))
            .bind(buyer_transaction.id)
            .fetch_one(&mut *tx)
            .await?;
            outbox_ids.push(row.try_get("id")?);
        }

        tx.commit().await?;

        Ok(SettlementRecord {
            buyer_transaction,
            seller_transaction,
            outbox_ids,
        })
    }

    async fn get_transaction(&self, id: TransactionId) -> WalletResult<Option<WalletTransaction>> {
        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM wallet_transactions WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(transaction_from_row).transpose()
    }

    async fn list_transactions(
        &self,
        user_id: UserId,
        filter: &StatementFilter,
    ) -> WalletResult<Vec<WalletTransaction>> {
        let filter = filter.normalized();
        let sql = format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM wallet_transactions
            WHERE user_id = $1 AND ($2::TEXT IS NULL OR transaction_type = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(filter.transaction_type.map(TransactionType::as_str))
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(transaction_from_row).collect()
    }

    async fn wallet_stats(&self, user_id: UserId) -> WalletResult<WalletStats> {
        let wallet = self.get_or_create_wallet(user_id).await?;

        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(amount) FILTER (WHERE amount > 0), 0) AS total_income,
                COALESCE(-SUM(amount) FILTER (WHERE amount < 0), 0) AS total_expense,
                COUNT(*) AS transactions_count,
                COUNT(*) FILTER (
                    WHERE transaction_type IN ('course_purchase', 'course_type_purchase')
                ) AS courses_purchased,
                COUNT(*) FILTER (
                    WHERE transaction_type IN ('course_earning', 'course_type_earning')
                ) AS courses_sold,
                MAX(created_at) AS last_transaction_date
            FROM wallet_transactions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(WalletStats {
            balance: wallet.balance,
            total_income: row.try_get("total_income")?,
            total_expense: row.try_get("total_expense")?,
            transactions_count: row.try_get("transactions_count")?,
            courses_purchased: row.try_get("courses_purchased")?,
            courses_sold: row.try_get("courses_sold")?,
            last_transaction_date: row.try_get("last_transaction_date")?,
        })
    }

    async fn reconcile(&self, user_id: UserId) -> WalletResult<Reconciliation> {
        let row = sqlx::query(
            r#"
            SELECT w.user_id, w.balance,
                   COALESCE(SUM(t.amount), 0) AS ledger_sum,
                   COUNT(t.id) AS transactions_count
            FROM wallets w
            LEFT JOIN wallet_transactions t ON t.user_id = w.user_id
            WHERE w.user_id = $1
            GROUP BY w.user_id, w.balance
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(WalletError::WalletNotFound(user_id))?;

        reconciliation_from_row(&row)
    }

    async fn reconcile_all(&self) -> WalletResult<Vec<Reconciliation>> {
        let rows = sqlx::query(
            r#"
            SELECT w.user_id, w.balance,
                   COALESCE(SUM(t.amount), 0) AS ledger_sum,
                   COUNT(t.id) AS transactions_count
            FROM wallets w
            LEFT JOIN wallet_transactions t ON t.user_id = w.user_id
            GROUP BY w.user_id, w.balance
            ORDER BY w.user_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(reconciliation_from_row).collect()
    }

    async fn has_purchased(&self, user_id: UserId, target: &PurchaseTarget) -> WalletResult<bool> {
        purchase_exists(&self.pool, user_id, target).await
    }

    async fn find_platform_user(&self) -> WalletResult<Option<UserId>> {
        let id = sqlx::query_scalar::<_, UserId>(
            "SELECT id FROM users WHERE is_superuser ORDER BY id LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn create_promo(&self, promo: &NewPromoCode) -> WalletResult<PromoCode> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO promo_codes (code, discount_type, value, max_uses, valid_from, valid_to)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&promo.code)
        .bind(promo.discount_type.as_str())
        .bind(promo.value)
        .bind(promo.max_uses)
        .bind(promo.valid_from)
        .bind(promo.valid_to)
        .fetch_one(&mut *tx)
        .await;

        let id: PromoCodeId = match inserted {
            Ok(row) => row.try_get("id")?,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(WalletError::DuplicatePromoCode(promo.code.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        sqlx::query(
            r#"
            INSERT INTO promo_code_courses (promo_code_id, course_id)
            SELECT $1, UNNEST($2::BIGINT[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(id)
        .bind(&promo.courses)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO promo_code_course_types (promo_code_id, course_type_id)
            SELECT $1, UNNEST($2::BIGINT[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(id)
        .bind(&promo.course_types)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.find_promo(id)
            .await?
            .ok_or_else(|| WalletError::TransactionFailed(format!("Promo code {id} vanished")))
    }

    async fn find_promo_by_code(&self, code: &str) -> WalletResult<Option<PromoCode>> {
        let id = sqlx::query_scalar::<_, PromoCodeId>("SELECT id FROM promo_codes WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        match id {
            Some(id) => self.find_promo(id).await,
            None => Ok(None),
        }
    }

    async fn find_promo(&self, id: PromoCodeId) -> WalletResult<Option<PromoCode>> {
        let sql = format!("{PROMO_SELECT} WHERE p.id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(promo_from_row).transpose()
    }

    async fn set_promo_active(&self, code: &str, active: bool) -> WalletResult<bool> {
        let result = sqlx::query("UPDATE promo_codes SET is_active = $1 WHERE code = $2")
            .bind(active)
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_outbox_entry(&self, id: OutboxId) -> WalletResult<Option<OutboxEntry>> {
        let sql = format!("SELECT {OUTBOX_COLUMNS} FROM ledger_outbox WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(outbox_from_row).transpose()
    }

    async fn pending_outbox(&self, limit: i64) -> WalletResult<Vec<OutboxEntry>> {
        let sql = format!(
            "SELECT {OUTBOX_COLUMNS} FROM ledger_outbox \
             WHERE status = 'pending' ORDER BY id LIMIT $1"
        );
        let rows = sqlx::query(&sql)
            .bind(limit.max(1))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(outbox_from_row).collect()
    }

    async fn apply_side_effect(
        &self,
        id: OutboxId,
        platform_user: Option<UserId>,
    ) -> WalletResult<OutboxStatus> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {OUTBOX_COLUMNS} FROM ledger_outbox WHERE id = $1 FOR UPDATE");
        let entry = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .as_ref()
            .map(outbox_from_row)
            .transpose()?
            .ok_or_else(|| WalletError::TransactionFailed(format!("Outbox entry {id} not found")))?;

        if entry.status.is_final() {
            return Ok(entry.status);
        }

        let status = match &entry.effect {
            SideEffect::IncrementPromoUses { promo_code_id } => {
                let result = sqlx::query(
                    r#"
                    UPDATE promo_codes
                    SET uses = uses + 1
                    WHERE id = $1 AND (max_uses IS NULL OR uses < max_uses)
                    "#,
                )
                .bind(promo_code_id)
                .execute(&mut *tx)
                .await?;

                if result.rows_affected() == 0 {
                    let exists = sqlx::query_scalar::<_, bool>(
                        "SELECT EXISTS(SELECT 1 FROM promo_codes WHERE id = $1)",
                    )
                    .bind(promo_code_id)
                    .fetch_one(&mut *tx)
                    .await?;
                    if !exists {
                        return Err(WalletError::TransactionFailed(format!(
                            "Promo code {promo_code_id} not found"
                        )));
                    }
                    return Err(WalletError::PromoUsageExhausted(*promo_code_id));
                }
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
                    ensure_wallet(&mut tx, platform_id).await?;
                    let balance = credit_wallet(&mut tx, platform_id, *amount).await?;
                    insert_transaction(&mut tx, platform_id, *amount, balance, &posting).await?;
                    OutboxStatus::Done
                }
            },
        };

        sqlx::query(
            r#"
            UPDATE ledger_outbox
            SET status = $1, attempts = attempts + 1, last_error = NULL, processed_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(status.as_str())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(status)
    }

    async fn record_side_effect_failure(
        &self,
        id: OutboxId,
        error: &str,
        max_attempts: u32,
    ) -> WalletResult<OutboxStatus> {
        let max_attempts = i32::try_from(max_attempts).unwrap_or(i32::MAX);
        let row = sqlx::query(
            r#"
            UPDATE ledger_outbox
            SET attempts = attempts + 1,
                last_error = $2,
                status = CASE WHEN attempts + 1 >= $3 THEN 'failed' ELSE 'pending' END,
                processed_at = CASE WHEN attempts + 1 >= $3 THEN NOW() ELSE processed_at END
            WHERE id = $1 AND status = 'pending'
            RETURNING status
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(max_attempts)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => parse_status(&row.try_get::<String, _>("status")?),
            None => self
                .get_outbox_entry(id)
                .await?
                .map(|entry| entry.status)
                .ok_or_else(|| {
                    WalletError::TransactionFailed(format!("Outbox entry {id} not found"))
                }),
        }
    }
}

/// Ledger row for a platform commission credit
pub(crate) fn commission_posting(
    amount: Decimal,
    buyer_id: UserId,
    platform_id: UserId,
    course_id: crate::CourseId,
    course_type_id: Option<crate::CourseTypeId>,
    item_name: &str,
) -> NewTransaction {
    NewTransaction::new(
        TransactionType::Commission,
        amount,
        format!("Platform commission: {item_name}"),
    )
    .with_course(course_id, course_type_id)
    .with_parties(buyer_id, platform_id)
}

/// True if `user_id` has a purchase row for `target`
async fn purchase_exists<'e, E>(
    executor: E,
    user_id: UserId,
    target: &PurchaseTarget,
) -> WalletResult<bool>
where
    E: PgExecutor<'e>,
{
    let query = match target.course_type_id {
        Some(course_type_id) => sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM wallet_transactions
                WHERE user_id = $1 AND course_type_id = $2
                  AND transaction_type = 'course_type_purchase'
            )
            "#,
        )
        .bind(user_id)
        .bind(course_type_id),
        None => sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM wallet_transactions
                WHERE user_id = $1 AND course_id = $2
                  AND transaction_type = 'course_purchase'
            )
            "#,
        )
        .bind(user_id)
        .bind(target.course_id),
    };

    Ok(query.fetch_one(executor).await?)
}

async fn ensure_wallet(tx: &mut Transaction<'_, Postgres>, user_id: UserId) -> WalletResult<()> {
    sqlx::query("INSERT INTO wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn credit_wallet(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    amount: Decimal,
) -> WalletResult<Decimal> {
    let row = sqlx::query(
        "UPDATE wallets
         SET balance = balance + $1, updated_at = NOW()
         WHERE user_id = $2
         RETURNING balance",
    )
    .bind(amount)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(WalletError::WalletNotFound(user_id))?;

    Ok(row.try_get("balance")?)
}

/// Guarded debit: succeeds only if the balance covers `amount`
async fn debit_wallet(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    amount: Decimal,
) -> WalletResult<Decimal> {
    let row = sqlx::query(
        "UPDATE wallets
         SET balance = balance - $1, updated_at = NOW()
         WHERE user_id = $2 AND balance >= $1
         RETURNING balance",
    )
    .bind(amount)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?;

    match row {
        Some(row) => Ok(row.try_get("balance")?),
        None => {
            // Either wallet doesn't exist or insufficient balance
            let available: Option<Decimal> =
                sqlx::query_scalar("SELECT balance FROM wallets WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_optional(&mut **tx)
                    .await?;

            match available {
                Some(available) => {
                    log::warn!(
                        "Rejected debit of {amount} for user {user_id}: balance {available}"
                    );
                    Err(WalletError::InsufficientFunds {
                        user_id,
                        available,
                        required: amount,
                    })
                }
                None => Err(WalletError::WalletNotFound(user_id)),
            }
        }
    }
}

async fn insert_transaction(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    signed_amount: Decimal,
    balance_after: Decimal,
    posting: &NewTransaction,
) -> WalletResult<WalletTransaction> {
    let sql = format!(
        r#"
        INSERT INTO wallet_transactions
            (user_id, transaction_type, amount, original_amount, discount_amount, balance_after,
             description, course_id, course_type_id, from_user_id, to_user_id,
             related_transaction_id, promo_code_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING {TRANSACTION_COLUMNS}
        "#
    );

    let row = sqlx::query(&sql)
        .bind(user_id)
        .bind(posting.transaction_type.as_str())
        .bind(signed_amount)
        .bind(posting.original_amount)
        .bind(posting.discount_amount)
        .bind(balance_after)
        .bind(&posting.description)
        .bind(posting.course_id)
        .bind(posting.course_type_id)
        .bind(posting.from_user_id)
        .bind(posting.to_user_id)
        .bind(posting.related_transaction_id)
        .bind(posting.promo_code_id)
        .fetch_one(&mut **tx)
        .await?;

    transaction_from_row(&row)
}

fn transaction_from_row(row: &PgRow) -> WalletResult<WalletTransaction> {
    Ok(WalletTransaction {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        transaction_type: row.try_get::<String, _>("transaction_type")?.parse()?,
        amount: row.try_get("amount")?,
        original_amount: row.try_get("original_amount")?,
        discount_amount: row.try_get("discount_amount")?,
        balance_after: row.try_get("balance_after")?,
        description: row.try_get("description")?,
        course_id: row.try_get("course_id")?,
        course_type_id: row.try_get("course_type_id")?,
        from_user_id: row.try_get("from_user_id")?,
        to_user_id: row.try_get("to_user_id")?,
        related_transaction_id: row.try_get("related_transaction_id")?,
        promo_code_id: row.try_get("promo_code_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn reconciliation_from_row(row: &PgRow) -> WalletResult<Reconciliation> {
    Ok(Reconciliation {
        user_id: row.try_get("user_id")?,
        stored_balance: row.try_get("balance")?,
        ledger_sum: row.try_get("ledger_sum")?,
        transactions_count: row.try_get("transactions_count")?,
    })
}

fn promo_from_row(row: &PgRow) -> WalletResult<PromoCode> {
    let discount_type: DiscountType = row
        .try_get::<String, _>("discount_type")?
        .parse()
        .map_err(|e: String| sqlx::Error::Decode(e.into()))?;

    Ok(PromoCode {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        discount_type,
        value: row.try_get("value")?,
        max_uses: row.try_get("max_uses")?,
        uses: row.try_get("uses")?,
        valid_from: row.try_get("valid_from")?,
        valid_to: row.try_get("valid_to")?,
        is_active: row.try_get("is_active")?,
        courses: row.try_get("courses")?,
        course_types: row.try_get("course_types")?,
        created_at: row.try_get("created_at")?,
    })
}

fn outbox_from_row(row: &PgRow) -> WalletResult<OutboxEntry> {
    let Json(effect) = row.try_get::<Json<SideEffect>, _>("effect")?;
    Ok(OutboxEntry {
        id: row.try_get("id")?,
        effect,
        status: parse_status(&row.try_get::<String, _>("status")?)?,
        attempts: row.try_get("attempts")?,
        last_error: row.try_get("last_error")?,
        source_transaction_id: row.try_get("source_transaction_id")?,
        created_at: row.try_get("created_at")?,
        processed_at: row.try_get("processed_at")?,
    })
}

fn parse_status(value: &str) -> WalletResult<OutboxStatus> {
    value
        .parse()
        .map_err(|e: String| sqlx::Error::Decode(e.into()).into())
}
