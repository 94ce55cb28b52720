//! Wallet manager: balance mutations, statements and reconciliation.

use super::{
    errors::{WalletError, WalletResult},
    models::{
        NewTransaction, Reconciliation, StatementFilter, TransactionType, Wallet, WalletStats,
        WalletTransaction,
    },
    money::ensure_positive,
};
use crate::{UserId, config::LedgerConfig, db::LedgerRepository};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Wallet manager
#[derive(Clone)]
pub struct WalletManager {
    repo: Arc<dyn LedgerRepository>,
    max_deposit: Decimal,
}

impl WalletManager {
    /// Create a new wallet manager
    ///
    /// # Arguments
    ///
    /// * `repo` - Ledger storage
    /// * `config` - Supplies the per-deposit limit
    pub fn new(repo: Arc<dyn LedgerRepository>, config: &LedgerConfig) -> Self {
        Self {
            repo,
            max_deposit: config.max_deposit,
        }
    }

    /// Get the user's wallet, creating an empty one on first access
    pub async fn get_wallet(&self, user_id: UserId) -> WalletResult<Wallet> {
        self.repo.get_or_create_wallet(user_id).await
    }

    /// Increase a balance and record one ledger row
    ///
    /// # Arguments
    ///
    /// * `user_id` - Wallet owner
    /// * `amount` - Strictly positive, at most two decimal places
    /// * `transaction_type` - Type stored on the ledger row
    /// * `description` - Free text stored on the ledger row
    ///
    /// # Returns
    ///
    /// * `WalletResult<WalletTransaction>` - The new row; its `balance_after`
    ///   is the balance after the increment
    pub async fn add_balance(
        &self,
        user_id: UserId,
        amount: Decimal,
        transaction_type: TransactionType,
        description: impl Into<String>,
    ) -> WalletResult<WalletTransaction> {
        let amount = ensure_positive(amount)?;
        let posting = NewTransaction::new(transaction_type, amount, description);
        let row = self.repo.credit(user_id, &posting).await?;

        log::info!(
            "Credited {} to user {} ({}), balance {}",
            amount,
            user_id,
            transaction_type,
            row.balance_after
        );
        Ok(row)
    }

    /// Decrease a balance and record one negative ledger row
    ///
    /// # Errors
    ///
    /// * `WalletError::InvalidAmount` - Amount not positive or too precise
    /// * `WalletError::InsufficientFunds` - Balance lower than `amount`; the
    ///   balance is left unchanged
    pub async fn subtract_balance(
        &self,
        user_id: UserId,
        amount: Decimal,
        transaction_type: TransactionType,
        description: impl Into<String>,
    ) -> WalletResult<WalletTransaction> {
        let amount = ensure_positive(amount)?;
        let posting = NewTransaction::new(transaction_type, amount, description);
        let row = self.repo.debit(user_id, &posting).await?;

        log::info!(
            "Debited {} from user {} ({}), balance {}",
            amount,
            user_id,
            transaction_type,
            row.balance_after
        );
        Ok(row)
    }

    /// Top up a wallet
    pub async fn deposit(
        &self,
        user_id: UserId,
        amount: Decimal,
        description: Option<String>,
    ) -> WalletResult<WalletTransaction> {
        if amount > self.max_deposit {
            return Err(WalletError::DepositLimitExceeded {
                limit: self.max_deposit,
                requested: amount,
            });
        }

        self.add_balance(
            user_id,
            amount,
            TransactionType::Deposit,
            description.unwrap_or_else(|| "Wallet top-up".to_string()),
        )
        .await
    }

    /// Pay out from a wallet
    pub async fn withdraw(
        &self,
        user_id: UserId,
        amount: Decimal,
        description: Option<String>,
    ) -> WalletResult<WalletTransaction> {
        self.subtract_balance(
            user_id,
            amount,
            TransactionType::Withdrawal,
            description.unwrap_or_else(|| "Wallet withdrawal".to_string()),
        )
        .await
    }

    /// Ledger rows of a wallet, newest first
    pub async fn statement(
        &self,
        user_id: UserId,
        filter: &StatementFilter,
    ) -> WalletResult<Vec<WalletTransaction>> {
        self.repo.list_transactions(user_id, filter).await
    }

    pub async fn stats(&self, user_id: UserId) -> WalletResult<WalletStats> {
        self.repo.wallet_stats(user_id).await
    }

    /// Compare a stored balance with the sum of its ledger rows
    pub async fn reconcile(&self, user_id: UserId) -> WalletResult<Reconciliation> {
        let report = self.repo.reconcile(user_id).await?;
        if !report.is_consistent() {
            log::warn!(
                "Wallet {} out of balance: stored {}, ledger {}",
                user_id,
                report.stored_balance,
                report.ledger_sum
            );
        }
        Ok(report)
    }

    /// Reconcile every wallet and return the inconsistent ones
    pub async fn audit(&self) -> WalletResult<Vec<Reconciliation>> {
        let reports = self.repo.reconcile_all().await?;
        let total = reports.len();

        let mismatched: Vec<_> = reports
            .into_iter()
            .filter(|r| !r.is_consistent())
            .collect();

        for report in &mismatched {
            log::warn!(
                "Wallet {} out of balance: stored {}, ledger {}, discrepancy {}",
                report.user_id,
                report.stored_balance,
                report.ledger_sum,
                report.discrepancy()
            );
        }
        log::info!(
            "Audited {} wallets, {} inconsistent",
            total,
            mismatched.len()
        );

        Ok(mismatched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryLedgerRepository;
    use rust_decimal::dec;

    fn manager() -> (WalletManager, Arc<MemoryLedgerRepository>) {
        let repo = Arc::new(MemoryLedgerRepository::new());
        let manager = WalletManager::new(repo.clone(), &LedgerConfig::default());
        (manager, repo)
    }

    #[tokio::test]
    async fn test_get_wallet_creates_empty_wallet() {
        let (manager, _) = manager();
        let wallet = manager.get_wallet(3).await.unwrap();
        assert_eq!(wallet.user_id, 3);
        assert_eq!(wallet.balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_add_balance_rejects_non_positive() {
        let (manager, _) = manager();
        for amount in [Decimal::ZERO, dec!(-5), dec!(0.001)] {
            let result = manager
                .add_balance(1, amount, TransactionType::Bonus, "bonus")
                .await;
            assert!(matches!(result, Err(WalletError::InvalidAmount(_))));
        }
        assert_eq!(manager.get_wallet(1).await.unwrap().balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_subtract_more_than_balance() {
        let (manager, _) = manager();
        manager.deposit(1, dec!(10.00), None).await.unwrap();

        let result = manager
            .subtract_balance(1, dec!(15.00), TransactionType::Penalty, "late")
            .await;
        assert!(matches!(result, Err(WalletError::InsufficientFunds { .. })));
        assert_eq!(manager.get_wallet(1).await.unwrap().balance, dec!(10.00));
    }

    #[tokio::test]
    async fn test_deposit_limit_and_default_description() {
        let (manager, _) = manager();
        let result = manager.deposit(1, dec!(100000.01), None).await;
        assert!(matches!(
            result,
            Err(WalletError::DepositLimitExceeded { .. })
        ));

        let row = manager.deposit(1, dec!(100000), None).await.unwrap();
        assert_eq!(row.description, "Wallet top-up");
        assert_eq!(row.transaction_type, TransactionType::Deposit);

        let row = manager
            .withdraw(1, dec!(1.00), Some("Payout #7".to_string()))
            .await
            .unwrap();
        assert_eq!(row.description, "Payout #7");
        assert_eq!(row.amount, dec!(-1.00));
    }

    #[tokio::test]
    async fn test_audit_reports_only_mismatches() {
        let (manager, repo) = manager();
        manager.deposit(1, dec!(5.00), None).await.unwrap();
        manager.deposit(2, dec!(7.00), None).await.unwrap();
        repo.corrupt_balance(2, dec!(9.00)).await;

        let mismatched = manager.audit().await.unwrap();
        assert_eq!(mismatched.len(), 1);
        assert_eq!(mismatched[0].user_id, 2);
        assert_eq!(mismatched[0].discrepancy(), dec!(2.00));

        assert!(manager.reconcile(1).await.unwrap().is_consistent());
    }
}
