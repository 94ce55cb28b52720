//! Promo code management.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::models::{NewPromoCode, PromoCode, PurchaseTarget};
use crate::{
    db::LedgerRepository,
    wallet::{WalletError, WalletResult},
};

/// Promo code manager
#[derive(Clone)]
pub struct PromoManager {
    repo: Arc<dyn LedgerRepository>,
}

impl PromoManager {
    pub fn new(repo: Arc<dyn LedgerRepository>) -> Self {
        Self { repo }
    }

    /// Create a promo code
    ///
    /// # Errors
    ///
    /// * `WalletError::Promo` - Invalid code, value or window
    /// * `WalletError::DuplicatePromoCode` - Code already taken
    pub async fn create_promo(&self, promo: NewPromoCode) -> WalletResult<PromoCode> {
        promo.validate()?;
        let created = self.repo.create_promo(&promo).await?;
        log::info!(
            "Created promo code {} ({} {}, max uses {:?})",
            created.code,
            created.value,
            created.discount_type,
            created.max_uses
        );
        Ok(created)
    }

    /// Look up a promo code
    pub async fn find_promo(&self, code: &str) -> WalletResult<Option<PromoCode>> {
        self.repo.find_promo_by_code(code).await
    }

    /// Look up a promo code that must exist
    pub async fn get_promo(&self, code: &str) -> WalletResult<PromoCode> {
        self.find_promo(code)
            .await?
            .ok_or_else(|| WalletError::PromoNotFound(code.to_string()))
    }

    /// Switch a promo code off. Existing ledger rows keep their reference.
    pub async fn deactivate_promo(&self, code: &str) -> WalletResult<()> {
        if !self.repo.set_promo_active(code, false).await? {
            return Err(WalletError::PromoNotFound(code.to_string()));
        }
        log::info!("Deactivated promo code {code}");
        Ok(())
    }

    /// Fetch `code` and check it can be used for `target` at `now`
    ///
    /// # Errors
    ///
    /// * `WalletError::PromoNotFound` - Unknown code
    /// * `WalletError::Promo` - Inactive, outside its window, used up or restricted
    pub async fn resolve(
        &self,
        code: &str,
        target: &PurchaseTarget,
        now: DateTime<Utc>,
    ) -> WalletResult<PromoCode> {
        let promo = self.get_promo(code).await?;
        promo.check_applicable(target, now)?;
        Ok(promo)
    }

    /// `resolve` at the current time
    pub async fn resolve_now(
        &self,
        code: &str,
        target: &PurchaseTarget,
    ) -> WalletResult<PromoCode> {
        self.resolve(code, target, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::MemoryLedgerRepository,
        promo::{DiscountType, PromoError},
    };
    use rust_decimal::dec;

    fn manager() -> PromoManager {
        PromoManager::new(Arc::new(MemoryLedgerRepository::new()))
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let promos = manager();
        let created = promos
            .create_promo(NewPromoCode::new("SPRING", DiscountType::Percent, dec!(25)))
            .await
            .unwrap();
        assert_eq!(created.uses, 0);
        assert!(created.is_active);

        let found = promos.find_promo("SPRING").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(promos.find_promo("spring").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let promos = manager();
        promos
            .create_promo(NewPromoCode::new("ONCE", DiscountType::Coins, dec!(5)))
            .await
            .unwrap();
        let err = promos
            .create_promo(NewPromoCode::new("ONCE", DiscountType::Coins, dec!(7)))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::DuplicatePromoCode(code) if code == "ONCE"));
    }

    #[tokio::test]
    async fn test_invalid_definition_rejected() {
        let err = manager()
            .create_promo(NewPromoCode::new("HALF", DiscountType::Percent, dec!(150)))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::Promo(PromoError::InvalidValue(_))));
    }

    #[tokio::test]
    async fn test_deactivate() {
        let promos = manager();
        promos
            .create_promo(NewPromoCode::new("OFF", DiscountType::Coins, dec!(5)))
            .await
            .unwrap();
        promos.deactivate_promo("OFF").await.unwrap();

        let err = promos
            .resolve_now("OFF", &PurchaseTarget::course(1))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::Promo(PromoError::Inactive(_))));

        assert!(matches!(
            promos.deactivate_promo("MISSING").await,
            Err(WalletError::PromoNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_checks_restrictions() {
        let promos = manager();
        promos
            .create_promo(
                NewPromoCode::new("PY", DiscountType::Percent, dec!(10)).for_courses(vec![3]),
            )
            .await
            .unwrap();

        assert!(promos.resolve_now("PY", &PurchaseTarget::course(3)).await.is_ok());
        let err = promos
            .resolve_now("PY", &PurchaseTarget::course(4))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::Promo(PromoError::NotApplicable(_))));
        assert!(matches!(
            promos.resolve_now("NOPE", &PurchaseTarget::course(3)).await,
            Err(WalletError::PromoNotFound(_))
        ));
    }
}
