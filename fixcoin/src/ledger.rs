use std::sync::Arc;

use crate::{
    config::LedgerConfig, db::LedgerRepository, outbox::OutboxDispatcher, promo::PromoManager,
    purchase::PurchaseService, wallet::WalletManager,
};

/// Entry point bundling the ledger services over one repository
#[derive(Clone)]
pub struct Ledger {
    config: LedgerConfig,
    wallets: WalletManager,
    purchases: PurchaseService,
    promos: PromoManager,
    outbox: OutboxDispatcher,
}

impl Ledger {
    pub fn new(repo: Arc<dyn LedgerRepository>, config: LedgerConfig) -> Self {
        Self {
            wallets: WalletManager::new(repo.clone(), &config),
            purchases: PurchaseService::new(repo.clone(), &config),
            promos: PromoManager::new(repo.clone()),
            outbox: OutboxDispatcher::new(repo, &config),
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn wallets(&self) -> &WalletManager {
        &self.wallets
    }

    pub fn purchases(&self) -> &PurchaseService {
        &self.purchases
    }

    pub fn promos(&self) -> &PromoManager {
        &self.promos
    }

    pub fn outbox(&self) -> &OutboxDispatcher {
        &self.outbox
    }
}
