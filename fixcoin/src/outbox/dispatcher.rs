//! Applies pending side effects from the outbox.

use std::sync::Arc;

use super::models::{DrainReport, OutboxId, OutboxStatus, SideEffectOutcome};
use crate::{UserId, config::LedgerConfig, db::LedgerRepository, wallet::WalletResult};

/// Outbox dispatcher
///
/// Every entry is applied in its own database transaction. A failing entry
/// is recorded and left pending until its attempt budget runs out; it never
/// affects the purchase that produced it or any other entry.
#[derive(Clone)]
pub struct OutboxDispatcher {
    repo: Arc<dyn LedgerRepository>,
    platform_user_id: Option<UserId>,
    max_attempts: u32,
    batch_size: i64,
}

impl OutboxDispatcher {
    pub fn new(repo: Arc<dyn LedgerRepository>, config: &LedgerConfig) -> Self {
        Self {
            repo,
            platform_user_id: config.platform_user_id,
            max_attempts: config.outbox_max_attempts.max(1),
            batch_size: config.outbox_batch_size.max(1),
        }
    }

    /// Configured platform account, else the lowest-id superuser
    pub async fn platform_user(&self) -> WalletResult<Option<UserId>> {
        match self.platform_user_id {
            Some(id) => Ok(Some(id)),
            None => self.repo.find_platform_user().await,
        }
    }

    /// Apply the given entries, in order, and report each outcome.
    ///
    /// Never fails as a whole: errors end up in the returned outcomes.
    pub async fn dispatch(&self, ids: &[OutboxId]) -> Vec<SideEffectOutcome> {
        if ids.is_empty() {
            return Vec::new();
        }

        let platform_user = match self.platform_user().await {
            Ok(user) => user,
            Err(e) => {
                log::warn!("Could not resolve platform account: {e}");
                None
            }
        };

        let mut outcomes = Vec::with_capacity(ids.len());
        for &id in ids {
            outcomes.push(self.dispatch_one(id, platform_user).await);
        }
        outcomes
    }

    async fn dispatch_one(&self, id: OutboxId, platform_user: Option<UserId>) -> SideEffectOutcome {
        let kind = match self.repo.get_outbox_entry(id).await {
            Ok(Some(entry)) => entry.effect.kind().to_string(),
            Ok(None) => "unknown".to_string(),
            Err(e) => {
                log::warn!("Could not load outbox entry {id}: {e}");
                "unknown".to_string()
            }
        };

        match self.repo.apply_side_effect(id, platform_user).await {
            Ok(status) => {
                if status == OutboxStatus::Skipped {
                    log::warn!("Outbox entry {id} ({kind}) skipped: no platform account");
                } else {
                    log::debug!("Outbox entry {id} ({kind}) {status}");
                }
                SideEffectOutcome {
                    entry_id: id,
                    kind,
                    status,
                    error: None,
                }
            }
            Err(e) => {
                let error = e.to_string();
                let status = match self
                    .repo
                    .record_side_effect_failure(id, &error, self.max_attempts)
                    .await
                {
                    Ok(status) => status,
                    Err(record_err) => {
                        log::warn!("Could not record failure of outbox entry {id}: {record_err}");
                        OutboxStatus::Pending
                    }
                };
                log::warn!("Outbox entry {id} ({kind}) failed, now {status}: {error}");
                SideEffectOutcome {
                    entry_id: id,
                    kind,
                    status,
                    error: Some(error),
                }
            }
        }
    }

    /// Retry pending entries, one batch
    pub async fn drain(&self) -> WalletResult<DrainReport> {
        let pending = self.repo.pending_outbox(self.batch_size).await?;
        let ids: Vec<OutboxId> = pending.iter().map(|entry| entry.id).collect();

        let mut report = DrainReport::default();
        for outcome in self.dispatch(&ids).await {
            report.record(outcome.status);
        }

        if report.processed > 0 {
            log::info!(
                "Drained outbox: {} processed, {} done, {} skipped, {} retrying, {} failed",
                report.processed,
                report.done,
                report.skipped,
                report.retrying,
                report.failed
            );
        }
        Ok(report)
    }
}
