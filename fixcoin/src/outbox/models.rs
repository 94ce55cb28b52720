//! Outbox data models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CourseId, CourseTypeId, UserId, promo::PromoCodeId, wallet::TransactionId};

/// Outbox entry ID type
pub type OutboxId = i64;

/// Work left over after a purchase settles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SideEffect {
    /// Count one use of the promo code applied to the purchase
    IncrementPromoUses { promo_code_id: PromoCodeId },

    /// Credit the platform account with its commission
    CreditPlatformCommission {
        amount: Decimal,
        buyer_id: UserId,
        course_id: CourseId,
        course_type_id: Option<CourseTypeId>,
        item_name: String,
    },
}

impl SideEffect {
    pub fn kind(&self) -> &'static str {
        match self {
            SideEffect::IncrementPromoUses { .. } => "increment_promo_uses",
            SideEffect::CreditPlatformCommission { .. } => "credit_platform_commission",
        }
    }
}

/// Outbox entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
    /// Waiting for (another) attempt
    Pending,
    /// Applied
    Done,
    /// Nothing to apply (e.g. no platform account configured)
    Skipped,
    /// Retry budget used up
    Failed,
}

impl OutboxStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Done => "done",
            OutboxStatus::Skipped => "skipped",
            OutboxStatus::Failed => "failed",
        }
    }

    /// Done, skipped or failed
    pub fn is_final(self) -> bool {
        !matches!(self, OutboxStatus::Pending)
    }
}

impl std::fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OutboxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OutboxStatus::Pending),
            "done" => Ok(OutboxStatus::Done),
            "skipped" => Ok(OutboxStatus::Skipped),
            "failed" => Ok(OutboxStatus::Failed),
            other => Err(format!("unknown outbox status: {other}")),
        }
    }
}

/// Outbox entry model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: OutboxId,
    pub effect: SideEffect,
    pub status: OutboxStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    /// Buyer-side transaction of the purchase that produced this entry
    pub source_transaction_id: Option<TransactionId>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Result of one dispatch attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideEffectOutcome {
    pub entry_id: OutboxId,
    pub kind: String,
    pub status: OutboxStatus,
    pub error: Option<String>,
}

/// Totals of one drain pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    pub processed: usize,
    pub done: usize,
    pub skipped: usize,
    pub retrying: usize,
    pub failed: usize,
}

impl DrainReport {
    pub(crate) fn record(&mut self, status: OutboxStatus) {
        self.processed += 1;
        match status {
            OutboxStatus::Done => self.done += 1,
            OutboxStatus::Skipped => self.skipped += 1,
            OutboxStatus::Pending => self.retrying += 1,
            OutboxStatus::Failed => self.failed += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::dec;

    #[test]
    fn test_side_effect_json_shape() {
        let effect = SideEffect::CreditPlatformCommission {
            amount: dec!(5.00),
            buyer_id: 1,
            course_id: 9,
            course_type_id: None,
            item_name: "Rust 101".to_string(),
        };
        let json = serde_json::to_value(&effect).unwrap();
        assert_eq!(json["kind"], "credit_platform_commission");
        assert_eq!(json["amount"], "5.00");

        let back: SideEffect = serde_json::from_value(json).unwrap();
        assert_eq!(back, effect);
    }

    #[test]
    fn test_drain_report_record() {
        let mut report = DrainReport::default();
        report.record(OutboxStatus::Done);
        report.record(OutboxStatus::Pending);
        report.record(OutboxStatus::Failed);
        assert_eq!(report.processed, 3);
        assert_eq!(report.done, 1);
        assert_eq!(report.retrying, 1);
        assert_eq!(report.failed, 1);
    }
}
