//! Wallet data models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CourseId, CourseTypeId, UserId, promo::PromoCodeId};

/// Wallet transaction ID type
pub type TransactionId = i64;

/// Default page size for statements
pub const DEFAULT_STATEMENT_LIMIT: i64 = 20;

/// Largest page size for statements
pub const MAX_STATEMENT_LIMIT: i64 = 1000;

/// Wallet model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: UserId,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ledger row (append-only). Positive amounts are credits, negative are debits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub original_amount: Decimal,
    pub discount_amount: Decimal,
    pub balance_after: Decimal,
    pub description: String,
    pub course_id: Option<CourseId>,
    pub course_type_id: Option<CourseTypeId>,
    pub from_user_id: Option<UserId>,
    pub to_user_id: Option<UserId>,
    pub related_transaction_id: Option<TransactionId>,
    pub promo_code_id: Option<PromoCodeId>,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    /// Credit row
    pub fn is_income(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Debit row
    pub fn is_expense(&self) -> bool {
        self.amount < Decimal::ZERO
    }
}

/// Transaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    CoursePurchase,
    CourseTypePurchase,
    CourseEarning,
    CourseTypeEarning,
    TransferSent,
    Refund,
    Bonus,
    Penalty,
    Commission,
}

impl TransactionType {
    /// All transaction types, in declaration order
    pub const ALL: [TransactionType; 11] = [
        TransactionType::Deposit,
        TransactionType::Withdrawal,
        TransactionType::CoursePurchase,
        TransactionType::CourseTypePurchase,
        TransactionType::CourseEarning,
        TransactionType::CourseTypeEarning,
        TransactionType::TransferSent,
        TransactionType::Refund,
        TransactionType::Bonus,
        TransactionType::Penalty,
        TransactionType::Commission,
    ];

    /// Stored representation
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::CoursePurchase => "course_purchase",
            TransactionType::CourseTypePurchase => "course_type_purchase",
            TransactionType::CourseEarning => "course_earning",
            TransactionType::CourseTypeEarning => "course_type_earning",
            TransactionType::TransferSent => "transfer_sent",
            TransactionType::Refund => "refund",
            TransactionType::Bonus => "bonus",
            TransactionType::Penalty => "penalty",
            TransactionType::Commission => "commission",
        }
    }

    /// Human-readable label for statements and reports
    pub fn label(self) -> &'static str {
        match self {
            TransactionType::Deposit => "Top-up",
            TransactionType::Withdrawal => "Withdrawal",
            TransactionType::CoursePurchase => "Course purchase (expense)",
            TransactionType::CourseTypePurchase => "Course type purchase (expense)",
            TransactionType::CourseEarning => "Course sale earning (income)",
            TransactionType::CourseTypeEarning => "Course type sale earning (income)",
            TransactionType::TransferSent => "Transfer sent",
            TransactionType::Refund => "Refund",
            TransactionType::Bonus => "Bonus",
            TransactionType::Penalty => "Penalty",
            TransactionType::Commission => "Commission (platform)",
        }
    }

    /// Buyer-side purchase types
    pub fn is_purchase(self) -> bool {
        matches!(
            self,
            TransactionType::CoursePurchase | TransactionType::CourseTypePurchase
        )
    }

    /// Seller-side earning types
    pub fn is_earning(self) -> bool {
        matches!(
            self,
            TransactionType::CourseEarning | TransactionType::CourseTypeEarning
        )
    }

    /// Seller-side type matching a buyer-side purchase type
    pub fn earning_counterpart(self) -> Option<TransactionType> {
        match self {
            TransactionType::CoursePurchase => Some(TransactionType::CourseEarning),
            TransactionType::CourseTypePurchase => Some(TransactionType::CourseTypeEarning),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionType {
    type Err = super::WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| super::WalletError::InvalidTransactionType(s.to_string()))
    }
}

/// Posting request for a single wallet.
///
/// `amount` is the magnitude; the repository applies the sign depending on
/// whether it credits or debits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub description: String,
    pub original_amount: Decimal,
    pub discount_amount: Decimal,
    pub course_id: Option<CourseId>,
    pub course_type_id: Option<CourseTypeId>,
    pub from_user_id: Option<UserId>,
    pub to_user_id: Option<UserId>,
    pub related_transaction_id: Option<TransactionId>,
    pub promo_code_id: Option<PromoCodeId>,
}

impl NewTransaction {
    pub fn new(
        transaction_type: TransactionType,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Self {
        Self {
            transaction_type,
            amount,
            description: description.into(),
            original_amount: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            course_id: None,
            course_type_id: None,
            from_user_id: None,
            to_user_id: None,
            related_transaction_id: None,
            promo_code_id: None,
        }
    }

    pub fn with_course(
        mut self,
        course_id: CourseId,
        course_type_id: Option<CourseTypeId>,
    ) -> Self {
        self.course_id = Some(course_id);
        self.course_type_id = course_type_id;
        self
    }

    pub fn with_parties(mut self, from_user_id: UserId, to_user_id: UserId) -> Self {
        self.from_user_id = Some(from_user_id);
        self.to_user_id = Some(to_user_id);
        self
    }

    pub fn with_pricing(mut self, original_amount: Decimal, discount_amount: Decimal) -> Self {
        self.original_amount = original_amount;
        self.discount_amount = discount_amount;
        self
    }

    pub fn with_promo_code(mut self, promo_code_id: Option<PromoCodeId>) -> Self {
        self.promo_code_id = promo_code_id;
        self
    }

    pub fn with_related(mut self, related_transaction_id: Option<TransactionId>) -> Self {
        self.related_transaction_id = related_transaction_id;
        self
    }
}

/// Statement query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementFilter {
    pub transaction_type: Option<TransactionType>,
    pub limit: i64,
    pub offset: i64,
}

impl StatementFilter {
    /// Limit clamped to 1..=MAX_STATEMENT_LIMIT, offset to >= 0
    pub fn normalized(&self) -> Self {
        Self {
            transaction_type: self.transaction_type,
            limit: self.limit.clamp(1, MAX_STATEMENT_LIMIT),
            offset: self.offset.max(0),
        }
    }
}

impl Default for StatementFilter {
    fn default() -> Self {
        Self {
            transaction_type: None,
            limit: DEFAULT_STATEMENT_LIMIT,
            offset: 0,
        }
    }
}

/// Aggregated wallet figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletStats {
    pub balance: Decimal,
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub transactions_count: i64,
    pub courses_purchased: i64,
    pub courses_sold: i64,
    pub last_transaction_date: Option<DateTime<Utc>>,
}

/// Stored balance versus the sum of the wallet's ledger rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub user_id: UserId,
    pub stored_balance: Decimal,
    pub ledger_sum: Decimal,
    pub transactions_count: i64,
}

impl Reconciliation {
    /// `stored_balance - ledger_sum`
    pub fn discrepancy(&self) -> Decimal {
        self.stored_balance - self.ledger_sum
    }

    pub fn is_consistent(&self) -> bool {
        self.discrepancy().is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::dec;

    #[test]
    fn test_transaction_type_round_trips_through_storage_name() {
        for t in TransactionType::ALL {
            assert_eq!(t.as_str().parse::<TransactionType>().unwrap(), t);
        }
        assert!("chargeback".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_transaction_type_serde_matches_storage_name() {
        let json = serde_json::to_string(&TransactionType::CourseTypeEarning).unwrap();
        assert_eq!(json, "\"course_type_earning\"");
    }

    #[test]
    fn test_earning_counterpart() {
        assert_eq!(
            TransactionType::CoursePurchase.earning_counterpart(),
            Some(TransactionType::CourseEarning)
        );
        assert_eq!(
            TransactionType::CourseTypePurchase.earning_counterpart(),
            Some(TransactionType::CourseTypeEarning)
        );
        assert_eq!(TransactionType::Deposit.earning_counterpart(), None);
    }

    #[test]
    fn test_statement_filter_normalized() {
        let filter = StatementFilter {
            transaction_type: None,
            limit: 50_000,
            offset: -3,
        }
        .normalized();
        assert_eq!(filter.limit, MAX_STATEMENT_LIMIT);
        assert_eq!(filter.offset, 0);

        let filter = StatementFilter {
            limit: 0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(filter.limit, 1);
    }

    #[test]
    fn test_reconciliation_discrepancy() {
        let rec = Reconciliation {
            user_id: 1,
            stored_balance: dec!(10.00),
            ledger_sum: dec!(7.50),
            transactions_count: 2,
        };
        assert_eq!(rec.discrepancy(), dec!(2.50));
        assert!(!rec.is_consistent());
    }
}
