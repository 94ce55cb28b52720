//! Promo code data models and discount computation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::PromoError;
use crate::{CourseId, CourseTypeId, wallet::money::round_money};

/// Promo code ID type
pub type PromoCodeId = i64;

/// Longest accepted promo code
pub const MAX_CODE_LEN: usize = 50;

/// Discount type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    /// `value` is a percentage of the original price (0..=100)
    Percent,
    /// `value` is a flat FixCoin amount
    Coins,
}

impl DiscountType {
    pub fn as_str(self) -> &'static str {
        match self {
            DiscountType::Percent => "percent",
            DiscountType::Coins => "coins",
        }
    }
}

impl std::fmt::Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DiscountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percent" => Ok(DiscountType::Percent),
            "coins" => Ok(DiscountType::Coins),
            other => Err(format!("unknown discount type: {other}")),
        }
    }
}

/// What a purchase is buying: a whole course, or one course type within it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseTarget {
    pub course_id: CourseId,
    pub course_type_id: Option<CourseTypeId>,
}

impl PurchaseTarget {
    pub fn course(course_id: CourseId) -> Self {
        Self {
            course_id,
            course_type_id: None,
        }
    }

    pub fn course_type(course_id: CourseId, course_type_id: CourseTypeId) -> Self {
        Self {
            course_id,
            course_type_id: Some(course_type_id),
        }
    }
}

/// Promo code model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoCode {
    pub id: PromoCodeId,
    pub code: String,
    pub discount_type: DiscountType,
    pub value: Decimal,
    /// `None` means unlimited
    pub max_uses: Option<i32>,
    pub uses: i32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub is_active: bool,
    /// Restriction set; empty together with `course_types` means any item
    pub courses: Vec<CourseId>,
    pub course_types: Vec<CourseTypeId>,
    pub created_at: DateTime<Utc>,
}

impl PromoCode {
    /// Active, inside its validity window and not used up
    pub fn check_valid_at(&self, now: DateTime<Utc>) -> Result<(), PromoError> {
        if !self.is_active {
            return Err(PromoError::Inactive(self.code.clone()));
        }
        if let Some(valid_from) = self.valid_from
            && now < valid_from
        {
            return Err(PromoError::NotYetValid {
                code: self.code.clone(),
                valid_from,
            });
        }
        if let Some(valid_to) = self.valid_to
            && now > valid_to
        {
            return Err(PromoError::Expired {
                code: self.code.clone(),
                valid_to,
            });
        }
        if self.is_exhausted() {
            return Err(PromoError::UsageLimitReached(self.code.clone()));
        }
        Ok(())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.check_valid_at(now).is_ok()
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_uses.is_some_and(|max| self.uses >= max)
    }

    /// Restriction check. A course-type purchase matches either the course
    /// type itself or its parent course.
    pub fn applies_to(&self, target: &PurchaseTarget) -> bool {
        if self.courses.is_empty() && self.course_types.is_empty() {
            return true;
        }
        if self.courses.contains(&target.course_id) {
            return true;
        }
        target
            .course_type_id
            .is_some_and(|id| self.course_types.contains(&id))
    }

    /// Validity and restriction checks combined
    pub fn check_applicable(
        &self,
        target: &PurchaseTarget,
        now: DateTime<Utc>,
    ) -> Result<(), PromoError> {
        self.check_valid_at(now)?;
        if !self.applies_to(target) {
            return Err(PromoError::NotApplicable(self.code.clone()));
        }
        Ok(())
    }

    /// Discount for `original_amount`, clamped to `[0, original_amount]`
    pub fn discount_for(&self, original_amount: Decimal) -> Decimal {
        let raw = match self.discount_type {
            DiscountType::Percent => match original_amount.checked_mul(self.value) {
                Some(scaled) => round_money(scaled / Decimal::ONE_HUNDRED),
                // Overflow only happens far above the clamp bounds
                None if self.value.is_sign_positive() => original_amount,
                None => Decimal::ZERO,
            },
            DiscountType::Coins => self.value,
        };
        raw.clamp(Decimal::ZERO, original_amount.max(Decimal::ZERO))
    }
}

/// Promo code creation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPromoCode {
    pub code: String,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub max_uses: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub courses: Vec<CourseId>,
    pub course_types: Vec<CourseTypeId>,
}

impl NewPromoCode {
    pub fn new(code: impl Into<String>, discount_type: DiscountType, value: Decimal) -> Self {
        Self {
            code: code.into(),
            discount_type,
            value,
            max_uses: None,
            valid_from: None,
            valid_to: None,
            courses: Vec::new(),
            course_types: Vec::new(),
        }
    }

    pub fn with_max_uses(mut self, max_uses: i32) -> Self {
        self.max_uses = Some(max_uses);
        self
    }

    pub fn with_window(
        mut self,
        valid_from: Option<DateTime<Utc>>,
        valid_to: Option<DateTime<Utc>>,
    ) -> Self {
        self.valid_from = valid_from;
        self.valid_to = valid_to;
        self
    }

    pub fn for_courses(mut self, courses: Vec<CourseId>) -> Self {
        self.courses = courses;
        self
    }

    pub fn for_course_types(mut self, course_types: Vec<CourseTypeId>) -> Self {
        self.course_types = course_types;
        self
    }

    /// Reject codes that could never be applied sensibly
    pub fn validate(&self) -> Result<(), PromoError> {
        let code = self.code.trim();
        if code.is_empty() || code.len() > MAX_CODE_LEN || code.len() != self.code.len() {
            return Err(PromoError::InvalidCode(self.code.clone()));
        }

        let value_ok = match self.discount_type {
            DiscountType::Percent => {
                self.value >= Decimal::ZERO && self.value <= Decimal::ONE_HUNDRED
            }
            DiscountType::Coins => self.value >= Decimal::ZERO,
        };
        if !value_ok || self.value.normalize().scale() > 2 {
            return Err(PromoError::InvalidValue(self.value));
        }

        if let Some(max_uses) = self.max_uses
            && max_uses < 0
        {
            return Err(PromoError::InvalidValue(Decimal::from(max_uses)));
        }

        if let (Some(from), Some(to)) = (self.valid_from, self.valid_to)
            && to < from
        {
            return Err(PromoError::InvalidWindow);
        }

        Ok(())
    }
}

/// Price breakdown for one purchase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub original_amount: Decimal,
    pub discount_amount: Decimal,
    pub final_amount: Decimal,
}

impl Quote {
    /// Apply `promo` (if any) to `original_amount`
    pub fn new(original_amount: Decimal, promo: Option<&PromoCode>) -> Self {
        let discount_amount = promo.map_or(Decimal::ZERO, |p| p.discount_for(original_amount));
        Self {
            original_amount,
            discount_amount,
            final_amount: original_amount - discount_amount,
        }
    }
}
