//! # Discount Validator
//!
//! Looks a code up and runs the eligibility rules from
//! [`storefront_core::discount`] against the current time.
//!
//! A rejected code is an ordinary answer, returned as the inner `Err`. The
//! outer `Result` only fails when the store itself does.

use chrono::{DateTime, Utc};
use tracing::debug;

use storefront_core::discount::{evaluate, AppliedDiscount, DiscountRejection};
use storefront_core::Money;
use storefront_db::Database;

use crate::error::CheckoutResult;

/// Outcome of validating one code against one subtotal.
pub type DiscountVerdict = Result<AppliedDiscount, DiscountRejection>;

#[derive(Debug, Clone)]
pub struct DiscountValidator {
    db: Database,
}

impl DiscountValidator {
    pub fn new(db: Database) -> Self {
        DiscountValidator { db }
    }

    /// Validates `code` against `subtotal` now. Never consumes the code.
    pub async fn validate(&self, code: &str, subtotal: Money) -> CheckoutResult<DiscountVerdict> {
        self.validate_at(code, subtotal, Utc::now()).await
    }

    /// Same as [`validate`](Self::validate) with an explicit clock.
    pub async fn validate_at(
        &self,
        code: &str,
        subtotal: Money,
        now: DateTime<Utc>,
    ) -> CheckoutResult<DiscountVerdict> {
        let stored = self.db.discounts().find_by_code(code).await?;
        let verdict = evaluate(stored.as_ref(), subtotal, now);

        match &verdict {
            Ok(applied) => debug!(
                code = %applied.code,
                discount = %applied.discount_amount,
                "Discount code accepted"
            ),
            Err(rejection) => debug!(code = %code, reason = rejection.code(), "Discount code rejected"),
        }

        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use storefront_core::{DiscountCode, DiscountKind};
    use storefront_db::DbConfig;

    fn welcome10() -> DiscountCode {
        DiscountCode {
            code: "WELCOME10".into(),
            kind: DiscountKind::Percentage,
            value: 1000,
            min_purchase_cents: None,
            max_discount_cents: None,
            usage_limit: Some(1),
            used_count: 0,
            valid_from: None,
            valid_until: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_welcome10_on_hundred_euros() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.discounts().insert(&welcome10()).await.unwrap();
        let validator = DiscountValidator::new(db);

        let applied = validator
            .validate("welcome10", Money::from_euros(100))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(applied.discount_amount, Money::from_euros(10));
        assert_eq!(applied.discounted_subtotal, Money::from_euros(90));
    }

    #[tokio::test]
    async fn test_unknown_code_is_not_found() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let validator = DiscountValidator::new(db);

        let verdict = validator.validate("NOPE", Money::from_euros(10)).await.unwrap();
        assert_eq!(verdict, Err(DiscountRejection::NotFound));
    }

    #[tokio::test]
    async fn test_valid_from_tomorrow() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();
        db.discounts()
            .insert(&DiscountCode {
                code: "LAUNCH".into(),
                valid_from: Some(now + Duration::days(1)),
                usage_limit: None,
                ..welcome10()
            })
            .await
            .unwrap();
        let validator = DiscountValidator::new(db);

        let today = validator
            .validate_at("LAUNCH", Money::from_euros(50), now)
            .await
            .unwrap();
        assert_eq!(today, Err(DiscountRejection::NotYetValid));

        let later = validator
            .validate_at("LAUNCH", Money::from_euros(50), now + Duration::days(2))
            .await
            .unwrap();
        assert!(later.is_ok());
    }
}
