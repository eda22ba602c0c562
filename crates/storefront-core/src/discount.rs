//! # Discount Rules
//!
//! Eligibility checks and amount computation for discount codes.
//!
//! ## Evaluation Order
//! ```text
//! code ──► found? ──► is_active? ──► started? ──► not expired? ──► under limit? ──► minimum met?
//!            │            │             │              │                │               │
//!            ▼            ▼             ▼              ▼                ▼               ▼
//!         NotFound    Inactive     NotYetValid      Expired    UsageLimitReached  MinimumNotMet
//! ```
//! The first failing check wins. Evaluating a code never consumes it: usage
//! is counted once, inside the transaction that creates the order.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

use crate::money::Money;
use crate::types::{DiscountCode, DiscountKind};

/// Why a code was refused. These are business outcomes, not faults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscountRejection {
    #[error("Discount code not found")]
    NotFound,

    #[error("Discount code is not active")]
    Inactive,

    #[error("Discount code is not valid yet")]
    NotYetValid,

    #[error("Discount code has expired")]
    Expired,

    #[error("Discount code usage limit reached")]
    UsageLimitReached,

    #[error("Minimum purchase of {minimum} not met")]
    MinimumNotMet { minimum: Money },
}

impl DiscountRejection {
    /// Stable machine-readable reason.
    pub const fn code(&self) -> &'static str {
        match self {
            DiscountRejection::NotFound => "not_found",
            DiscountRejection::Inactive => "inactive",
            DiscountRejection::NotYetValid => "not_yet_valid",
            DiscountRejection::Expired => "expired",
            DiscountRejection::UsageLimitReached => "usage_limit_reached",
            DiscountRejection::MinimumNotMet { .. } => "minimum_not_met",
        }
    }
}

/// A code that passed every check, with its effect on the subtotal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AppliedDiscount {
    pub code: String,
    pub discount_amount: Money,
    pub discounted_subtotal: Money,
}

/// Canonical form used for storage and lookup.
pub fn normalize_code(input: &str) -> String {
    input.trim().to_uppercase()
}

/// Last instant a code with this `valid_until` is usable: the end of that UTC day.
fn expires_after(valid_until: NaiveDate) -> Option<DateTime<Utc>> {
    valid_until
        .succ_opt()
        .and_then(|next| next.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

/// Evaluates `code` (already looked up) against `subtotal` at `now`.
///
/// `None` means the lookup found nothing.
///
/// ## Example
/// ```rust,ignore
/// let applied = evaluate(Some(&welcome10), Money::from_euros(100), Utc::now())?;
/// assert_eq!(applied.discount_amount, Money::from_euros(10));
/// ```
pub fn evaluate(
    code: Option<&DiscountCode>,
    subtotal: Money,
    now: DateTime<Utc>,
) -> Result<AppliedDiscount, DiscountRejection> {
    let code = code.ok_or(DiscountRejection::NotFound)?;

    if !code.is_active {
        return Err(DiscountRejection::Inactive);
    }

    if let Some(valid_from) = code.valid_from {
        if now < valid_from {
            return Err(DiscountRejection::NotYetValid);
        }
    }

    if let Some(valid_until) = code.valid_until {
        if let Some(end) = expires_after(valid_until) {
            if now >= end {
                return Err(DiscountRejection::Expired);
            }
        }
    }

    if let Some(limit) = code.usage_limit {
        if code.used_count >= limit {
            return Err(DiscountRejection::UsageLimitReached);
        }
    }

    if let Some(min) = code.min_purchase_cents {
        if subtotal.cents() < min {
            return Err(DiscountRejection::MinimumNotMet {
                minimum: Money::from_cents(min),
            });
        }
    }

    let discount_amount = discount_amount(code, subtotal);

    Ok(AppliedDiscount {
        code: code.code.clone(),
        discount_amount,
        discounted_subtotal: subtotal - discount_amount,
    })
}

/// Monetary effect of an eligible code. Never more than the subtotal.
fn discount_amount(code: &DiscountCode, subtotal: Money) -> Money {
    let value = code.value.max(0);

    let raw = match code.kind {
        DiscountKind::Percentage => {
            let pct = subtotal.percentage(value.min(10_000) as u32);
            match code.max_discount_cents {
                Some(cap) => pct.min(Money::from_cents(cap.max(0))),
                None => pct,
            }
        }
        DiscountKind::Fixed => Money::from_cents(value),
    };

    raw.min(subtotal.max(Money::zero()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

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

    #[test]
    fn test_percentage_on_round_subtotal() {
        let applied = evaluate(Some(&welcome10()), Money::from_euros(100), Utc::now()).unwrap();
        assert_eq!(applied.discount_amount.cents(), 1000);
        assert_eq!(applied.discounted_subtotal.cents(), 9000);
        assert_eq!(applied.code, "WELCOME10");
    }

    #[test]
    fn test_percentage_clamped_to_max() {
        let code = DiscountCode {
            max_discount_cents: Some(500),
            ..welcome10()
        };
        let applied = evaluate(Some(&code), Money::from_euros(100), Utc::now()).unwrap();
        assert_eq!(applied.discount_amount.cents(), 500);
    }

    #[test]
    fn test_fixed_clamped_to_subtotal() {
        let code = DiscountCode {
            kind: DiscountKind::Fixed,
            value: 5000,
            ..welcome10()
        };
        let applied = evaluate(Some(&code), Money::from_cents(3000), Utc::now()).unwrap();
        assert_eq!(applied.discount_amount.cents(), 3000);
        assert!(applied.discounted_subtotal.is_zero());
    }

    #[test]
    fn test_rejections_in_order() {
        let now = Utc::now();
        assert_eq!(
            evaluate(None, Money::from_euros(10), now),
            Err(DiscountRejection::NotFound)
        );

        // inactive wins over exhausted
        let code = DiscountCode {
            is_active: false,
            used_count: 1,
            ..welcome10()
        };
        assert_eq!(
            evaluate(Some(&code), Money::from_euros(10), now),
            Err(DiscountRejection::Inactive)
        );

        let code = DiscountCode {
            used_count: 1,
            ..welcome10()
        };
        assert_eq!(
            evaluate(Some(&code), Money::from_euros(10), now),
            Err(DiscountRejection::UsageLimitReached)
        );

        let code = DiscountCode {
            min_purchase_cents: Some(5000),
            ..welcome10()
        };
        let rejection = evaluate(Some(&code), Money::from_euros(10), now).unwrap_err();
        assert_eq!(rejection.code(), "minimum_not_met");
        assert_eq!(rejection.to_string(), "Minimum purchase of €50.00 not met");
    }

    #[test]
    fn test_valid_from_tomorrow() {
        let today = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let code = DiscountCode {
            valid_from: Some(today + Duration::days(1)),
            ..welcome10()
        };

        assert_eq!(
            evaluate(Some(&code), Money::from_euros(100), today),
            Err(DiscountRejection::NotYetValid)
        );
        assert!(evaluate(Some(&code), Money::from_euros(100), today + Duration::days(2)).is_ok());
    }

    #[test]
    fn test_valid_until_is_end_of_day_inclusive() {
        let code = DiscountCode {
            valid_until: NaiveDate::from_ymd_opt(2026, 3, 10),
            ..welcome10()
        };

        let late_same_day = Utc.with_ymd_and_hms(2026, 3, 10, 23, 59, 59).unwrap();
        assert!(evaluate(Some(&code), Money::from_euros(20), late_same_day).is_ok());

        let next_day = Utc.with_ymd_and_hms(2026, 3, 11, 0, 0, 0).unwrap();
        assert_eq!(
            evaluate(Some(&code), Money::from_euros(20), next_day),
            Err(DiscountRejection::Expired)
        );
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  welcome10 "), "WELCOME10");
    }
}
