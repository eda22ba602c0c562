//! # Discount Repository
//!
//! Discount code storage. Codes are stored upper-cased and looked up
//! case-insensitively by upper-casing the input.
//!
//! Usage counting does not live here: `used_count` only moves inside the
//! order-persist transaction in [`crate::repository::order`].

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use storefront_core::discount::normalize_code;
use storefront_core::DiscountCode;

#[derive(Debug, Clone)]
pub struct DiscountRepository {
    pool: SqlitePool,
}

impl DiscountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DiscountRepository { pool }
    }

    /// Looks up a code, ignoring case and surrounding whitespace.
    pub async fn find_by_code(&self, code: &str) -> DbResult<Option<DiscountCode>> {
        let code = normalize_code(code);

        let found = sqlx::query_as::<_, DiscountCode>(
            r#"
            SELECT code, kind, value, min_purchase_cents, max_discount_cents,
                   usage_limit, used_count, valid_from, valid_until, is_active, created_at
            FROM discount_codes
            WHERE code = ?1
            "#,
        )
        .bind(&code)
        .fetch_optional(&self.pool)
        .await?;

        debug!(code = %code, found = found.is_some(), "Discount lookup");
        Ok(found)
    }

    /// Inserts a code, upper-casing it first.
    pub async fn insert(&self, discount: &DiscountCode) -> DbResult<DiscountCode> {
        let stored = DiscountCode {
            code: normalize_code(&discount.code),
            ..discount.clone()
        };

        sqlx::query(
            r#"
            INSERT INTO discount_codes (
                code, kind, value, min_purchase_cents, max_discount_cents,
                usage_limit, used_count, valid_from, valid_until, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&stored.code)
        .bind(stored.kind)
        .bind(stored.value)
        .bind(stored.min_purchase_cents)
        .bind(stored.max_discount_cents)
        .bind(stored.usage_limit)
        .bind(stored.used_count)
        .bind(stored.valid_from)
        .bind(stored.valid_until)
        .bind(stored.is_active)
        .bind(stored.created_at)
        .execute(&self.pool)
        .await?;

        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use chrono::{NaiveDate, Utc};
    use storefront_core::DiscountKind;

    fn summer() -> DiscountCode {
        DiscountCode {
            code: "summer-26".into(),
            kind: DiscountKind::Fixed,
            value: 1500,
            min_purchase_cents: Some(5000),
            max_discount_cents: None,
            usage_limit: None,
            used_count: 0,
            valid_from: None,
            valid_until: NaiveDate::from_ymd_opt(2026, 8, 31),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let stored = db.discounts().insert(&summer()).await.unwrap();
        assert_eq!(stored.code, "SUMMER-26");

        let found = db.discounts().find_by_code(" Summer-26 ").await.unwrap().unwrap();
        assert_eq!(found.kind, DiscountKind::Fixed);
        assert_eq!(found.valid_until, NaiveDate::from_ymd_opt(2026, 8, 31));

        assert!(db.discounts().find_by_code("WINTER").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.discounts().insert(&summer()).await.unwrap();

        let err = db.discounts().insert(&summer()).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }
}
