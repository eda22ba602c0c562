//! # Payment Review Repository
//!
//! Queue of captured payments that did not become a clean order: amount
//! mismatches, stock or discount exhausted at persist time, re-pricing
//! failures after a hosted capture. Support works through this list by hand.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::error::DbResult;
use storefront_core::{PaymentMethod, PaymentReview};

/// Input for [`PaymentReviewRepository::flag`].
#[derive(Debug, Clone)]
pub struct NewPaymentReview {
    pub order_number: String,
    pub payment_method: PaymentMethod,
    pub external_payment_id: Option<String>,
    pub reason: String,
    pub expected_cents: Option<i64>,
    pub captured_cents: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct PaymentReviewRepository {
    pool: SqlitePool,
}

impl PaymentReviewRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentReviewRepository { pool }
    }

    /// Adds a payment to the review queue.
    pub async fn flag(&self, review: NewPaymentReview) -> DbResult<PaymentReview> {
        let review = PaymentReview {
            id: Uuid::new_v4().to_string(),
            order_number: review.order_number,
            payment_method: review.payment_method,
            external_payment_id: review.external_payment_id,
            reason: review.reason,
            expected_cents: review.expected_cents,
            captured_cents: review.captured_cents,
            created_at: Utc::now(),
        };

        warn!(
            order_number = %review.order_number,
            external_payment_id = ?review.external_payment_id,
            reason = %review.reason,
            "Payment flagged for manual review"
        );

        sqlx::query(
            r#"
            INSERT INTO payment_reviews (
                id, order_number, payment_method, external_payment_id,
                reason, expected_cents, captured_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&review.id)
        .bind(&review.order_number)
        .bind(review.payment_method)
        .bind(&review.external_payment_id)
        .bind(&review.reason)
        .bind(review.expected_cents)
        .bind(review.captured_cents)
        .bind(review.created_at)
        .execute(&self.pool)
        .await?;

        Ok(review)
    }

    pub async fn list_for_order(&self, order_number: &str) -> DbResult<Vec<PaymentReview>> {
        let reviews = sqlx::query_as::<_, PaymentReview>(
            r#"
            SELECT id, order_number, payment_method, external_payment_id,
                   reason, expected_cents, captured_cents, created_at
            FROM payment_reviews
            WHERE order_number = ?1
            ORDER BY created_at
            "#,
        )
        .bind(order_number)
        .fetch_all(&self.pool)
        .await?;

        Ok(reviews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_flag_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        db.reviews()
            .flag(NewPaymentReview {
                order_number: "SF-X".into(),
                payment_method: PaymentMethod::TwoPhase,
                external_payment_id: Some("CAP-1".into()),
                reason: "amount mismatch".into(),
                expected_cents: Some(5000),
                captured_cents: Some(4000),
            })
            .await
            .unwrap();

        let reviews = db.reviews().list_for_order("SF-X").await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].captured_cents, Some(4000));
        assert_eq!(reviews[0].payment_method, PaymentMethod::TwoPhase);
    }
}
