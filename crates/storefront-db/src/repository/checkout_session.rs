//! # Checkout Session Repository
//!
//! Server-side record of every payment intent handed to a provider.
//!
//! ## Session Lifecycle
//! ```text
//! createIntent ──► insert(pending) ──► set_provider_ref()
//!                        │
//!          ┌─────────────┴──────────────┐
//!          ▼                            ▼
//!   payment completes            customer abandons
//!   order persisted ──►          expires_at passes ──►
//!   status = completed           expire_stale() sets status = expired
//! ```
//!
//! Rows are never deleted. The primary key is what guarantees an order
//! number is never issued twice, and a hosted payment completed just before
//! the TTL can still be matched to its cart when the webhook arrives late.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use storefront_core::CheckoutSession;

const SESSION_COLUMNS: &str = "order_number, payment_method, provider_ref, payload, \
                               quoted_total_cents, currency, status, created_at, \
                               expires_at, completed_at";

#[derive(Debug, Clone)]
pub struct CheckoutSessionRepository {
    pool: SqlitePool,
}

impl CheckoutSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CheckoutSessionRepository { pool }
    }

    /// Records a new session. Fails with `UniqueViolation` if the order
    /// number was ever issued before.
    pub async fn insert(&self, session: &CheckoutSession) -> DbResult<()> {
        debug!(
            order_number = %session.order_number,
            method = %session.payment_method,
            "Recording checkout session"
        );

        sqlx::query(
            r#"
            INSERT INTO checkout_sessions (
                order_number, payment_method, provider_ref, payload,
                quoted_total_cents, currency, status, created_at, expires_at, completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&session.order_number)
        .bind(session.payment_method)
        .bind(&session.provider_ref)
        .bind(&session.payload)
        .bind(session.quoted_total_cents)
        .bind(&session.currency)
        .bind(session.status)
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(session.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, order_number: &str) -> DbResult<Option<CheckoutSession>> {
        let session = sqlx::query_as::<_, CheckoutSession>(&format!(
            "SELECT {} FROM checkout_sessions WHERE order_number = ?1",
            SESSION_COLUMNS
        ))
        .bind(order_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    pub async fn find_by_provider_ref(&self, provider_ref: &str) -> DbResult<Option<CheckoutSession>> {
        let session = sqlx::query_as::<_, CheckoutSession>(&format!(
            "SELECT {} FROM checkout_sessions WHERE provider_ref = ?1",
            SESSION_COLUMNS
        ))
        .bind(provider_ref)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Binds the provider's session/order id once the provider answered.
    pub async fn set_provider_ref(&self, order_number: &str, provider_ref: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE checkout_sessions SET provider_ref = ?2 WHERE order_number = ?1",
        )
        .bind(order_number)
        .bind(provider_ref)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CheckoutSession", order_number));
        }
        Ok(())
    }

    /// Marks pending sessions whose `expires_at` has passed as expired.
    ///
    /// ## Returns
    /// Number of sessions marked.
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE checkout_sessions SET status = 'expired' \
             WHERE status = 'pending' AND expires_at <= ?1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        let expired = result.rows_affected();
        if expired > 0 {
            info!(expired = expired, "Expired stale checkout sessions");
        }
        Ok(expired)
    }
}
