//! # Checkout Error Types
//!
//! One taxonomy for everything that can go wrong between a cart and a
//! persisted order.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Checkout Error Categories                          │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Request      │  │   Inventory     │  │       Money             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Validation     │  │  StaleOrMissing │  │  DiscountInvalid        │ │
//! │  │  NotFound       │  │  InsufficientSt.│  │  NonPositiveTotal       │ │
//! │  │  SessionExpired │  │                 │  │  PriceChanged           │ │
//! │  │  PayloadMismat. │  │                 │  │  AmountMismatch         │ │
//! │  │  InvalidSignat. │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │    Provider     │  │   Persistence   │  retried with the same       │
//! │  │                 │  │                 │  idempotency key when        │
//! │  │  Payment(..)    │  │  Persistence(..)│  is_transient()              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use storefront_core::discount::DiscountRejection;
use storefront_core::{CoreError, Money, ValidationError};
use storefront_db::DbError;

use crate::payment::PaymentError;

/// Result type alias for checkout operations.
pub type CheckoutResult<T> = Result<T, CheckoutError>;

#[derive(Debug, Error)]
pub enum CheckoutError {
    // =========================================================================
    // Request Errors
    // =========================================================================
    /// Malformed request, surfaced verbatim.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Amount or request shape rejected by the pricing rules.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The checkout session passed its TTL before payment completed.
    #[error("Checkout session {order_number} has expired")]
    SessionExpired { order_number: String },

    /// A replayed cart differs from the one the payment was opened for.
    #[error("Cart does not match checkout session {order_number}")]
    PayloadMismatch { order_number: String },

    /// Webhook signature header missing, malformed, stale or wrong.
    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    // =========================================================================
    // Inventory Errors
    // =========================================================================
    /// The catalogue no longer backs a cart line.
    #[error("Product {product_id} is unavailable: {reason}")]
    StaleOrMissingProduct { product_id: String, reason: String },

    /// The conditional decrement at persist time lost a race.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: i64,
        available: i64,
    },

    // =========================================================================
    // Money Errors
    // =========================================================================
    #[error("Discount code rejected: {0}")]
    DiscountInvalid(DiscountRejection),

    #[error("Order total must be positive, got {total}")]
    NonPositiveTotal { total: Money },

    /// The client displayed a different subtotal than the catalogue gives.
    #[error("Prices changed: client saw {declared}, current subtotal is {actual}")]
    PriceChanged { declared: Money, actual: Money },

    /// The provider captured a different amount than we computed.
    #[error("Captured {captured} for order {order_number}, expected {expected}")]
    AmountMismatch {
        order_number: String,
        expected: Money,
        captured: Money,
    },

    // =========================================================================
    // Provider / Storage Errors
    // =========================================================================
    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("Persistence failed: {0}")]
    Persistence(DbError),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CheckoutError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CheckoutError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn stale(product_id: impl Into<String>, reason: impl Into<String>) -> Self {
        CheckoutError::StaleOrMissingProduct {
            product_id: product_id.into(),
            reason: reason.into(),
        }
    }

    /// Whether the same operation may succeed if simply repeated.
    pub fn is_transient(&self) -> bool {
        matches!(self, CheckoutError::Persistence(e) if e.is_transient())
    }
}

/// Business outcomes of the persist transaction keep their meaning; every
/// other storage failure is a `Persistence` error.
impl From<DbError> for CheckoutError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::InsufficientStock {
                product_id,
                requested,
                available,
            } => CheckoutError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            DbError::DiscountExhausted { .. } => {
                CheckoutError::DiscountInvalid(DiscountRejection::UsageLimitReached)
            }
            DbError::NotFound { entity, id } => CheckoutError::NotFound { entity, id },
            other => CheckoutError::Persistence(other),
        }
    }
}

impl From<CoreError> for CheckoutError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NonPositiveTotal { total } => CheckoutError::NonPositiveTotal { total },
            CoreError::Validation(e) => CheckoutError::Validation(e),
            CoreError::StockCeilingExceeded {
                line_id,
                requested,
                ceiling,
            } => CheckoutError::InsufficientStock {
                product_id: line_id,
                requested,
                available: ceiling,
            },
            other => CheckoutError::InvalidRequest(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_business_outcomes_keep_meaning() {
        let err: CheckoutError = DbError::DiscountExhausted {
            code: "WELCOME10".into(),
        }
        .into();
        assert!(matches!(
            err,
            CheckoutError::DiscountInvalid(DiscountRejection::UsageLimitReached)
        ));

        let err: CheckoutError = DbError::InsufficientStock {
            product_id: "p1".into(),
            requested: 2,
            available: 0,
        }
        .into();
        assert!(matches!(err, CheckoutError::InsufficientStock { requested: 2, .. }));
    }

    #[test]
    fn test_transient_only_for_storage_faults() {
        let locked: CheckoutError = DbError::QueryFailed("database is locked".into()).into();
        assert!(locked.is_transient());

        let dup: CheckoutError = DbError::duplicate("orders.order_number", "SF-1").into();
        assert!(!dup.is_transient());

        let total: CheckoutError = CoreError::NonPositiveTotal {
            total: Money::zero(),
        }
        .into();
        assert!(!total.is_transient());
    }
}
