//! # Error Types
//!
//! Domain-specific error types for storefront-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  storefront-core errors (this file)                                    │
//! │  ├── CoreError        - Pricing rule violations                        │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  storefront-db errors (separate crate)                                 │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  storefront-checkout errors                                            │
//! │  └── CheckoutError    - Pipeline / payment / finalize taxonomy         │
//! │                                                                         │
//! │  storefront-api errors                                                 │
//! │  └── ApiError         - What the HTTP client sees (serialized)         │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → CheckoutError → ApiError          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core pricing errors.
///
/// These represent rule violations detected by pure computations. Nothing
/// here is retryable: the inputs have to change.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A monetary amount was negative, non-finite or unparseable.
    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// Adding to or updating a cart line would exceed the known stock ceiling.
    ///
    /// ## User Workflow
    /// ```text
    /// Cart line "Runner / 42 / black" qty 2, ceiling 3
    ///      │
    ///      ▼
    /// add(qty: 2)  → post-increment 4 > 3
    ///      │
    ///      ▼
    /// StockCeilingExceeded { requested: 4, ceiling: 3 }  (cart unchanged)
    /// ```
    #[error("Quantity {requested} for line {line_id} exceeds available stock ({ceiling})")]
    StockCeilingExceeded {
        line_id: String,
        requested: i64,
        ceiling: i64,
    },

    /// Line is not in the cart.
    #[error("Cart line not found: {0}")]
    LineNotFound(String),

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} lines")]
    CartTooLarge { max: usize },

    /// The grand total came out at or below zero.
    #[error("Order total must be positive, got {total}")]
    NonPositiveTotal { total: Money },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an InvalidAmount error.
    pub fn invalid_amount(reason: impl Into<String>) -> Self {
        CoreError::InvalidAmount {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when a request doesn't meet format requirements.
/// Used for early validation before any pricing runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid country code, invalid email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::StockCeilingExceeded {
            line_id: "p1|42|black".to_string(),
            requested: 4,
            ceiling: 3,
        };
        assert_eq!(
            err.to_string(),
            "Quantity 4 for line p1|42|black exceeds available stock (3)"
        );

        let err = CoreError::NonPositiveTotal {
            total: Money::zero(),
        };
        assert_eq!(err.to_string(), "Order total must be positive, got €0.00");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "productId".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
