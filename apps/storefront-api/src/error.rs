//! HTTP error mapping.
//!
//! Every failure leaves the API as `{ "code": ..., "message": ..., "reason"?: ... }`
//! with a status chosen by [`ErrorCode`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use storefront_checkout::{CheckoutError, PaymentError};
use storefront_db::DbError;

const SUPPORT_TEXT: &str =
    "We could not confirm your payment. Please contact support with your order number.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        ApiError::Checkout(err.into())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    NotFound,
    SessionExpired,
    PayloadMismatch,
    InvalidSignature,
    StaleProduct,
    InsufficientStock,
    PriceChanged,
    DiscountInvalid,
    NonPositiveTotal,
    AmountMismatch,
    PaymentIncomplete,
    PaymentProvider,
    Persistence,
    Internal,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::Validation | ErrorCode::InvalidSignature => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::SessionExpired => StatusCode::GONE,
            ErrorCode::StaleProduct
            | ErrorCode::InsufficientStock
            | ErrorCode::PriceChanged
            | ErrorCode::PayloadMismatch => StatusCode::CONFLICT,
            ErrorCode::DiscountInvalid | ErrorCode::NonPositiveTotal => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorCode::AmountMismatch | ErrorCode::PaymentIncomplete => {
                StatusCode::PAYMENT_REQUIRED
            }
            ErrorCode::PaymentProvider => StatusCode::BAD_GATEWAY,
            ErrorCode::Persistence => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::BadRequest(_) => ErrorCode::Validation,
            ApiError::NotFound(_) => ErrorCode::NotFound,
            ApiError::Checkout(err) => match err {
                CheckoutError::Validation(_) | CheckoutError::InvalidRequest(_) => {
                    ErrorCode::Validation
                }
                CheckoutError::NotFound { .. } => ErrorCode::NotFound,
                CheckoutError::SessionExpired { .. } => ErrorCode::SessionExpired,
                CheckoutError::PayloadMismatch { .. } => ErrorCode::PayloadMismatch,
                CheckoutError::InvalidSignature(_) => ErrorCode::InvalidSignature,
                CheckoutError::StaleOrMissingProduct { .. } => ErrorCode::StaleProduct,
                CheckoutError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
                CheckoutError::PriceChanged { .. } => ErrorCode::PriceChanged,
                CheckoutError::DiscountInvalid(_) => ErrorCode::DiscountInvalid,
                CheckoutError::NonPositiveTotal { .. } => ErrorCode::NonPositiveTotal,
                CheckoutError::AmountMismatch { .. } => ErrorCode::AmountMismatch,
                CheckoutError::Payment(PaymentError::NotCompleted { .. }) => {
                    ErrorCode::PaymentIncomplete
                }
                CheckoutError::Payment(_) => ErrorCode::PaymentProvider,
                CheckoutError::Persistence(_) => ErrorCode::Persistence,
                CheckoutError::Serialization(_) => ErrorCode::Internal,
            },
        }
    }

    /// Client-facing text. Provider and storage details stay in the logs.
    fn public_message(&self) -> String {
        match self.code() {
            ErrorCode::AmountMismatch | ErrorCode::Persistence => SUPPORT_TEXT.to_string(),
            ErrorCode::PaymentProvider => "Payment provider error, please retry".to_string(),
            ErrorCode::Internal => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    fn reason(&self) -> Option<&'static str> {
        match self {
            ApiError::Checkout(CheckoutError::DiscountInvalid(rejection)) => Some(rejection.code()),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        let status = code.status();

        if status.is_server_error() || code == ErrorCode::AmountMismatch {
            tracing::error!(error = %self, code = ?code, "Request failed");
        } else {
            tracing::debug!(error = %self, code = ?code, "Request rejected");
        }

        let body = ErrorBody {
            code,
            message: self.public_message(),
            reason: self.reason(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::discount::DiscountRejection;
    use storefront_core::Money;

    fn status(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            status(CheckoutError::InvalidRequest("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(CheckoutError::stale("p1", "out of stock")),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(CheckoutError::PriceChanged {
                declared: Money::from_cents(1),
                actual: Money::from_cents(2),
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(CheckoutError::DiscountInvalid(DiscountRejection::Expired)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(CheckoutError::AmountMismatch {
                order_number: "SF-1".into(),
                expected: Money::from_cents(100),
                captured: Money::from_cents(90),
            }),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            status(CheckoutError::Payment(PaymentError::Network("down".into()))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(DbError::PoolExhausted),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(CheckoutError::PayloadMismatch {
                order_number: "SF-1".into(),
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(status(ApiError::NotFound("x".into())), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_mismatch_message_is_generic() {
        let err = ApiError::from(CheckoutError::AmountMismatch {
            order_number: "SF-1".into(),
            expected: Money::from_cents(100),
            captured: Money::from_cents(90),
        });
        assert_eq!(err.public_message(), SUPPORT_TEXT);
    }

    #[test]
    fn test_discount_reason_exposed() {
        let err = ApiError::from(CheckoutError::DiscountInvalid(
            DiscountRejection::UsageLimitReached,
        ));
        assert_eq!(err.reason(), Some("usage_limit_reached"));
    }
}
