//! # Payment Adapters
//!
//! One capability interface over two structurally different providers.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          PaymentAdapter                                 │
//! │                                                                         │
//! │   create_intent(IntentRequest) ──► ProviderIntent { provider_ref, url } │
//! │   finalize(provider_ref, token) ──► CaptureResult                       │
//! │                                                                         │
//! │   ┌───────────────────────────┐     ┌───────────────────────────┐      │
//! │   │   HostedSessionAdapter    │     │     TwoPhaseAdapter       │      │
//! │   │                           │     │                           │      │
//! │   │ intent: hosted page       │     │ intent: reserve amount    │      │
//! │   │ finalize: read completed  │     │ finalize: capture after   │      │
//! │   │   session (webhook or     │     │   buyer approval          │      │
//! │   │   return URL)             │     │   (client initiated)      │      │
//! │   └───────────────────────────┘     └───────────────────────────┘      │
//! │                                                                         │
//! │   OrderFinalizer only ever sees CaptureResult.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod hosted;
pub mod two_phase;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use storefront_core::{Money, PaymentMethod};

pub use hosted::{HostedSessionAdapter, HostedSessionConfig, WebhookEvent, WebhookVerifier};
pub use two_phase::{TwoPhaseAdapter, TwoPhaseConfig};

/// Result type alias for provider calls.
pub type PaymentResult<T> = Result<T, PaymentError>;

/// Provider-side and transport failures.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Request never got a response.
    #[error("Payment provider unreachable: {0}")]
    Network(String),

    /// Provider answered with a non-success status.
    #[error("Payment provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    /// Provider answered, but not in a shape we understand.
    #[error("Unexpected payment provider response: {0}")]
    InvalidResponse(String),

    /// The payment exists but has not been paid / captured.
    #[error("Payment {provider_ref} is not completed (status: {status})")]
    NotCompleted { provider_ref: String, status: String },

    #[error("Payment provider misconfigured: {0}")]
    Config(String),
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            PaymentError::InvalidResponse(err.to_string())
        } else {
            PaymentError::Network(err.to_string())
        }
    }
}

// =============================================================================
// Provider-agnostic Types
// =============================================================================

/// A line as shown on the provider's payment page.
#[derive(Debug, Clone, Serialize)]
pub struct IntentLine {
    pub name: String,
    pub unit_amount: Money,
    pub quantity: i64,
}

/// Everything a provider needs to open a payment.
#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub order_number: String,
    pub amount: Money,
    pub currency: String,
    pub customer_email: String,
    pub lines: Vec<IntentLine>,
    /// Shipping minus discount, shown as a single adjustment line.
    pub adjustments: Money,
}

/// What the provider handed back at intent creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderIntent {
    /// Hosted session id or two-phase order id.
    pub provider_ref: String,
    /// Where to send the buyer (payment page or approval link).
    pub redirect_url: Option<String>,
}

/// Funds actually collected. The only thing the finalizer consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureResult {
    /// Idempotency key for order creation.
    pub external_payment_id: String,
    pub amount_captured: Money,
    pub currency: String,
    pub payer_email: Option<String>,
}

#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    /// Which variant this is. Recorded on sessions and orders.
    fn method(&self) -> PaymentMethod;

    async fn create_intent(&self, request: &IntentRequest) -> PaymentResult<ProviderIntent>;

    /// Collects (or confirms collection of) the funds behind `provider_ref`.
    ///
    /// Must be safe to call more than once for the same reference.
    async fn finalize(
        &self,
        provider_ref: &str,
        confirmation: Option<&str>,
    ) -> PaymentResult<CaptureResult>;
}

/// Maps a non-success response to `PaymentError::Provider`.
pub(crate) async fn error_for_status(response: reqwest::Response) -> PaymentResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(PaymentError::Provider {
        status: status.as_u16(),
        message,
    })
}
