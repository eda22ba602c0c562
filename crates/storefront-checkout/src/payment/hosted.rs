//! # Hosted Session Adapter
//!
//! The buyer pays on a provider-hosted page. The order is created later,
//! when the provider calls the webhook or the buyer lands on the return URL.
//!
//! ## Flow
//! ```text
//! create_intent ──► POST /v1/checkout/sessions ──► { id, url }
//!                         (client_reference_id = order number)
//!
//! buyer pays on url
//!        │
//!        ├──► webhook: checkout.session.completed { data.object.id }
//!        └──► return URL: ?session_id=...
//!                  │
//!                  ▼
//! finalize ──► GET /v1/checkout/sessions/{id}
//!              payment_status == "paid" ──► CaptureResult
//! ```
//!
//! Totals are never read from metadata. The session id is only used to find
//! the stored checkout payload, which is re-priced.
//!
//! ## Webhook Signatures
//! Header `t=<unix seconds>,v1=<hex>` where the hex is HMAC-SHA256 over
//! `"{t}.{raw body}"` keyed with the webhook secret.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, info, warn};

use storefront_core::{Money, PaymentMethod};

use super::{
    error_for_status, CaptureResult, IntentRequest, PaymentAdapter, PaymentError, PaymentResult,
    ProviderIntent,
};
use crate::error::{CheckoutError, CheckoutResult};

type HmacSha256 = Hmac<Sha256>;

/// Event type that finalizes an order. Everything else is acknowledged.
pub const SESSION_COMPLETED: &str = "checkout.session.completed";

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedSessionConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default)]
    pub secret_key: String,

    #[serde(default)]
    pub webhook_secret: String,

    /// Maximum age of a signed webhook, in seconds.
    #[serde(default = "default_signature_tolerance")]
    pub signature_tolerance_secs: i64,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://api.hosted-payments.example".to_string()
}

fn default_signature_tolerance() -> i64 {
    300
}

fn default_timeout() -> u64 {
    15
}

impl Default for HostedSessionConfig {
    fn default() -> Self {
        HostedSessionConfig {
            api_base: default_api_base(),
            secret_key: String::new(),
            webhook_secret: String::new(),
            signature_tolerance_secs: default_signature_tolerance(),
            timeout_secs: default_timeout(),
        }
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    mode: &'static str,
    client_reference_id: &'a str,
    customer_email: &'a str,
    currency: String,
    amount_total: i64,
    line_items: Vec<WireLine<'a>>,
    adjustment: i64,
    metadata: SessionMetadata<'a>,
    success_url: String,
    cancel_url: &'a str,
}

#[derive(Serialize)]
struct WireLine<'a> {
    name: &'a str,
    unit_amount: i64,
    quantity: i64,
}

#[derive(Serialize)]
struct SessionMetadata<'a> {
    order_number: &'a str,
}

#[derive(Deserialize)]
struct SessionCreated {
    id: String,
    url: Option<String>,
}

#[derive(Deserialize)]
struct SessionDetails {
    id: String,
    payment_status: String,
    payment_intent: Option<String>,
    amount_total: Option<i64>,
    currency: Option<String>,
    customer_email: Option<String>,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: Option<RawEventData>,
}

#[derive(Deserialize)]
struct RawEventData {
    object: Option<RawEventObject>,
}

#[derive(Deserialize)]
struct RawEventObject {
    id: Option<String>,
}

/// A verified webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub event_type: String,
    pub session_id: Option<String>,
}

impl WebhookEvent {
    /// Whether this event should finalize an order.
    pub fn completes_session(&self) -> bool {
        self.event_type == SESSION_COMPLETED
    }
}

// =============================================================================
// Adapter
// =============================================================================

#[derive(Debug, Clone)]
pub struct HostedSessionAdapter {
    client: Client,
    config: HostedSessionConfig,
    success_url: String,
    cancel_url: String,
}

impl HostedSessionAdapter {
    pub fn new(
        config: HostedSessionConfig,
        success_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PaymentError::Config(e.to_string()))?;

        Ok(HostedSessionAdapter {
            client,
            config,
            success_url: success_url.into(),
            cancel_url: cancel_url.into(),
        })
    }

    /// Verifier keyed with this adapter's webhook secret.
    pub fn webhook_verifier(&self) -> WebhookVerifier {
        WebhookVerifier::from_config(&self.config)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl PaymentAdapter for HostedSessionAdapter {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::HostedSession
    }

    async fn create_intent(&self, request: &IntentRequest) -> PaymentResult<ProviderIntent> {
        let body = CreateSessionRequest {
            mode: "payment",
            client_reference_id: &request.order_number,
            customer_email: &request.customer_email,
            currency: request.currency.to_lowercase(),
            amount_total: request.amount.cents(),
            line_items: request
                .lines
                .iter()
                .map(|l| WireLine {
                    name: &l.name,
                    unit_amount: l.unit_amount.cents(),
                    quantity: l.quantity,
                })
                .collect(),
            adjustment: request.adjustments.cents(),
            metadata: SessionMetadata {
                order_number: &request.order_number,
            },
            success_url: format!("{}?session_id={{CHECKOUT_SESSION_ID}}", self.success_url),
            cancel_url: &self.cancel_url,
        };

        let response = self
            .client
            .post(self.url("/v1/checkout/sessions"))
            .bearer_auth(&self.config.secret_key)
            .json(&body)
            .send()
            .await?;
        let created: SessionCreated = error_for_status(response).await?.json().await?;

        info!(
            order_number = %request.order_number,
            session_id = %created.id,
            "Hosted checkout session created"
        );

        Ok(ProviderIntent {
            provider_ref: created.id,
            redirect_url: created.url,
        })
    }

    async fn finalize(
        &self,
        provider_ref: &str,
        _confirmation: Option<&str>,
    ) -> PaymentResult<CaptureResult> {
        let response = self
            .client
            .get(self.url(&format!("/v1/checkout/sessions/{}", provider_ref)))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await?;
        let session: SessionDetails = error_for_status(response).await?.json().await?;

        if session.payment_status != "paid" {
            return Err(PaymentError::NotCompleted {
                provider_ref: session.id,
                status: session.payment_status,
            });
        }

        let external_payment_id = session.payment_intent.ok_or_else(|| {
            PaymentError::InvalidResponse(format!("session {} has no payment id", session.id))
        })?;
        let amount = session.amount_total.ok_or_else(|| {
            PaymentError::InvalidResponse(format!("session {} has no amount", session.id))
        })?;

        Ok(CaptureResult {
            external_payment_id,
            amount_captured: Money::from_cents(amount),
            currency: session.currency.unwrap_or_default().to_uppercase(),
            payer_email: session.customer_email,
        })
    }
}

// =============================================================================
// Signatures
// =============================================================================

/// Authenticates webhook deliveries before they reach the finalizer.
#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance_secs: i64) -> Self {
        WebhookVerifier {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    pub fn from_config(config: &HostedSessionConfig) -> Self {
        WebhookVerifier::new(config.webhook_secret.clone(), config.signature_tolerance_secs)
    }

    /// Checks the signature header and parses the event.
    pub fn verify(
        &self,
        signature_header: &str,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> CheckoutResult<WebhookEvent> {
        verify_signature(&self.secret, signature_header, body, now, self.tolerance_secs)?;

        let raw: RawEvent = serde_json::from_slice(body)
            .map_err(|e| CheckoutError::InvalidRequest(format!("webhook body: {}", e)))?;

        let event = WebhookEvent {
            event_type: raw.event_type,
            session_id: raw.data.and_then(|d| d.object).and_then(|o| o.id),
        };
        debug!(event_type = %event.event_type, session_id = ?event.session_id, "Webhook verified");
        Ok(event)
    }
}

/// Hex HMAC-SHA256 of `"{timestamp}.{body}"`.
pub fn sign_payload(secret: &str, timestamp: i64, body: &[u8]) -> CheckoutResult<String> {
    Ok(hex::encode(mac_for(secret, timestamp, body)?.finalize().into_bytes()))
}

/// Builds a `t=..,v1=..` header for `body`.
pub fn signature_header(secret: &str, timestamp: i64, body: &[u8]) -> CheckoutResult<String> {
    Ok(format!("t={},v1={}", timestamp, sign_payload(secret, timestamp, body)?))
}

fn mac_for(secret: &str, timestamp: i64, body: &[u8]) -> CheckoutResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| CheckoutError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(mac)
}

/// Verifies a `t=..,v1=..` header. Any one matching `v1` is enough.
pub fn verify_signature(
    secret: &str,
    header: &str,
    body: &[u8],
    now: DateTime<Utc>,
    tolerance_secs: i64,
) -> CheckoutResult<()> {
    if secret.is_empty() {
        return Err(CheckoutError::InvalidSignature("no webhook secret configured".into()));
    }

    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| CheckoutError::InvalidSignature("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(CheckoutError::InvalidSignature("missing v1 signature".into()));
    }
    if (now.timestamp() - timestamp).abs() > tolerance_secs {
        return Err(CheckoutError::InvalidSignature("timestamp outside tolerance".into()));
    }

    let mut matched = false;
    for sig in &signatures {
        if mac_for(secret, timestamp, body)?.verify_slice(sig).is_ok() {
            matched = true;
            break;
        }
    }
    if !matched {
        warn!("Webhook signature mismatch");
        return Err(CheckoutError::InvalidSignature("signature mismatch".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    const SECRET: &str = "whsec_test";

    fn verifier() -> WebhookVerifier {
        HostedSessionAdapter::new(
            HostedSessionConfig {
                webhook_secret: SECRET.into(),
                ..HostedSessionConfig::default()
            },
            "https://shop.example/checkout/success",
            "https://shop.example/cart",
        )
        .unwrap()
        .webhook_verifier()
    }

    #[test]
    fn test_verify_completed_event() {
        let now = Utc::now();
        let body = br#"{"type":"checkout.session.completed","data":{"object":{"id":"cs_123"}}}"#;
        let header = signature_header(SECRET, now.timestamp(), body).unwrap();

        let event = verifier().verify(&header, body, now).unwrap();
        assert!(event.completes_session());
        assert_eq!(event.session_id.as_deref(), Some("cs_123"));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let now = Utc::now();
        let header = signature_header(SECRET, now.timestamp(), b"{\"type\":\"a\"}").unwrap();

        let err = verifier()
            .verify(&header, b"{\"type\":\"b\"}", now)
            .unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidSignature(_)));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let now = Utc::now();
        let then = now - ChronoDuration::minutes(10);
        let body = b"{\"type\":\"checkout.session.completed\"}";
        let header = signature_header(SECRET, then.timestamp(), body).unwrap();

        assert!(verify_signature(SECRET, &header, body, now, 300).is_err());
        assert!(verify_signature(SECRET, &header, body, then, 300).is_ok());
    }

    #[test]
    fn test_malformed_headers_rejected() {
        let now = Utc::now();
        assert!(verify_signature(SECRET, "", b"{}", now, 300).is_err());
        assert!(verify_signature(SECRET, "t=1", b"{}", now, 300).is_err());
        assert!(verify_signature(SECRET, "v1=zz", b"{}", now, 300).is_err());
        assert!(verify_signature("", "t=1,v1=00", b"{}", now, 300).is_err());
    }

    #[test]
    fn test_other_events_do_not_complete() {
        let event = WebhookEvent {
            event_type: "checkout.session.expired".into(),
            session_id: Some("cs_1".into()),
        };
        assert!(!event.completes_session());
    }
}
