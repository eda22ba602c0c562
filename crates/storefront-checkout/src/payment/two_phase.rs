//! # Two-Phase Adapter
//!
//! Reserve an amount up front, capture after the buyer approves it.
//!
//! ```text
//! create_intent ──► POST /v1/oauth2/token           (client credentials, cached)
//!               ──► POST /v2/checkout/orders         intent = CAPTURE
//!                   ◄── { id, links[rel=approve] }
//!
//! buyer approves, client calls capture with the order id + cart payload
//!
//! finalize ──► POST /v2/checkout/orders/{id}/capture
//!              ◄── purchase_units[0].payments.captures[0]
//!              already captured (422) ──► GET /v2/checkout/orders/{id}
//! ```
//!
//! The capture id is the external payment id. Replaying a capture reads the
//! existing capture instead of failing, so finalize stays repeatable.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use storefront_core::{Money, PaymentMethod};

use super::{
    error_for_status, CaptureResult, IntentRequest, PaymentAdapter, PaymentError, PaymentResult,
    ProviderIntent,
};

/// Renew the access token this long before it actually expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwoPhaseConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://api.two-phase-payments.example".to_string()
}

fn default_timeout() -> u64 {
    15
}

impl Default for TwoPhaseConfig {
    fn default() -> Self {
        TwoPhaseConfig {
            api_base: default_api_base(),
            client_id: String::new(),
            client_secret: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    intent: &'static str,
    purchase_units: [PurchaseUnitRequest<'a>; 1],
}

#[derive(Serialize)]
struct PurchaseUnitRequest<'a> {
    reference_id: &'a str,
    amount: WireAmount,
}

#[derive(Serialize, Deserialize)]
struct WireAmount {
    currency_code: String,
    value: String,
}

#[derive(Deserialize)]
struct OrderCreated {
    id: String,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Deserialize)]
struct Link {
    rel: String,
    href: String,
}

#[derive(Deserialize)]
struct OrderDetails {
    id: String,
    status: String,
    payer: Option<Payer>,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
}

#[derive(Deserialize)]
struct Payer {
    email_address: Option<String>,
}

#[derive(Deserialize)]
struct PurchaseUnit {
    payments: Option<Payments>,
}

#[derive(Deserialize)]
struct Payments {
    #[serde(default)]
    captures: Vec<Capture>,
}

#[derive(Deserialize)]
struct Capture {
    id: String,
    status: String,
    amount: WireAmount,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

// =============================================================================
// Adapter
// =============================================================================

pub struct TwoPhaseAdapter {
    client: Client,
    config: TwoPhaseConfig,
    token: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for TwoPhaseAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoPhaseAdapter")
            .field("api_base", &self.config.api_base)
            .finish_non_exhaustive()
    }
}

impl TwoPhaseAdapter {
    pub fn new(config: TwoPhaseConfig) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PaymentError::Config(e.to_string()))?;

        Ok(TwoPhaseAdapter {
            client,
            config,
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    /// Returns a valid access token, fetching a new one when needed.
    async fn access_token(&self) -> PaymentResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .client
            .post(self.url("/v1/oauth2/token"))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await?;
        let token: TokenResponse = error_for_status(response).await?.json().await?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        debug!(lifetime_secs = lifetime.as_secs(), "Two-phase access token refreshed");

        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    async fn get_order(&self, order_id: &str, token: &str) -> PaymentResult<OrderDetails> {
        let response = self
            .client
            .get(self.url(&format!("/v2/checkout/orders/{}", order_id)))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(error_for_status(response).await?.json().await?)
    }
}

#[async_trait]
impl PaymentAdapter for TwoPhaseAdapter {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::TwoPhase
    }

    async fn create_intent(&self, request: &IntentRequest) -> PaymentResult<ProviderIntent> {
        let token = self.access_token().await?;

        let body = CreateOrderRequest {
            intent: "CAPTURE",
            purchase_units: [PurchaseUnitRequest {
                reference_id: &request.order_number,
                amount: WireAmount {
                    currency_code: request.currency.to_uppercase(),
                    value: request.amount.to_decimal_string(),
                },
            }],
        };

        let response = self
            .client
            .post(self.url("/v2/checkout/orders"))
            .bearer_auth(&token)
            .header("Idempotency-Key", &request.order_number)
            .json(&body)
            .send()
            .await?;
        let created: OrderCreated = error_for_status(response).await?.json().await?;

        let approve = created
            .links
            .into_iter()
            .find(|l| l.rel == "approve" || l.rel == "payer-action")
            .map(|l| l.href);

        info!(
            order_number = %request.order_number,
            provider_order_id = %created.id,
            "Two-phase order created"
        );

        Ok(ProviderIntent {
            provider_ref: created.id,
            redirect_url: approve,
        })
    }

    async fn finalize(
        &self,
        provider_ref: &str,
        _confirmation: Option<&str>,
    ) -> PaymentResult<CaptureResult> {
        let token = self.access_token().await?;

        let response = self
            .client
            .post(self.url(&format!("/v2/checkout/orders/{}/capture", provider_ref)))
            .bearer_auth(&token)
            .header(CONTENT_TYPE, "application/json")
            .body("{}")
            .send()
            .await?;

        let details = if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            let message = response.text().await.unwrap_or_default();
            if !message.contains("ORDER_ALREADY_CAPTURED") {
                return Err(PaymentError::Provider {
                    status: StatusCode::UNPROCESSABLE_ENTITY.as_u16(),
                    message,
                });
            }
            debug!(provider_order_id = %provider_ref, "Order already captured, reading capture");
            self.get_order(provider_ref, &token).await?
        } else {
            error_for_status(response).await?.json().await?
        };

        capture_from(details)
    }
}

fn capture_from(details: OrderDetails) -> PaymentResult<CaptureResult> {
    if details.status != "COMPLETED" {
        return Err(PaymentError::NotCompleted {
            provider_ref: details.id,
            status: details.status,
        });
    }

    let capture = details
        .purchase_units
        .into_iter()
        .filter_map(|u| u.payments)
        .flat_map(|p| p.captures)
        .find(|c| c.status == "COMPLETED")
        .ok_or_else(|| {
            PaymentError::InvalidResponse(format!("order {} has no completed capture", details.id))
        })?;

    let amount_captured = Money::parse_decimal(&capture.amount.value)
        .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;

    Ok(CaptureResult {
        external_payment_id: capture.id,
        amount_captured,
        currency: capture.amount.currency_code.to_uppercase(),
        payer_email: details.payer.and_then(|p| p.email_address),
    })
}
