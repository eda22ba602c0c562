//! Intent creation and payment finalization.
//!
//! ```text
//! hosted:     POST /api/checkout/hosted ──► redirect ──► webhook ─┐
//!                                                   └──► return ──┼──► OrderFinalizer
//! two-phase:  POST /api/checkout/two-phase ──► approve ──► capture ┘
//! ```
//!
//! Webhook and return URL may both arrive for the same payment; the
//! finalizer makes the second one a replay.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use storefront_checkout::{CreatedIntent, FinalizedOrder};
use storefront_core::{CheckoutPayload, Money};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Header carrying `t=<unix>,v1=<hex>` on hosted webhooks.
pub const SIGNATURE_HEADER: &str = "webhook-signature";

// =============================================================================
// Request / Response Types
// =============================================================================

/// Checkout request. `shipping`, `tax` and `discount` are what the client
/// displayed; they are accepted and ignored since every total is recomputed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(flatten)]
    pub payload: CheckoutPayload,
    #[serde(default)]
    pub subtotal: Option<Money>,
    #[serde(default)]
    pub shipping: Option<Money>,
    #[serde(default)]
    pub tax: Option<Money>,
    #[serde(default)]
    pub discount: Option<Money>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    pub order_number: String,
    pub provider_order_id: String,
    #[serde(flatten)]
    pub payload: CheckoutPayload,
}

#[derive(Debug, Deserialize)]
pub struct ReturnQuery {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub replayed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<FinalizedOrder> for FinalizeResponse {
    fn from(done: FinalizedOrder) -> Self {
        FinalizeResponse {
            success: true,
            order_number: Some(done.order.order_number),
            replayed: done.replayed,
            error: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(flatten)]
    pub outcome: Option<FinalizeResponse>,
}

// =============================================================================
// Hosted Session
// =============================================================================

/// `POST /api/checkout/hosted`
pub async fn create_hosted(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> ApiResult<Json<CreatedIntent>> {
    let created = state
        .checkout
        .create_intent(state.hosted.as_ref(), request.payload, request.subtotal)
        .await?;
    Ok(Json(created))
}

/// `GET /api/checkout/hosted/return?session_id=...`
pub async fn hosted_return(
    State(state): State<AppState>,
    Query(query): Query<ReturnQuery>,
) -> ApiResult<Json<FinalizeResponse>> {
    let done = state
        .finalizer
        .finalize_hosted(state.hosted.as_ref(), &query.session_id)
        .await?;
    Ok(Json(done.into()))
}

/// `POST /api/webhooks/hosted`
///
/// Unsigned or tampered deliveries are rejected. Event types other than a
/// completed session are acknowledged without action. Permanent failures
/// are acknowledged too, since redelivery cannot fix them; only storage and
/// provider failures return an error so the provider retries.
pub async fn hosted_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest(format!("missing {} header", SIGNATURE_HEADER)))?;

    let event = state.webhooks.verify(signature, &body, Utc::now())?;
    if !event.completes_session() {
        debug!(event_type = %event.event_type, "Ignoring webhook event");
        return Ok(Json(WebhookAck {
            received: true,
            outcome: None,
        }));
    }

    let session_id = event
        .session_id
        .ok_or_else(|| ApiError::BadRequest("webhook event has no session id".into()))?;

    match state
        .finalizer
        .finalize_hosted(state.hosted.as_ref(), &session_id)
        .await
    {
        Ok(done) => Ok(Json(WebhookAck {
            received: true,
            outcome: Some(done.into()),
        })),
        Err(err) => {
            let err = ApiError::from(err);
            if err.code().status().is_server_error() {
                return Err(err);
            }
            warn!(session_id = %session_id, error = %err, "Webhook finalize rejected");
            Ok(Json(WebhookAck {
                received: true,
                outcome: Some(FinalizeResponse {
                    success: false,
                    order_number: None,
                    replayed: false,
                    error: Some(err.to_string()),
                }),
            }))
        }
    }
}

// =============================================================================
// Two-Phase
// =============================================================================

/// `POST /api/checkout/two-phase`
pub async fn create_two_phase(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> ApiResult<Json<CreatedIntent>> {
    let created = state
        .checkout
        .create_intent(state.two_phase.as_ref(), request.payload, request.subtotal)
        .await?;
    Ok(Json(created))
}

/// `POST /api/checkout/two-phase/capture`
pub async fn capture_two_phase(
    State(state): State<AppState>,
    Json(request): Json<CaptureRequest>,
) -> ApiResult<Json<FinalizeResponse>> {
    let done = state
        .finalizer
        .finalize_two_phase(
            state.two_phase.as_ref(),
            &request.order_number,
            &request.provider_order_id,
            request.payload,
        )
        .await?;
    info!(order_number = %done.order.order_number, replayed = done.replayed, "Two-phase capture handled");
    Ok(Json(done.into()))
}
