//! # Checkout Service
//!
//! Creates payment intents. The order itself is not written here; that
//! happens in [`crate::finalizer`] once money has moved.
//!
//! ## create_intent
//! ```text
//! payload ──► validate shape ──► PricingPipeline ──► client subtotal agrees?
//!                                                         │ no ──► PriceChanged
//!                                                         ▼
//!             checkout_sessions row (pending, order number reserved)
//!                                                         │
//!                                                         ▼
//!             adapter.create_intent ──► set provider_ref ──► CreatedIntent
//! ```
//!
//! An intent that is never paid leaves only the pending session behind,
//! which the sweeper deletes after its TTL.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use storefront_core::discount::normalize_code;
use storefront_core::validation::validate_checkout_payload;
use storefront_core::{
    CheckoutPayload, CheckoutSession, CheckoutSessionStatus, Money, PriceQuote, ShippingZone,
};
use storefront_db::{Database, DbError};

use crate::error::{CheckoutError, CheckoutResult};
use crate::order_number;
use crate::payment::{IntentLine, IntentRequest, PaymentAdapter};
use crate::pricing::PricingPipeline;
use crate::settings::CheckoutSettings;

/// Attempts at drawing an unused order number.
const ORDER_NUMBER_ATTEMPTS: usize = 3;

/// What the client needs to send the buyer to the provider.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedIntent {
    pub order_number: String,
    pub provider_ref: String,
    pub redirect_url: Option<String>,
    pub quote: PriceQuote,
}

#[derive(Debug, Clone)]
pub struct CheckoutService {
    db: Database,
    pricing: PricingPipeline,
    settings: CheckoutSettings,
}

impl CheckoutService {
    pub fn new(db: Database, settings: CheckoutSettings) -> Self {
        CheckoutService {
            pricing: PricingPipeline::new(db.clone()),
            db,
            settings,
        }
    }

    /// Prices the payload, reserves an order number and opens a payment
    /// with `adapter`.
    ///
    /// `declared_subtotal` is the subtotal the client displayed. When given,
    /// it must match the authoritative one exactly.
    pub async fn create_intent(
        &self,
        adapter: &dyn PaymentAdapter,
        payload: CheckoutPayload,
        declared_subtotal: Option<Money>,
    ) -> CheckoutResult<CreatedIntent> {
        let payload = normalize_payload(payload);
        validate_checkout_payload(&payload)?;

        let zone = ShippingZone::for_country(&payload.shipping_address.country);
        let priced = self
            .pricing
            .price(&payload.items, zone, payload.discount_code.as_deref())
            .await?;

        if let Some(declared) = declared_subtotal {
            if declared != priced.quote.subtotal {
                return Err(CheckoutError::PriceChanged {
                    declared,
                    actual: priced.quote.subtotal,
                });
            }
        }

        let session = self.reserve_session(&payload, adapter, priced.quote.grand_total).await?;

        let request = IntentRequest {
            order_number: session.order_number.clone(),
            amount: priced.quote.grand_total,
            currency: priced.quote.currency.clone(),
            customer_email: payload.customer_email.clone(),
            lines: priced
                .lines
                .iter()
                .map(|l| IntentLine {
                    name: l.name.clone(),
                    unit_amount: l.unit_price,
                    quantity: l.quantity,
                })
                .collect(),
            adjustments: priced.quote.shipping_cost - priced.quote.discount_amount,
        };

        let intent = adapter.create_intent(&request).await?;
        self.db
            .sessions()
            .set_provider_ref(&session.order_number, &intent.provider_ref)
            .await?;

        info!(
            order_number = %session.order_number,
            method = %adapter.method(),
            provider_ref = %intent.provider_ref,
            grand_total = %priced.quote.grand_total,
            "Checkout intent created"
        );

        Ok(CreatedIntent {
            order_number: session.order_number,
            provider_ref: intent.provider_ref,
            redirect_url: intent.redirect_url,
            quote: priced.quote,
        })
    }

    /// Inserts a pending session under a fresh order number.
    async fn reserve_session(
        &self,
        payload: &CheckoutPayload,
        adapter: &dyn PaymentAdapter,
        quoted_total: Money,
    ) -> CheckoutResult<CheckoutSession> {
        let encoded = serde_json::to_string(payload)?;

        let mut last_err = None;
        for _ in 0..ORDER_NUMBER_ATTEMPTS {
            let now = Utc::now();
            let session = CheckoutSession {
                order_number: order_number::generate(now),
                payment_method: adapter.method(),
                provider_ref: None,
                payload: encoded.clone(),
                quoted_total_cents: quoted_total.cents(),
                currency: self.settings.currency.clone(),
                status: CheckoutSessionStatus::Pending,
                created_at: now,
                expires_at: now + self.settings.session_ttl(),
                completed_at: None,
            };

            match self.db.sessions().insert(&session).await {
                Ok(()) => return Ok(session),
                Err(e @ DbError::UniqueViolation { .. }) => {
                    warn!(order_number = %session.order_number, "Order number collision, redrawing");
                    last_err = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err
            .map(CheckoutError::Persistence)
            .unwrap_or_else(|| CheckoutError::InvalidRequest("no order number available".into())))
    }
}

/// Canonical form stored with the session and replayed at finalize.
pub(crate) fn normalize_payload(mut payload: CheckoutPayload) -> CheckoutPayload {
    payload.discount_code = payload
        .discount_code
        .as_deref()
        .map(normalize_code)
        .filter(|c| !c.is_empty());
    payload.customer_email = payload.customer_email.trim().to_string();
    payload.shipping_address.country = payload.shipping_address.country.trim().to_uppercase();
    payload
}
