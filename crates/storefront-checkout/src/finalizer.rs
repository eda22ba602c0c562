//! # Order Finalizer
//!
//! Turns a completed payment into exactly one persisted order.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Pending ──► Priced ──► Captured ──► Persisted                        │
//! │      │  │       │           │             ▲                             │
//! │      │  └───────┼───────────┼─────────────┘ order already bound to     │
//! │      │          │           │               this payment: short-circuit│
//! │      ▼          ▼           ▼                                           │
//! │    Failed     Failed      Failed                                        │
//! │                                                                         │
//! │   Pending  → Priced    re-run PricingPipeline on the stored/replayed   │
//! │                        payload, never on provider-reported numbers     │
//! │   Priced   → Captured  adapter.finalize; |captured − total| ≤ 1 cent   │
//! │                        otherwise AmountMismatch + payment review       │
//! │   Captured → Persisted create_paid_order: order + items + stock +      │
//! │                        discount usage in one transaction, keyed on     │
//! │                        the external payment id; transient failures     │
//! │                        retried with exponential backoff                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any failure after funds were captured lands in the payment review queue.
//! Nothing in here branches on which provider ran beyond the adapter call.

use std::fmt;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use storefront_core::validation::validate_checkout_payload;
use storefront_core::{CheckoutPayload, Money, Order, PaymentMethod, ShippingZone};
use storefront_db::{Database, NewOrder, NewPaymentReview, PersistOutcome};

use crate::checkout::normalize_payload;
use crate::error::{CheckoutError, CheckoutResult};
use crate::payment::{CaptureResult, PaymentAdapter};
use crate::pricing::{PricedCart, PricingPipeline};
use crate::settings::CheckoutSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeState {
    Pending,
    Priced,
    Captured,
    Persisted,
    Failed,
}

impl fmt::Display for FinalizeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FinalizeState::Pending => "pending",
            FinalizeState::Priced => "priced",
            FinalizeState::Captured => "captured",
            FinalizeState::Persisted => "persisted",
            FinalizeState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A persisted order and whether this call created it.
#[derive(Debug, Clone)]
pub struct FinalizedOrder {
    pub order: Order,
    /// True when an earlier attempt already persisted this payment.
    pub replayed: bool,
}

/// Tracks one finalize attempt through the state machine.
struct Attempt<'a> {
    order_number: &'a str,
    state: FinalizeState,
}

impl<'a> Attempt<'a> {
    fn new(order_number: &'a str) -> Self {
        Attempt {
            order_number,
            state: FinalizeState::Pending,
        }
    }

    fn advance(&mut self, next: FinalizeState) {
        debug!(order_number = %self.order_number, from = %self.state, to = %next, "Finalize transition");
        self.state = next;
    }

    fn fail(&mut self, err: &CheckoutError) {
        warn!(order_number = %self.order_number, from = %self.state, error = %err, "Finalize failed");
        self.state = FinalizeState::Failed;
    }
}

#[derive(Debug, Clone)]
pub struct OrderFinalizer {
    db: Database,
    pricing: PricingPipeline,
    settings: CheckoutSettings,
}

impl OrderFinalizer {
    pub fn new(db: Database, settings: CheckoutSettings) -> Self {
        OrderFinalizer {
            pricing: PricingPipeline::new(db.clone()),
            db,
            settings,
        }
    }

    /// Finalizes a hosted session, from the webhook or the return URL.
    ///
    /// The cart comes from the checkout session stored at intent creation.
    /// Expired sessions are still honoured: the buyer may have paid right
    /// before the TTL.
    pub async fn finalize_hosted(
        &self,
        adapter: &dyn PaymentAdapter,
        session_id: &str,
    ) -> CheckoutResult<FinalizedOrder> {
        if let Some(order) = self.db.orders().find_by_provider_ref(session_id).await? {
            debug!(order_number = %order.order_number, "Hosted session already finalized");
            return Ok(FinalizedOrder {
                order,
                replayed: true,
            });
        }

        let session = match self.db.sessions().find_by_provider_ref(session_id).await? {
            Some(session) => session,
            None => return self.session_missing(adapter, session_id).await,
        };

        if session.payment_method != adapter.method() {
            return Err(CheckoutError::InvalidRequest(format!(
                "session {} was opened with {}",
                session.order_number, session.payment_method
            )));
        }

        let payload: CheckoutPayload = serde_json::from_str(&session.payload)?;
        self.run(adapter, &session.order_number, session_id, payload)
            .await
    }

    /// Captures a two-phase order after buyer approval.
    ///
    /// The payload travelled through the client, so it is validated again
    /// and must belong to the session that reserved `provider_order_id`.
    pub async fn finalize_two_phase(
        &self,
        adapter: &dyn PaymentAdapter,
        order_number: &str,
        provider_order_id: &str,
        payload: CheckoutPayload,
    ) -> CheckoutResult<FinalizedOrder> {
        if let Some(order) = self.db.orders().find_by_provider_ref(provider_order_id).await? {
            debug!(order_number = %order.order_number, "Two-phase order already captured");
            return Ok(FinalizedOrder {
                order,
                replayed: true,
            });
        }

        let session = self
            .db
            .sessions()
            .get(order_number)
            .await?
            .filter(|s| s.provider_ref.as_deref() == Some(provider_order_id))
            .ok_or_else(|| CheckoutError::not_found("CheckoutSession", order_number))?;

        if session.payment_method != adapter.method() {
            return Err(CheckoutError::InvalidRequest(format!(
                "session {} was opened with {}",
                session.order_number, session.payment_method
            )));
        }
        if session.is_expired(Utc::now()) {
            return Err(CheckoutError::SessionExpired {
                order_number: session.order_number,
            });
        }

        let payload = normalize_payload(payload);
        validate_checkout_payload(&payload)?;

        let reserved: CheckoutPayload = serde_json::from_str(&session.payload)?;
        if reserved != payload {
            warn!(order_number = %order_number, "Capture payload differs from checkout session");
            return Err(CheckoutError::PayloadMismatch {
                order_number: session.order_number,
            });
        }

        self.run(adapter, order_number, provider_order_id, payload)
            .await
    }

    async fn run(
        &self,
        adapter: &dyn PaymentAdapter,
        order_number: &str,
        provider_ref: &str,
        payload: CheckoutPayload,
    ) -> CheckoutResult<FinalizedOrder> {
        let mut attempt = Attempt::new(order_number);

        // Pending → Priced
        let zone = ShippingZone::for_country(&payload.shipping_address.country);
        let priced = match self
            .pricing
            .price(&payload.items, zone, payload.discount_code.as_deref())
            .await
        {
            Ok(priced) => priced,
            Err(err) => {
                attempt.fail(&err);
                return self
                    .pricing_failed(adapter, order_number, provider_ref, err)
                    .await;
            }
        };
        attempt.advance(FinalizeState::Priced);

        // Priced → Captured
        let capture = match adapter.finalize(provider_ref, None).await {
            Ok(capture) => capture,
            Err(err) => {
                let err = CheckoutError::from(err);
                attempt.fail(&err);
                return Err(err);
            }
        };
        attempt.advance(FinalizeState::Captured);

        let expected = priced.quote.grand_total;
        let difference = (capture.amount_captured - expected).abs();
        if difference > self.settings.amount_tolerance()
            || !capture.currency.eq_ignore_ascii_case(&priced.quote.currency)
        {
            let err = CheckoutError::AmountMismatch {
                order_number: order_number.to_string(),
                expected,
                captured: capture.amount_captured,
            };
            attempt.fail(&err);
            error!(
                order_number = %order_number,
                external_payment_id = %capture.external_payment_id,
                expected = %expected,
                captured = %capture.amount_captured,
                currency = %capture.currency,
                "Captured amount does not match order total"
            );
            self.flag(adapter.method(), order_number, Some(&capture), Some(expected), &err)
                .await;
            return Err(err);
        }

        // Captured → Persisted
        let new_order = build_order(
            adapter.method(),
            order_number,
            provider_ref,
            &payload,
            &priced,
            &capture,
        )?;
        match self.persist(&new_order).await {
            Ok(outcome) => {
                attempt.advance(FinalizeState::Persisted);
                let replayed = !outcome.was_created();
                let order = outcome.into_order();
                info!(
                    order_number = %order.order_number,
                    external_payment_id = %order.payment_intent_id,
                    total = %order.total(),
                    replayed = replayed,
                    "Order finalized"
                );
                Ok(FinalizedOrder { order, replayed })
            }
            Err(err) => {
                attempt.fail(&err);
                error!(
                    order_number = %order_number,
                    external_payment_id = %capture.external_payment_id,
                    error = %err,
                    "Payment captured but order not persisted"
                );
                self.flag(adapter.method(), order_number, Some(&capture), Some(expected), &err)
                    .await;
                Err(err)
            }
        }
    }

    /// Re-pricing failed. A concurrent attempt may have persisted this very
    /// payment (and consumed the stock); otherwise a hosted payment may
    /// already hold the buyer's money and needs a human.
    async fn pricing_failed(
        &self,
        adapter: &dyn PaymentAdapter,
        order_number: &str,
        provider_ref: &str,
        err: CheckoutError,
    ) -> CheckoutResult<FinalizedOrder> {
        if let Some(order) = self.db.orders().find_by_provider_ref(provider_ref).await? {
            return Ok(FinalizedOrder {
                order,
                replayed: true,
            });
        }

        if adapter.method() == PaymentMethod::HostedSession {
            if let Ok(capture) = adapter.finalize(provider_ref, None).await {
                error!(
                    order_number = %order_number,
                    external_payment_id = %capture.external_payment_id,
                    error = %err,
                    "Hosted payment captured but cart no longer prices"
                );
                self.flag(adapter.method(), order_number, Some(&capture), None, &err)
                    .await;
            }
        }

        Err(err)
    }

    /// No session is bound to `provider_ref`. If the provider reports the
    /// payment as paid there is money without a cart, which needs a human.
    async fn session_missing(
        &self,
        adapter: &dyn PaymentAdapter,
        provider_ref: &str,
    ) -> CheckoutResult<FinalizedOrder> {
        let err = CheckoutError::not_found("CheckoutSession", provider_ref);

        match adapter.finalize(provider_ref, None).await {
            Ok(capture) => {
                error!(
                    provider_ref = %provider_ref,
                    external_payment_id = %capture.external_payment_id,
                    captured = %capture.amount_captured,
                    "Payment captured for unknown checkout session"
                );
                self.flag(adapter.method(), provider_ref, Some(&capture), None, &err)
                    .await;
            }
            Err(e) => {
                debug!(provider_ref = %provider_ref, error = %e, "Unknown session has no payment");
            }
        }

        Err(err)
    }

    /// Persists with exponential backoff on transient storage failures.
    async fn persist(&self, order: &NewOrder) -> CheckoutResult<PersistOutcome> {
        let mut backoff = ExponentialBackoff {
            initial_interval: std::time::Duration::from_millis(100),
            max_interval: std::time::Duration::from_secs(2),
            multiplier: 2.0,
            max_elapsed_time: Some(self.settings.persist_retry_budget()),
            ..Default::default()
        };

        loop {
            match self.db.orders().create_paid_order(order).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) if err.is_transient() => match backoff.next_backoff() {
                    Some(wait) => {
                        warn!(
                            order_number = %order.order_number,
                            error = %err,
                            wait_ms = wait.as_millis() as u64,
                            "Transient persistence failure, retrying"
                        );
                        tokio::time::sleep(wait).await;
                    }
                    None => return Err(err.into()),
                },
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn flag(
        &self,
        method: PaymentMethod,
        order_number: &str,
        capture: Option<&CaptureResult>,
        expected: Option<Money>,
        reason: &CheckoutError,
    ) {
        let review = NewPaymentReview {
            order_number: order_number.to_string(),
            payment_method: method,
            external_payment_id: capture.map(|c| c.external_payment_id.clone()),
            reason: reason.to_string(),
            expected_cents: expected.map(|m| m.cents()),
            captured_cents: capture.map(|c| c.amount_captured.cents()),
        };

        if let Err(e) = self.db.reviews().flag(review).await {
            error!(order_number = %order_number, error = %e, "Could not record payment review");
        }
    }
}

fn build_order(
    method: PaymentMethod,
    order_number: &str,
    provider_ref: &str,
    payload: &CheckoutPayload,
    priced: &PricedCart,
    capture: &CaptureResult,
) -> CheckoutResult<NewOrder> {
    let quote = &priced.quote;
    Ok(NewOrder {
        order_number: order_number.to_string(),
        currency: quote.currency.clone(),
        customer_email: payload.customer_email.clone(),
        user_id: payload.user_id.clone(),
        subtotal_cents: quote.subtotal.cents(),
        shipping_cents: quote.shipping_cost.cents(),
        tax_cents: quote.vat_amount.cents(),
        discount_cents: quote.discount_amount.cents(),
        total_cents: quote.grand_total.cents(),
        discount_code: quote.discount_code.clone(),
        shipping_method: quote.shipping_method.as_str().to_string(),
        shipping_address: serde_json::to_string(&payload.shipping_address)?,
        payment_method: method,
        external_payment_id: capture.external_payment_id.clone(),
        provider_ref: Some(provider_ref.to_string()),
        items: priced.lines.iter().map(|l| l.to_order_item()).collect(),
    })
}
