//! # storefront-api
//!
//! HTTP surface over the checkout pipeline.
//!
//! ## Routes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POST /api/quote                     PricingPipeline                    │
//! │  POST /api/discounts/validate        DiscountValidator                  │
//! │  POST /api/checkout/hosted           CheckoutService (hosted)           │
//! │  GET  /api/checkout/hosted/return    OrderFinalizer (return URL)        │
//! │  POST /api/webhooks/hosted           OrderFinalizer (signed webhook)    │
//! │  POST /api/checkout/two-phase        CheckoutService (two-phase)        │
//! │  POST /api/checkout/two-phase/capture OrderFinalizer (capture)          │
//! │  GET  /api/orders/{orderNumber}      receipt: totals + item snapshots   │
//! │  GET  /health                        database ping                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod routes;
pub mod sweeper;

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use storefront_checkout::{
    CheckoutService, CheckoutSettings, DiscountValidator, OrderFinalizer, PaymentAdapter,
    PricingPipeline, WebhookVerifier,
};
use storefront_db::Database;

pub use config::{ApiConfig, ConfigError};
pub use error::{ApiError, ApiResult, ErrorCode};

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub pricing: PricingPipeline,
    pub discounts: DiscountValidator,
    pub checkout: CheckoutService,
    pub finalizer: OrderFinalizer,
    pub hosted: Arc<dyn PaymentAdapter>,
    pub two_phase: Arc<dyn PaymentAdapter>,
    pub webhooks: WebhookVerifier,
}

impl AppState {
    pub fn new(
        db: Database,
        settings: CheckoutSettings,
        hosted: Arc<dyn PaymentAdapter>,
        two_phase: Arc<dyn PaymentAdapter>,
        webhooks: WebhookVerifier,
    ) -> Self {
        AppState {
            pricing: PricingPipeline::new(db.clone()),
            discounts: DiscountValidator::new(db.clone()),
            checkout: CheckoutService::new(db.clone(), settings.clone()),
            finalizer: OrderFinalizer::new(db.clone(), settings),
            db,
            hosted,
            two_phase,
            webhooks,
        }
    }
}

/// Builds the application router.
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/api/quote", post(routes::quote::quote))
        .route("/api/discounts/validate", post(routes::quote::validate_discount))
        .route("/api/checkout/hosted", post(routes::checkout::create_hosted))
        .route("/api/checkout/hosted/return", get(routes::checkout::hosted_return))
        .route("/api/webhooks/hosted", post(routes::checkout::hosted_webhook))
        .route("/api/checkout/two-phase", post(routes::checkout::create_two_phase))
        .route(
            "/api/checkout/two-phase/capture",
            post(routes::checkout::capture_two_phase),
        )
        .route("/api/orders/{order_number}", get(routes::orders::get_order))
        .route("/health", get(routes::orders::health))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}
