//! Payment adapters over real HTTP, against axum stand-ins for the two
//! provider APIs bound to an ephemeral local port.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use storefront_checkout::payment::IntentLine;
use storefront_checkout::{
    HostedSessionAdapter, HostedSessionConfig, IntentRequest, PaymentAdapter, PaymentError,
    TwoPhaseAdapter, TwoPhaseConfig,
};
use storefront_core::Money;

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn intent_request() -> IntentRequest {
    IntentRequest {
        order_number: "SF-TEST-1".into(),
        amount: Money::from_cents(4403),
        currency: "EUR".into(),
        customer_email: "ada@example.com".into(),
        lines: vec![IntentLine {
            name: "Tee".into(),
            unit_amount: Money::from_cents(2500),
            quantity: 1,
        }],
        adjustments: Money::from_cents(1903),
    }
}

// =============================================================================
// Two-Phase Provider Stand-in
// =============================================================================

#[derive(Default)]
struct TwoPhaseStub {
    /// `expires_in` handed out with every token.
    token_ttl: u64,
    tokens_issued: AtomicUsize,
    captures: AtomicUsize,
    idempotency_key: Mutex<Option<String>>,
    order_body: Mutex<Option<Value>>,
}

fn completed_order(id: &str) -> Value {
    json!({
        "id": id,
        "status": "COMPLETED",
        "payer": { "email_address": "buyer@example.com" },
        "purchase_units": [{
            "payments": { "captures": [{
                "id": format!("CAP-{}", id),
                "status": "COMPLETED",
                "amount": { "currency_code": "EUR", "value": "44.03" }
            }]}
        }]
    })
}

async fn issue_token(State(stub): State<Arc<TwoPhaseStub>>, headers: HeaderMap) -> Response {
    let basic = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Basic "));
    if !basic {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let n = stub.tokens_issued.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({
        "access_token": format!("tok-{}", n),
        "token_type": "Bearer",
        "expires_in": stub.token_ttl
    }))
    .into_response()
}

async fn create_order(
    State(stub): State<Arc<TwoPhaseStub>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if bearer(&headers).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    *stub.idempotency_key.lock().unwrap() = headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *stub.order_body.lock().unwrap() = Some(body);

    (
        StatusCode::CREATED,
        Json(json!({
            "id": "ORDER-1",
            "status": "CREATED",
            "links": [
                { "rel": "self", "href": "https://api.example/v2/checkout/orders/ORDER-1" },
                { "rel": "approve", "href": "https://pay.example/approve?token=ORDER-1" }
            ]
        })),
    )
        .into_response()
}

async fn capture_order(
    State(stub): State<Arc<TwoPhaseStub>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if bearer(&headers).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    stub.captures.fetch_add(1, Ordering::SeqCst);

    match id.as_str() {
        "ORDER-DONE" => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "name": "UNPROCESSABLE_ENTITY",
                "details": [{ "issue": "ORDER_ALREADY_CAPTURED" }]
            })),
        )
            .into_response(),
        "ORDER-DECLINED" => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "name": "UNPROCESSABLE_ENTITY",
                "details": [{ "issue": "INSTRUMENT_DECLINED" }]
            })),
        )
            .into_response(),
        _ => (StatusCode::CREATED, Json(completed_order(&id))).into_response(),
    }
}

async fn show_order(Path(id): Path<String>, headers: HeaderMap) -> Response {
    if bearer(&headers).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(completed_order(&id)).into_response()
}

async fn two_phase(token_ttl: u64) -> (TwoPhaseAdapter, Arc<TwoPhaseStub>) {
    let stub = Arc::new(TwoPhaseStub {
        token_ttl,
        ..TwoPhaseStub::default()
    });
    let app = Router::new()
        .route("/v1/oauth2/token", post(issue_token))
        .route("/v2/checkout/orders", post(create_order))
        .route("/v2/checkout/orders/{id}", get(show_order))
        .route("/v2/checkout/orders/{id}/capture", post(capture_order))
        .with_state(stub.clone());
    let base = serve(app).await;

    let adapter = TwoPhaseAdapter::new(TwoPhaseConfig {
        api_base: base,
        client_id: "client".into(),
        client_secret: "secret".into(),
        timeout_secs: 5,
    })
    .unwrap();
    (adapter, stub)
}

#[tokio::test]
async fn test_two_phase_create_then_capture_reuses_token() {
    let (adapter, stub) = two_phase(3600).await;

    let intent = adapter.create_intent(&intent_request()).await.unwrap();
    assert_eq!(intent.provider_ref, "ORDER-1");
    assert_eq!(
        intent.redirect_url.as_deref(),
        Some("https://pay.example/approve?token=ORDER-1")
    );
    assert_eq!(stub.idempotency_key.lock().unwrap().as_deref(), Some("SF-TEST-1"));

    let body = stub.order_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["intent"], "CAPTURE");
    assert_eq!(body["purchase_units"][0]["reference_id"], "SF-TEST-1");
    assert_eq!(body["purchase_units"][0]["amount"]["value"], "44.03");
    assert_eq!(body["purchase_units"][0]["amount"]["currency_code"], "EUR");

    let capture = adapter.finalize("ORDER-1", None).await.unwrap();
    assert_eq!(capture.external_payment_id, "CAP-ORDER-1");
    assert_eq!(capture.amount_captured, Money::from_cents(4403));
    assert_eq!(capture.currency, "EUR");
    assert_eq!(capture.payer_email.as_deref(), Some("buyer@example.com"));

    assert_eq!(stub.tokens_issued.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_two_phase_token_refreshed_inside_expiry_margin() {
    // Shorter than the renewal margin: every call needs a fresh token.
    let (adapter, stub) = two_phase(30).await;

    adapter.finalize("ORDER-1", None).await.unwrap();
    adapter.finalize("ORDER-2", None).await.unwrap();

    assert_eq!(stub.tokens_issued.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_two_phase_already_captured_reads_existing_capture() {
    let (adapter, stub) = two_phase(3600).await;

    let capture = adapter.finalize("ORDER-DONE", None).await.unwrap();
    assert_eq!(capture.external_payment_id, "CAP-ORDER-DONE");
    assert_eq!(capture.amount_captured, Money::from_cents(4403));
    assert_eq!(stub.captures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_two_phase_other_unprocessable_is_provider_error() {
    let (adapter, _stub) = two_phase(3600).await;

    let err = adapter.finalize("ORDER-DECLINED", None).await.unwrap_err();
    match err {
        PaymentError::Provider { status, message } => {
            assert_eq!(status, 422);
            assert!(message.contains("INSTRUMENT_DECLINED"));
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

// =============================================================================
// Hosted Session Provider Stand-in
// =============================================================================

const SECRET_KEY: &str = "sk_test_hosted";

#[derive(Default)]
struct HostedStub {
    created: Mutex<Option<Value>>,
}

async fn create_session(
    State(stub): State<Arc<HostedStub>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if bearer(&headers).as_deref() != Some(SECRET_KEY) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let id = format!("cs_{}", body["client_reference_id"].as_str().unwrap_or_default());
    *stub.created.lock().unwrap() = Some(body);
    Json(json!({ "id": id, "url": "https://pay.example/session" })).into_response()
}

async fn show_session(Path(id): Path<String>, headers: HeaderMap) -> Response {
    if bearer(&headers).as_deref() != Some(SECRET_KEY) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let session = match id.as_str() {
        "cs_paid" => json!({
            "id": id,
            "payment_status": "paid",
            "payment_intent": "pi_1",
            "amount_total": 4403,
            "currency": "eur",
            "customer_email": "buyer@example.com"
        }),
        "cs_open" => json!({
            "id": id,
            "payment_status": "unpaid",
            "payment_intent": null,
            "amount_total": 4403,
            "currency": "eur"
        }),
        "cs_no_payment_id" => json!({
            "id": id,
            "payment_status": "paid",
            "amount_total": 4403,
            "currency": "eur"
        }),
        _ => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": { "message": "No such checkout session" } })),
            )
                .into_response()
        }
    };
    Json(session).into_response()
}

async fn hosted() -> (HostedSessionAdapter, Arc<HostedStub>) {
    let stub = Arc::new(HostedStub::default());
    let app = Router::new()
        .route("/v1/checkout/sessions", post(create_session))
        .route("/v1/checkout/sessions/{id}", get(show_session))
        .with_state(stub.clone());
    let base = serve(app).await;

    let adapter = HostedSessionAdapter::new(
        HostedSessionConfig {
            api_base: base,
            secret_key: SECRET_KEY.into(),
            timeout_secs: 5,
            ..HostedSessionConfig::default()
        },
        "https://shop.example/checkout/success",
        "https://shop.example/cart",
    )
    .unwrap();
    (adapter, stub)
}

#[tokio::test]
async fn test_hosted_create_sends_cart_and_order_number() {
    let (adapter, stub) = hosted().await;

    let intent = adapter.create_intent(&intent_request()).await.unwrap();
    assert_eq!(intent.provider_ref, "cs_SF-TEST-1");
    assert_eq!(intent.redirect_url.as_deref(), Some("https://pay.example/session"));

    let body = stub.created.lock().unwrap().clone().unwrap();
    assert_eq!(body["client_reference_id"], "SF-TEST-1");
    assert_eq!(body["metadata"]["order_number"], "SF-TEST-1");
    assert_eq!(body["amount_total"], 4403);
    assert_eq!(body["currency"], "eur");
    assert_eq!(body["adjustment"], 1903);
    assert_eq!(body["line_items"].as_array().unwrap().len(), 1);
    assert!(body["success_url"]
        .as_str()
        .unwrap()
        .ends_with("?session_id={CHECKOUT_SESSION_ID}"));
}

#[tokio::test]
async fn test_hosted_finalize_reads_paid_session() {
    let (adapter, _stub) = hosted().await;

    let capture = adapter.finalize("cs_paid", None).await.unwrap();
    assert_eq!(capture.external_payment_id, "pi_1");
    assert_eq!(capture.amount_captured, Money::from_cents(4403));
    assert_eq!(capture.currency, "EUR");
    assert_eq!(capture.payer_email.as_deref(), Some("buyer@example.com"));
}

#[tokio::test]
async fn test_hosted_unpaid_session_is_not_completed() {
    let (adapter, _stub) = hosted().await;

    let err = adapter.finalize("cs_open", None).await.unwrap_err();
    assert!(matches!(
        err,
        PaymentError::NotCompleted { ref status, .. } if status == "unpaid"
    ));
}

#[tokio::test]
async fn test_hosted_paid_session_without_payment_id_is_invalid() {
    let (adapter, _stub) = hosted().await;

    let err = adapter.finalize("cs_no_payment_id", None).await.unwrap_err();
    assert!(matches!(err, PaymentError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_hosted_unknown_session_is_provider_error() {
    let (adapter, _stub) = hosted().await;

    let err = adapter.finalize("cs_missing", None).await.unwrap_err();
    assert!(matches!(err, PaymentError::Provider { status: 404, .. }));
}
