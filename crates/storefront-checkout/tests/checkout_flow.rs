//! End-to-end checkout flows against a SQLite database and a scripted
//! payment provider.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tempfile::TempDir;
use tokio::sync::Barrier;

use storefront_checkout::payment::{PaymentError, PaymentResult};
use storefront_checkout::{
    CaptureResult, CheckoutError, CheckoutService, CheckoutSettings, DiscountValidator,
    IntentRequest, OrderFinalizer, PaymentAdapter, ProviderIntent,
};
use storefront_core::discount::DiscountRejection;
use storefront_core::{
    CheckoutItem, CheckoutPayload, CheckoutSessionStatus, DiscountCode, DiscountKind, Money,
    PaymentMethod, Product, ProductCategory, ShippingAddress,
};
use storefront_db::{Database, DbConfig};

// =============================================================================
// Scripted Provider
// =============================================================================

struct FakeProvider {
    method: PaymentMethod,
    /// Added to the intent amount when reporting the capture.
    capture_delta: i64,
    intents: Mutex<HashMap<String, Money>>,
    captures: AtomicUsize,
    /// Holds every finalize call until this many have arrived.
    gate: Option<Barrier>,
}

impl FakeProvider {
    fn new(method: PaymentMethod) -> Self {
        FakeProvider {
            method,
            capture_delta: 0,
            intents: Mutex::new(HashMap::new()),
            captures: AtomicUsize::new(0),
            gate: None,
        }
    }

    fn with_delta(mut self, delta: i64) -> Self {
        self.capture_delta = delta;
        self
    }

    fn gated(mut self, parties: usize) -> Self {
        self.gate = Some(Barrier::new(parties));
        self
    }

    fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    /// A payment the provider knows about but this shop never opened.
    fn with_foreign_payment(self, provider_ref: &str, amount: Money) -> Self {
        self.intents
            .lock()
            .unwrap()
            .insert(provider_ref.to_string(), amount);
        self
    }
}

#[async_trait]
impl PaymentAdapter for FakeProvider {
    fn method(&self) -> PaymentMethod {
        self.method
    }

    async fn create_intent(&self, request: &IntentRequest) -> PaymentResult<ProviderIntent> {
        let provider_ref = format!("ref_{}", request.order_number);
        self.intents
            .lock()
            .unwrap()
            .insert(provider_ref.clone(), request.amount);
        Ok(ProviderIntent {
            provider_ref,
            redirect_url: Some("https://pay.example/approve".into()),
        })
    }

    async fn finalize(
        &self,
        provider_ref: &str,
        _confirmation: Option<&str>,
    ) -> PaymentResult<CaptureResult> {
        if let Some(gate) = &self.gate {
            gate.wait().await;
        }
        let amount = self
            .intents
            .lock()
            .unwrap()
            .get(provider_ref)
            .copied()
            .ok_or_else(|| PaymentError::Provider {
                status: 404,
                message: format!("no such payment: {}", provider_ref),
            })?;
        self.captures.fetch_add(1, Ordering::SeqCst);
        Ok(CaptureResult {
            external_payment_id: format!("pay_{}", provider_ref),
            amount_captured: amount + Money::from_cents(self.capture_delta),
            currency: "EUR".into(),
            payer_email: Some("buyer@example.com".into()),
        })
    }
}

// =============================================================================
// Fixtures
// =============================================================================

struct Shop {
    db: Database,
    checkout: CheckoutService,
    finalizer: OrderFinalizer,
}

async fn shop(products: &[(&str, ProductCategory, i64, i64)]) -> Shop {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    stock_shop(db, products).await
}

/// File-backed database with a real connection pool, so concurrent
/// finalizers contend for the SQLite write lock.
async fn pooled_shop(dir: &TempDir, products: &[(&str, ProductCategory, i64, i64)]) -> Shop {
    let config = DbConfig::new(dir.path().join("shop.db")).max_connections(4);
    let db = Database::new(config).await.unwrap();
    stock_shop(db, products).await
}

async fn stock_shop(db: Database, products: &[(&str, ProductCategory, i64, i64)]) -> Shop {
    let now = Utc::now();
    for (id, category, price_cents, stock) in products {
        db.products()
            .insert(&Product {
                id: id.to_string(),
                name: format!("Product {}", id),
                description: None,
                category: *category,
                price_cents: *price_cents,
                stock_quantity: *stock,
                in_stock: *stock > 0,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    let settings = CheckoutSettings {
        persist_retry_secs: 5,
        ..CheckoutSettings::default()
    };
    Shop {
        checkout: CheckoutService::new(db.clone(), settings.clone()),
        finalizer: OrderFinalizer::new(db.clone(), settings),
        db,
    }
}

fn payload(lines: &[(&str, i64)], discount_code: Option<&str>) -> CheckoutPayload {
    CheckoutPayload {
        items: lines
            .iter()
            .map(|(id, qty)| CheckoutItem {
                product_id: id.to_string(),
                quantity: *qty,
                size: Some("M".into()),
                color: None,
            })
            .collect(),
        shipping_address: ShippingAddress {
            full_name: "Ada Lovelace".into(),
            line1: "Calle Mayor 1".into(),
            line2: None,
            city: "Madrid".into(),
            postal_code: "28013".into(),
            country: "ES".into(),
            phone: None,
        },
        discount_code: discount_code.map(str::to_string),
        customer_email: "ada@example.com".into(),
        user_id: None,
    }
}

async fn stock_of(db: &Database, id: &str) -> i64 {
    db.products().get_by_id(id).await.unwrap().unwrap().stock_quantity
}

// =============================================================================
// Idempotence
// =============================================================================

#[tokio::test]
async fn test_repeated_hosted_finalize_creates_one_order() {
    let shop = shop(&[("tee", ProductCategory::Tops, 2500, 5)]).await;
    let provider = FakeProvider::new(PaymentMethod::HostedSession);

    let intent = shop
        .checkout
        .create_intent(&provider, payload(&[("tee", 2)], None), Some(Money::from_cents(5000)))
        .await
        .unwrap();
    assert_eq!(intent.quote.grand_total, Money::from_cents(5000));

    let first = shop
        .finalizer
        .finalize_hosted(&provider, &intent.provider_ref)
        .await
        .unwrap();
    assert!(!first.replayed);
    assert_eq!(first.order.order_number, intent.order_number);

    let second = shop
        .finalizer
        .finalize_hosted(&provider, &intent.provider_ref)
        .await
        .unwrap();
    assert!(second.replayed);
    assert_eq!(second.order.id, first.order.id);

    assert_eq!(shop.db.orders().count().await.unwrap(), 1);
    assert_eq!(stock_of(&shop.db, "tee").await, 3);

    let items = shop.db.orders().get_items(&first.order.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 2);
}

#[tokio::test]
async fn test_concurrent_duplicate_callbacks_create_one_order() {
    let shop = shop(&[("tee", ProductCategory::Tops, 2500, 5)]).await;
    let provider = FakeProvider::new(PaymentMethod::HostedSession).gated(2);

    let intent = shop
        .checkout
        .create_intent(&provider, payload(&[("tee", 1)], None), None)
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        shop.finalizer.finalize_hosted(&provider, &intent.provider_ref),
        shop.finalizer.finalize_hosted(&provider, &intent.provider_ref),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.order.id, b.order.id);
    assert!(a.replayed != b.replayed);
    assert_eq!(provider.captures(), 2);
    assert_eq!(shop.db.orders().count().await.unwrap(), 1);
    assert_eq!(stock_of(&shop.db, "tee").await, 4);
}

// =============================================================================
// Concurrency On The Last Unit
// =============================================================================

#[tokio::test]
async fn test_last_unit_race_has_one_winner() {
    let dir = TempDir::new().unwrap();
    let shop = pooled_shop(&dir, &[("boot", ProductCategory::Footwear, 14900, 1)]).await;
    let provider = FakeProvider::new(PaymentMethod::TwoPhase).gated(2);

    let first = shop
        .checkout
        .create_intent(&provider, payload(&[("boot", 1)], None), None)
        .await
        .unwrap();
    let second = shop
        .checkout
        .create_intent(&provider, payload(&[("boot", 1)], None), None)
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        shop.finalizer.finalize_two_phase(
            &provider,
            &first.order_number,
            &first.provider_ref,
            payload(&[("boot", 1)], None),
        ),
        shop.finalizer.finalize_two_phase(
            &provider,
            &second.order_number,
            &second.provider_ref,
            payload(&[("boot", 1)], None),
        ),
    );

    let results = [a, b];
    let persisted = results.iter().filter(|r| r.is_ok()).count();
    let short = results
        .iter()
        .filter(|r| matches!(r, Err(CheckoutError::InsufficientStock { .. })))
        .count();
    assert_eq!(persisted, 1);
    assert_eq!(short, 1);

    assert_eq!(stock_of(&shop.db, "boot").await, 0);
    assert_eq!(shop.db.orders().count().await.unwrap(), 1);

    // The loser's money was captured, so it is queued for a refund by hand.
    let loser = if results[0].is_ok() { &second } else { &first };
    let reviews = shop.db.reviews().list_for_order(&loser.order_number).await.unwrap();
    assert_eq!(reviews.len(), 1);
}

// =============================================================================
// Amount Mismatch
// =============================================================================

#[tokio::test]
async fn test_amount_mismatch_creates_no_order() {
    let shop = shop(&[("tee", ProductCategory::Tops, 2500, 5)]).await;
    let provider = FakeProvider::new(PaymentMethod::TwoPhase).with_delta(-500);

    let intent = shop
        .checkout
        .create_intent(&provider, payload(&[("tee", 1)], None), None)
        .await
        .unwrap();

    let err = shop
        .finalizer
        .finalize_two_phase(
            &provider,
            &intent.order_number,
            &intent.provider_ref,
            payload(&[("tee", 1)], None),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::AmountMismatch { .. }));

    assert_eq!(shop.db.orders().count().await.unwrap(), 0);
    assert_eq!(stock_of(&shop.db, "tee").await, 5);

    let reviews = shop.db.reviews().list_for_order(&intent.order_number).await.unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].expected_cents, Some(2500));
    assert_eq!(reviews[0].captured_cents, Some(2000));
}

#[tokio::test]
async fn test_one_cent_rounding_is_tolerated() {
    let shop = shop(&[("tee", ProductCategory::Tops, 2500, 5)]).await;
    let provider = FakeProvider::new(PaymentMethod::TwoPhase).with_delta(1);

    let intent = shop
        .checkout
        .create_intent(&provider, payload(&[("tee", 1)], None), None)
        .await
        .unwrap();

    let done = shop
        .finalizer
        .finalize_two_phase(
            &provider,
            &intent.order_number,
            &intent.provider_ref,
            payload(&[("tee", 1)], None),
        )
        .await
        .unwrap();
    assert_eq!(done.order.total_cents, 2500);
}

// =============================================================================
// Discounts
// =============================================================================

#[tokio::test]
async fn test_welcome10_is_consumed_by_the_order() {
    let shop = shop(&[("coat", ProductCategory::Tops, 10000, 5)]).await;
    shop.db
        .discounts()
        .insert(&DiscountCode {
            code: "WELCOME10".into(),
            kind: DiscountKind::Percentage,
            value: 1000,
            min_purchase_cents: None,
            max_discount_cents: None,
            usage_limit: Some(1),
            used_count: 0,
            valid_from: None,
            valid_until: None,
            is_active: true,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    let validator = DiscountValidator::new(shop.db.clone());
    let provider = FakeProvider::new(PaymentMethod::HostedSession);

    let before = validator
        .validate("WELCOME10", Money::from_euros(100))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(before.discount_amount, Money::from_euros(10));

    let intent = shop
        .checkout
        .create_intent(&provider, payload(&[("coat", 1)], Some("welcome10")), None)
        .await
        .unwrap();
    assert_eq!(intent.quote.discount_amount, Money::from_euros(10));
    assert_eq!(intent.quote.grand_total, Money::from_euros(90));

    let done = shop
        .finalizer
        .finalize_hosted(&provider, &intent.provider_ref)
        .await
        .unwrap();
    assert_eq!(done.order.discount_code.as_deref(), Some("WELCOME10"));
    assert_eq!(done.order.discount_cents, 1000);

    let after = validator
        .validate("WELCOME10", Money::from_euros(100))
        .await
        .unwrap();
    assert_eq!(after, Err(DiscountRejection::UsageLimitReached));
}

// =============================================================================
// Request Checks
// =============================================================================

#[tokio::test]
async fn test_declared_subtotal_must_match() {
    let shop = shop(&[("tee", ProductCategory::Tops, 2500, 5)]).await;
    let provider = FakeProvider::new(PaymentMethod::HostedSession);

    let err = shop
        .checkout
        .create_intent(&provider, payload(&[("tee", 1)], None), Some(Money::from_cents(1999)))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::PriceChanged { .. }));
}

#[tokio::test]
async fn test_two_phase_capture_needs_matching_session() {
    let shop = shop(&[("tee", ProductCategory::Tops, 2500, 5)]).await;
    let provider = FakeProvider::new(PaymentMethod::TwoPhase);

    let intent = shop
        .checkout
        .create_intent(&provider, payload(&[("tee", 1)], None), None)
        .await
        .unwrap();

    let err = shop
        .finalizer
        .finalize_two_phase(
            &provider,
            "SF-NOT-MINE",
            &intent.provider_ref,
            payload(&[("tee", 1)], None),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::NotFound { .. }));
    assert_eq!(provider.captures(), 0);
}

#[tokio::test]
async fn test_hosted_payment_for_retired_product_is_flagged() {
    let shop = shop(&[("tee", ProductCategory::Tops, 2500, 5)]).await;
    let provider = FakeProvider::new(PaymentMethod::HostedSession);

    let intent = shop
        .checkout
        .create_intent(&provider, payload(&[("tee", 1)], None), None)
        .await
        .unwrap();
    shop.db.products().deactivate("tee").await.unwrap();

    let err = shop
        .finalizer
        .finalize_hosted(&provider, &intent.provider_ref)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::StaleOrMissingProduct { .. }));
    assert_eq!(shop.db.orders().count().await.unwrap(), 0);

    let reviews = shop.db.reviews().list_for_order(&intent.order_number).await.unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].captured_cents, Some(2500));
}

// =============================================================================
// Late And Orphaned Payments
// =============================================================================

#[tokio::test]
async fn test_late_webhook_after_session_expiry_still_creates_order() {
    let shop = shop(&[("tee", ProductCategory::Tops, 2500, 5)]).await;
    let provider = FakeProvider::new(PaymentMethod::HostedSession);

    let intent = shop
        .checkout
        .create_intent(&provider, payload(&[("tee", 1)], None), None)
        .await
        .unwrap();

    // The sweeper runs after the TTL, before the provider's webhook retry.
    let expired = shop
        .db
        .sessions()
        .expire_stale(Utc::now() + Duration::hours(25))
        .await
        .unwrap();
    assert_eq!(expired, 1);

    let done = shop
        .finalizer
        .finalize_hosted(&provider, &intent.provider_ref)
        .await
        .unwrap();
    assert!(!done.replayed);
    assert_eq!(done.order.order_number, intent.order_number);
    assert_eq!(stock_of(&shop.db, "tee").await, 4);

    let session = shop.db.sessions().get(&intent.order_number).await.unwrap().unwrap();
    assert_eq!(session.status, CheckoutSessionStatus::Completed);
}

#[tokio::test]
async fn test_paid_session_without_cart_is_flagged() {
    let shop = shop(&[("tee", ProductCategory::Tops, 2500, 5)]).await;
    let provider = FakeProvider::new(PaymentMethod::HostedSession)
        .with_foreign_payment("cs_orphan", Money::from_cents(4200));

    let err = shop
        .finalizer
        .finalize_hosted(&provider, "cs_orphan")
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::NotFound { .. }));
    assert_eq!(shop.db.orders().count().await.unwrap(), 0);

    let reviews = shop.db.reviews().list_for_order("cs_orphan").await.unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].captured_cents, Some(4200));
    assert_eq!(reviews[0].external_payment_id.as_deref(), Some("pay_cs_orphan"));
}

#[tokio::test]
async fn test_unknown_unpaid_session_is_not_flagged() {
    let shop = shop(&[("tee", ProductCategory::Tops, 2500, 5)]).await;
    let provider = FakeProvider::new(PaymentMethod::HostedSession);

    let err = shop
        .finalizer
        .finalize_hosted(&provider, "cs_nobody")
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::NotFound { .. }));
    assert!(shop.db.reviews().list_for_order("cs_nobody").await.unwrap().is_empty());
}

// =============================================================================
// Two-Phase Cart Binding
// =============================================================================

#[tokio::test]
async fn test_capture_with_different_cart_is_rejected() {
    let shop = shop(&[
        ("tee", ProductCategory::Tops, 2500, 5),
        ("cap", ProductCategory::Accessories, 2500, 5),
    ])
    .await;
    let provider = FakeProvider::new(PaymentMethod::TwoPhase);

    let intent = shop
        .checkout
        .create_intent(&provider, payload(&[("tee", 1)], None), None)
        .await
        .unwrap();

    // Same total, different product.
    let err = shop
        .finalizer
        .finalize_two_phase(
            &provider,
            &intent.order_number,
            &intent.provider_ref,
            payload(&[("cap", 1)], None),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::PayloadMismatch { .. }));
    assert_eq!(provider.captures(), 0);
    assert_eq!(shop.db.orders().count().await.unwrap(), 0);
    assert_eq!(stock_of(&shop.db, "tee").await, 5);
    assert_eq!(stock_of(&shop.db, "cap").await, 5);

    // The original cart, modulo normalization, still captures.
    let mut replay = payload(&[("tee", 1)], None);
    replay.customer_email = "  ada@example.com ".into();
    replay.shipping_address.country = "es".into();
    let done = shop
        .finalizer
        .finalize_two_phase(&provider, &intent.order_number, &intent.provider_ref, replay)
        .await
        .unwrap();

    let items = shop.db.orders().get_items(&done.order.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product_id, "tee");
    assert_eq!(stock_of(&shop.db, "tee").await, 4);
    assert_eq!(stock_of(&shop.db, "cap").await, 5);
}
