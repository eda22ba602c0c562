//! # Domain Types
//!
//! Core domain types used throughout the storefront checkout.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │  DiscountCode   │   │ CheckoutSession │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  code (UPPER)   │   │  order_number   │       │
//! │  │  category       │   │  kind / value   │   │  payload (JSON) │       │
//! │  │  price_cents    │   │  usage_limit    │   │  provider_ref   │       │
//! │  │  stock_quantity │   │  used_count     │   │  expires_at     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Order       │   │   OrderItem     │   │ PaymentReview   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  order_number   │──►│  name_snapshot  │   │  reason         │       │
//! │  │  total_cents    │   │  unit_price     │   │  expected_cents │       │
//! │  │  payment_intent │   │  size / color   │   │  captured_cents │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! Order items copy name, price, size and color out of the product at the
//! moment of payment. Editing or deleting the product later never changes
//! a paid order.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 2100 bps = 21%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

// =============================================================================
// Product
// =============================================================================

/// Catalogue category. Shipping treats footwear apart from everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ProductCategory {
    Tops,
    Bottoms,
    Footwear,
    Accessories,
}

impl ProductCategory {
    /// True for footwear, false for the clothing categories.
    #[inline]
    pub const fn is_footwear(&self) -> bool {
        matches!(self, ProductCategory::Footwear)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Tops => "tops",
            ProductCategory::Bottoms => "bottoms",
            ProductCategory::Footwear => "footwear",
            ProductCategory::Accessories => "accessories",
        }
    }
}

/// A product in the catalogue, including its inventory level.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name, copied onto order items at payment time.
    pub name: String,

    pub description: Option<String>,

    pub category: ProductCategory,

    /// VAT-inclusive unit price in cents.
    pub price_cents: i64,

    /// Units on hand. Never negative.
    pub stock_quantity: i64,

    /// Cleared when the last unit sells.
    pub in_stock: bool,

    /// Soft delete flag. Inactive products cannot be priced.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks whether `quantity` units can currently be sold.
    pub fn can_fulfil(&self, quantity: i64) -> bool {
        self.is_active && self.in_stock && self.stock_quantity >= quantity
    }
}

// =============================================================================
// Discount Code
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    /// `value` is in basis points of the subtotal (1000 = 10%).
    Percentage,
    /// `value` is a fixed amount in cents.
    Fixed,
}

/// A discount code as stored.
///
/// `code` is always upper-cased at rest, so lookups upper-case their input.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCode {
    pub code: String,
    pub kind: DiscountKind,
    pub value: i64,
    pub min_purchase_cents: Option<i64>,
    /// Cap for percentage codes.
    pub max_discount_cents: Option<i64>,
    pub usage_limit: Option<i64>,
    pub used_count: i64,
    #[ts(as = "Option<String>")]
    pub valid_from: Option<DateTime<Utc>>,
    /// Inclusive through the end of this UTC day.
    #[ts(as = "Option<String>")]
    pub valid_until: Option<NaiveDate>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Checkout Request Types
// =============================================================================

/// A price-free cart line as sent by the client.
///
/// Prices are deliberately absent: every price is re-read from the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Destination for physical delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Everything needed to re-price and persist an order.
///
/// Stored with the checkout session (hosted) or replayed by the client
/// (two-phase), and re-validated identically in both cases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPayload {
    pub items: Vec<CheckoutItem>,
    pub shipping_address: ShippingAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_code: Option<String>,
    pub customer_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Provider-hosted payment page, finalized by webhook or return URL.
    HostedSession,
    /// Authorize up front, client-initiated capture after approval.
    TwoPhase,
}

impl PaymentMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::HostedSession => "hosted_session",
            PaymentMethod::TwoPhase => "two_phase",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Checkout Session
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutSessionStatus {
    Pending,
    Completed,
    /// TTL passed without an order. Kept so the order number stays taken
    /// and a late hosted payment can still be matched.
    Expired,
}

/// Server-side record of a created payment intent.
///
/// The primary key is the order number, so a number is never handed out
/// twice even when the payment is abandoned.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub order_number: String,
    pub payment_method: PaymentMethod,
    pub provider_ref: Option<String>,
    /// JSON-encoded [`CheckoutPayload`].
    pub payload: String,
    pub quoted_total_cents: i64,
    pub currency: String,
    pub status: CheckoutSessionStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub expires_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl CheckoutSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            CheckoutSessionStatus::Pending => now >= self.expires_at,
            CheckoutSessionStatus::Expired => true,
            CheckoutSessionStatus::Completed => false,
        }
    }
}

// =============================================================================
// Order
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Funds captured and order persisted. Orders are only written once paid.
    Paid,
}

/// A paid order. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    /// Human-shareable, URL-safe, unique.
    pub order_number: String,
    pub status: OrderStatus,
    pub currency: String,
    pub customer_email: String,
    pub user_id: Option<String>,
    pub subtotal_cents: i64,
    pub shipping_cents: i64,
    /// VAT contained in the subtotal (informational).
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub discount_code: Option<String>,
    pub shipping_method: String,
    /// JSON-encoded [`ShippingAddress`].
    pub shipping_address: String,
    pub payment_method: PaymentMethod,
    /// External payment id reported by the provider. Unique.
    pub payment_intent_id: String,
    /// Provider reference returned at intent creation (session/order id).
    pub provider_ref: Option<String>,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line item in an order, frozen at payment time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    /// Not a foreign key: the product may be deleted later.
    pub product_id: String,
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub size: Option<String>,
    pub color: Option<String>,
    pub category: ProductCategory,
    pub line_total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Payment Review
// =============================================================================

/// A captured payment that could not be turned into an order cleanly.
/// Someone has to reconcile it by hand.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReview {
    pub id: String,
    pub order_number: String,
    pub payment_method: PaymentMethod,
    pub external_payment_id: Option<String>,
    pub reason: String,
    pub expected_cents: Option<i64>,
    pub captured_cents: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_expiry_by_status() {
        let now = Utc::now();
        let mut session = CheckoutSession {
            order_number: "SF-1".into(),
            payment_method: PaymentMethod::TwoPhase,
            provider_ref: None,
            payload: "{}".into(),
            quoted_total_cents: 100,
            currency: "EUR".into(),
            status: CheckoutSessionStatus::Pending,
            created_at: now,
            expires_at: now + chrono::Duration::hours(1),
            completed_at: None,
        };
        assert!(!session.is_expired(now));

        session.status = CheckoutSessionStatus::Expired;
        assert!(session.is_expired(now));

        session.status = CheckoutSessionStatus::Completed;
        assert!(!session.is_expired(now + chrono::Duration::hours(2)));
    }

    #[test]
    fn test_tax_rate_from_bps() {
        let rate = TaxRate::from_bps(2100);
        assert_eq!(rate.bps(), 2100);
        assert!((rate.percentage() - 21.0).abs() < 0.001);
    }

    #[test]
    fn test_category_serde_lowercase() {
        let json = serde_json::to_string(&ProductCategory::Footwear).unwrap();
        assert_eq!(json, "\"footwear\"");
        assert!(ProductCategory::Footwear.is_footwear());
        assert!(!ProductCategory::Accessories.is_footwear());
    }

    #[test]
    fn test_payload_accepts_camel_case() {
        let payload: CheckoutPayload = serde_json::from_str(
            r#"{
                "items": [{"productId": "p1", "quantity": 2, "size": "M"}],
                "shippingAddress": {
                    "fullName": "Ada Lovelace",
                    "line1": "Calle Mayor 1",
                    "city": "Madrid",
                    "postalCode": "28013",
                    "country": "ES"
                },
                "customerEmail": "ada@example.com"
            }"#,
        )
        .unwrap();

        assert_eq!(payload.items[0].product_id, "p1");
        assert_eq!(payload.items[0].size.as_deref(), Some("M"));
        assert!(payload.items[0].color.is_none());
        assert!(payload.discount_code.is_none());
    }

    #[test]
    fn test_product_can_fulfil() {
        let now = Utc::now();
        let product = Product {
            id: "p1".into(),
            name: "Runner".into(),
            description: None,
            category: ProductCategory::Footwear,
            price_cents: 8999,
            stock_quantity: 2,
            in_stock: true,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert!(product.can_fulfil(2));
        assert!(!product.can_fulfil(3));

        let retired = Product {
            is_active: false,
            ..product
        };
        assert!(!retired.can_fulfil(1));
    }
}
