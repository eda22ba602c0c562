//! # Pricing Pipeline
//!
//! Re-derives the price of a cart from the catalogue. Client-side numbers
//! never enter this computation.
//!
//! ## Steps
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        price(items, zone, code)                         │
//! │                                                                         │
//! │  1. catalogue lookup per line ── gone / inactive / short ──► Stale     │
//! │  2. subtotal = Σ authoritative unit price × quantity                   │
//! │  3. shipping  = shipping::quote(categories, zone)                      │
//! │  4. VAT       = extract_vat(subtotal)           (inside assemble)      │
//! │  5. discount  = DiscountValidator(code, subtotal) ── rejected ──► 422  │
//! │  6. grand total = subtotal + shipping − discount ── ≤ 0 ──► 422        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Runs before every intent creation and again before every capture.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use storefront_core::discount::AppliedDiscount;
use storefront_core::shipping::{self, ShippableItem};
use storefront_core::validation::validate_items;
use storefront_core::{CheckoutItem, Money, PriceQuote, ProductCategory, ShippingZone};
use storefront_db::{Database, NewOrderItem};

use crate::discount::DiscountValidator;
use crate::error::{CheckoutError, CheckoutResult};

/// One cart line priced from the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedLine {
    pub product_id: String,
    pub name: String,
    pub category: ProductCategory,
    pub unit_price: Money,
    pub quantity: i64,
    pub size: Option<String>,
    pub color: Option<String>,
    pub line_total: Money,
}

impl PricedLine {
    /// Freezes this line into an order item snapshot.
    pub fn to_order_item(&self) -> NewOrderItem {
        NewOrderItem {
            product_id: self.product_id.clone(),
            name_snapshot: self.name.clone(),
            unit_price_cents: self.unit_price.cents(),
            quantity: self.quantity,
            size: self.size.clone(),
            color: self.color.clone(),
            category: self.category,
        }
    }
}

/// A quote together with the lines and discount it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedCart {
    pub quote: PriceQuote,
    pub lines: Vec<PricedLine>,
    #[serde(skip)]
    pub discount: Option<AppliedDiscount>,
}

#[derive(Debug, Clone)]
pub struct PricingPipeline {
    db: Database,
    discounts: DiscountValidator,
}

impl PricingPipeline {
    pub fn new(db: Database) -> Self {
        PricingPipeline {
            discounts: DiscountValidator::new(db.clone()),
            db,
        }
    }

    /// Prices `items` for delivery to `zone` now.
    pub async fn price(
        &self,
        items: &[CheckoutItem],
        zone: ShippingZone,
        discount_code: Option<&str>,
    ) -> CheckoutResult<PricedCart> {
        self.price_at(items, zone, discount_code, Utc::now()).await
    }

    /// Prices `items` with an explicit clock for the discount window.
    pub async fn price_at(
        &self,
        items: &[CheckoutItem],
        zone: ShippingZone,
        discount_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> CheckoutResult<PricedCart> {
        validate_items(items)?;

        // 1-2. Authoritative prices and stock
        let lines = self.load_lines(items).await?;
        let subtotal: Money = lines.iter().map(|l| l.line_total).sum();

        // 3. Shipping
        let shippable: Vec<ShippableItem> = lines
            .iter()
            .map(|l| ShippableItem {
                category: l.category,
                quantity: l.quantity,
            })
            .collect();
        let shipping = shipping::quote(&shippable, zone);

        // 5. Discount (subtotal only)
        let discount = match discount_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => Some(
                self.discounts
                    .validate_at(code, subtotal, now)
                    .await?
                    .map_err(CheckoutError::DiscountInvalid)?,
            ),
            None => None,
        };

        // 4 + 6. VAT breakdown and grand total
        let quote = PriceQuote::assemble(subtotal, shipping, discount.as_ref())?;

        debug!(
            zone = zone.as_str(),
            lines = lines.len(),
            subtotal = %quote.subtotal,
            shipping = %quote.shipping_cost,
            discount = %quote.discount_amount,
            grand_total = %quote.grand_total,
            "Cart priced"
        );

        Ok(PricedCart {
            quote,
            lines,
            discount,
        })
    }

    async fn load_lines(&self, items: &[CheckoutItem]) -> CheckoutResult<Vec<PricedLine>> {
        let products = self.db.products();
        let mut lines = Vec::with_capacity(items.len());
        // Several lines (sizes, colors) can draw on the same product's stock.
        let mut requested: HashMap<&str, i64> = HashMap::new();

        for item in items {
            let product = products
                .get_by_id(&item.product_id)
                .await?
                .ok_or_else(|| CheckoutError::stale(&item.product_id, "not found"))?;

            if !product.is_active {
                return Err(CheckoutError::stale(&product.id, "no longer sold"));
            }
            if !product.in_stock || product.stock_quantity <= 0 {
                return Err(CheckoutError::stale(&product.id, "out of stock"));
            }

            let total = requested.entry(item.product_id.as_str()).or_insert(0);
            *total += item.quantity;
            if *total > product.stock_quantity {
                return Err(CheckoutError::stale(
                    &product.id,
                    format!(
                        "only {} available, {} requested",
                        product.stock_quantity, total
                    ),
                ));
            }

            let unit_price = product.price();
            lines.push(PricedLine {
                product_id: product.id,
                name: product.name,
                category: product.category,
                unit_price,
                quantity: item.quantity,
                size: item.size.clone(),
                color: item.color.clone(),
                line_total: unit_price.multiply_quantity(item.quantity),
            });
        }

        Ok(lines)
    }
}
