//! # Cart Model
//!
//! The client-held shopping cart as an explicit value object.
//!
//! ## Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Cart Lifecycle                                 │
//! │                                                                         │
//! │  first interaction ──► Cart::new()                                      │
//! │                            │                                            │
//! │        add / set_quantity / remove  (each rejects without mutating)     │
//! │                            │                                            │
//! │                 to_json() ─┴─► browser / disk ─► from_json()            │
//! │                            │                                            │
//! │            checkout_items() ──► server re-prices from the catalogue     │
//! │                            │                                            │
//! │           order confirmed / logout ──► clear()                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Prices held here are for display only. The server never reads them:
//! [`Cart::checkout_items`] strips them before anything leaves the client.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{CheckoutItem, ProductCategory};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

// =============================================================================
// Cart Line
// =============================================================================

/// One distinct product/size/color selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Derived from product, size and color. Equal selections share a line.
    pub line_id: String,
    pub product_id: String,
    pub name: String,
    /// VAT-inclusive price shown when the line was added.
    pub unit_price: Money,
    pub quantity: i64,
    pub category: ProductCategory,
    pub size: Option<String>,
    pub color: Option<String>,
    /// Last known stock level for this line, if the UI had one.
    pub stock_ceiling: Option<i64>,
}

impl CartLine {
    /// Creates a single-unit line with no variant selected.
    pub fn new(
        product_id: impl Into<String>,
        name: impl Into<String>,
        category: ProductCategory,
        unit_price: Money,
    ) -> Self {
        let product_id = product_id.into();
        CartLine {
            line_id: line_id(&product_id, None, None),
            product_id,
            name: name.into(),
            unit_price,
            quantity: 1,
            category,
            size: None,
            color: None,
            stock_ceiling: None,
        }
    }

    /// Selects a variant, re-deriving the line id.
    pub fn with_variant(mut self, size: Option<&str>, color: Option<&str>) -> Self {
        self.size = size.map(str::to_string);
        self.color = color.map(str::to_string);
        self.line_id = line_id(&self.product_id, size, color);
        self
    }

    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = quantity;
        self
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

/// Deterministic line key for a product/size/color selection.
///
/// ## Example
/// ```rust
/// use storefront_core::cart::line_id;
///
/// assert_eq!(line_id("p1", Some("42"), Some("black")), "p1|42|black");
/// assert_eq!(line_id("p1", None, None), "p1||");
/// ```
pub fn line_id(product_id: &str, size: Option<&str>, color: Option<&str>) -> String {
    format!(
        "{}|{}|{}",
        product_id,
        size.unwrap_or_default(),
        color.unwrap_or_default()
    )
}

// =============================================================================
// Cart
// =============================================================================

/// Ordered collection of cart lines keyed by `line_id`.
///
/// ## Invariants
/// - One line per `line_id` (adding the same selection increases quantity)
/// - `1 <= quantity <= MAX_ITEM_QUANTITY`
/// - `quantity <= stock_ceiling` whenever a ceiling is known
/// - At most `MAX_CART_ITEMS` lines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Creates an empty cart.
    pub fn new() -> Self {
        Cart { lines: Vec::new() }
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn get(&self, line_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.line_id == line_id)
    }

    /// Adds `item` or increases the quantity of the matching line.
    ///
    /// `stock_ceiling` replaces the ceiling stored on the line when given.
    /// On any error the cart is left exactly as it was.
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::cart::{Cart, CartLine};
    /// use storefront_core::money::Money;
    /// use storefront_core::types::ProductCategory;
    ///
    /// let mut cart = Cart::new();
    /// let shoe = CartLine::new("p1", "Runner", ProductCategory::Footwear, Money::from_cents(8999))
    ///     .with_variant(Some("42"), None)
    ///     .with_quantity(2);
    ///
    /// cart.add(shoe.clone(), Some(3)).unwrap();
    /// assert!(cart.add(shoe, Some(3)).is_err()); // 4 > 3
    /// assert_eq!(cart.item_count(), 2);
    /// ```
    pub fn add(&mut self, item: CartLine, stock_ceiling: Option<i64>) -> CoreResult<()> {
        check_quantity(item.quantity)?;
        if item.unit_price.is_negative() {
            return Err(CoreError::invalid_amount("unit price cannot be negative"));
        }

        let line_id = line_id(&item.product_id, item.size.as_deref(), item.color.as_deref());

        if let Some(existing) = self.lines.iter_mut().find(|l| l.line_id == line_id) {
            let new_qty = existing.quantity + item.quantity;
            let ceiling = stock_ceiling.or(existing.stock_ceiling);
            check_ceiling(&line_id, new_qty, ceiling)?;
            check_quantity(new_qty)?;

            existing.quantity = new_qty;
            existing.stock_ceiling = ceiling;
            return Ok(());
        }

        if self.lines.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_ITEMS,
            });
        }

        let ceiling = stock_ceiling.or(item.stock_ceiling);
        check_ceiling(&line_id, item.quantity, ceiling)?;

        self.lines.push(CartLine {
            line_id,
            stock_ceiling: ceiling,
            ..item
        });
        Ok(())
    }

    /// Sets the quantity of a line. `quantity <= 0` removes it.
    pub fn set_quantity(
        &mut self,
        line_id: &str,
        quantity: i64,
        stock_ceiling: Option<i64>,
    ) -> CoreResult<()> {
        if quantity <= 0 {
            return self.remove(line_id).map(|_| ());
        }

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.line_id == line_id)
            .ok_or_else(|| CoreError::LineNotFound(line_id.to_string()))?;

        let ceiling = stock_ceiling.or(line.stock_ceiling);
        check_ceiling(line_id, quantity, ceiling)?;
        check_quantity(quantity)?;

        line.quantity = quantity;
        line.stock_ceiling = ceiling;
        Ok(())
    }

    /// Removes a line and returns it.
    pub fn remove(&mut self, line_id: &str) -> CoreResult<CartLine> {
        let idx = self
            .lines
            .iter()
            .position(|l| l.line_id == line_id)
            .ok_or_else(|| CoreError::LineNotFound(line_id.to_string()))?;
        Ok(self.lines.remove(idx))
    }

    /// Empties the cart unconditionally.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Display total of the lines. Not authoritative.
    pub fn total(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Total units across all lines.
    pub fn item_count(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The price-free request lines sent to quote and checkout.
    pub fn checkout_items(&self) -> Vec<CheckoutItem> {
        self.lines
            .iter()
            .map(|l| CheckoutItem {
                product_id: l.product_id.clone(),
                quantity: l.quantity,
                size: l.size.clone(),
                color: l.color.clone(),
            })
            .collect()
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    pub fn to_json(&self) -> CoreResult<String> {
        serde_json::to_string(self).map_err(|e| cart_format_error(e.to_string()))
    }

    /// Restores a persisted cart, re-checking every invariant.
    ///
    /// Anything stored by an older client that no longer holds is rejected
    /// rather than repaired.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let stored: Cart =
            serde_json::from_str(json).map_err(|e| cart_format_error(e.to_string()))?;

        let mut cart = Cart::new();
        for line in stored.lines {
            let ceiling = line.stock_ceiling;
            cart.add(line, ceiling)?;
        }
        Ok(cart)
    }
}

fn check_quantity(quantity: i64) -> CoreResult<()> {
    if !(1..=MAX_ITEM_QUANTITY).contains(&quantity) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        }
        .into());
    }
    Ok(())
}

fn check_ceiling(line_id: &str, quantity: i64, ceiling: Option<i64>) -> CoreResult<()> {
    match ceiling {
        Some(ceiling) if quantity > ceiling => Err(CoreError::StockCeilingExceeded {
            line_id: line_id.to_string(),
            requested: quantity,
            ceiling,
        }),
        _ => Ok(()),
    }
}

fn cart_format_error(reason: String) -> CoreError {
    ValidationError::InvalidFormat {
        field: "cart".to_string(),
        reason,
    }
    .into()
}

// =============================================================================
// Unit Tests
// =============================================================================
