//! # storefront-core: Pure Checkout Pricing Logic
//!
//! This crate is the **heart** of the storefront checkout. It contains the
//! money math and pricing rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Storefront Checkout Architecture                    │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Cart UI (client-held Cart)                   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP (storefront-api)                  │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │     storefront-checkout: PricingPipeline, PaymentAdapter,       │   │
//! │  │                          OrderFinalizer                          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ storefront-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │  ┌────────┐ ┌──────────┐ ┌──────────┐ ┌────────┐ ┌──────────┐  │   │
//! │  │  │ money  │ │   vat    │ │ shipping │ │discount│ │  cart    │  │   │
//! │  │  │ Money  │ │ 21% incl │ │ zones    │ │ rules  │ │  lines   │  │   │
//! │  │  └────────┘ └──────────┘ └──────────┘ └────────┘ └──────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`vat`] - VAT extraction from VAT-inclusive prices
//! - [`shipping`] - Zone table and the shipping decision table
//! - [`discount`] - Discount code eligibility and amount rules
//! - [`cart`] - Client-held cart value object
//! - [`quote`] - Price quote assembly
//! - [`types`] - Domain types (Product, Order, DiscountCode, ...)
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use storefront_core::money::Money;
//! use storefront_core::vat::extract_vat;
//!
//! // €121.00 VAT-inclusive contains €21.00 of VAT at 21%
//! let breakdown = extract_vat(Money::from_cents(12100)).unwrap();
//! assert_eq!(breakdown.vat_amount.cents(), 2100);
//! assert_eq!(breakdown.ex_vat_amount.cents(), 10000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod discount;
pub mod error;
pub mod money;
pub mod quote;
pub mod shipping;
pub mod types;
pub mod validation;
pub mod vat;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine};
pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use quote::PriceQuote;
pub use shipping::{ShippingMethod, ShippingQuote, ShippingZone};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Currency every price in the catalogue is expressed in.
///
/// The merchant sells from a single VAT jurisdiction, so there is exactly one
/// settlement currency.
pub const DEFAULT_CURRENCY: &str = "EUR";

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line in a cart.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;
