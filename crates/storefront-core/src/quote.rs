//! # Price Quote
//!
//! Assembles the authoritative price of a cart from its parts.
//!
//! ```text
//! subtotal (VAT-inclusive) ──┬──► VAT breakdown (informational)
//!                            │
//!                            ├──► − discount   (subtotal only, never shipping)
//!                            │
//!           shipping cost ───┴──► grand total = subtotal + shipping − discount
//!                                               must be > 0 to pay
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::discount::AppliedDiscount;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::shipping::{DeliveryEstimate, ShippingMethod, ShippingQuote};
use crate::vat::extract_vat;
use crate::DEFAULT_CURRENCY;

/// The server's price for a cart. Ephemeral: never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub currency: String,
    pub subtotal: Money,
    pub vat_amount: Money,
    pub vat_exclusive_subtotal: Money,
    pub shipping_cost: Money,
    pub shipping_method: ShippingMethod,
    pub estimated_days: DeliveryEstimate,
    pub discount_amount: Money,
    pub discount_code: Option<String>,
    pub grand_total: Money,
}

impl PriceQuote {
    /// Builds a quote, failing with `NonPositiveTotal` when nothing is payable.
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::money::Money;
    /// use storefront_core::quote::PriceQuote;
    /// use storefront_core::shipping::{quote, ShippableItem, ShippingZone};
    /// use storefront_core::types::ProductCategory;
    ///
    /// let items = [ShippableItem { category: ProductCategory::Tops, quantity: 1 }];
    /// let shipping = quote(&items, ShippingZone::Us);
    /// let q = PriceQuote::assemble(Money::from_cents(12100), shipping, None).unwrap();
    ///
    /// assert_eq!(q.vat_amount.cents(), 2100);
    /// assert_eq!(q.grand_total.cents(), 15100);
    /// ```
    pub fn assemble(
        subtotal: Money,
        shipping: ShippingQuote,
        discount: Option<&AppliedDiscount>,
    ) -> CoreResult<Self> {
        let vat = extract_vat(subtotal)?;

        let discount_amount = discount
            .map(|d| d.discount_amount)
            .unwrap_or_default();
        let grand_total = subtotal + shipping.cost - discount_amount;

        if !grand_total.is_positive() {
            return Err(CoreError::NonPositiveTotal { total: grand_total });
        }

        Ok(PriceQuote {
            currency: DEFAULT_CURRENCY.to_string(),
            subtotal,
            vat_amount: vat.vat_amount,
            vat_exclusive_subtotal: vat.ex_vat_amount,
            shipping_cost: shipping.cost,
            shipping_method: shipping.method,
            estimated_days: shipping.estimated_days,
            discount_amount,
            discount_code: discount.map(|d| d.code.clone()),
            grand_total,
        })
    }
}
