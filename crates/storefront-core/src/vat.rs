//! # VAT Engine
//!
//! Extracts VAT from VAT-inclusive prices.
//!
//! The merchant sells from a single jurisdiction, so the rate is a fixed 21%
//! whatever the destination. Prices in the catalogue already contain VAT; tax
//! is taken *out* of a price by division, never added on top.
//!
//! ```text
//! price (incl.)  = €121.00
//!        │
//!        ▼  ÷ 1.21
//! ex-VAT         = €100.00
//! VAT            = €121.00 − €100.00 = €21.00
//! ```

use serde::Serialize;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::TaxRate;

/// The one VAT rate applied to every sale: 21%.
pub const VAT_RATE: TaxRate = TaxRate::from_bps(2100);

/// Result of splitting a VAT-inclusive amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct VatBreakdown {
    pub rate: TaxRate,
    pub vat_amount: Money,
    pub ex_vat_amount: Money,
}

/// Splits a VAT-inclusive price into VAT and ex-VAT parts.
///
/// `ex_vat_amount + vat_amount` always equals the input exactly; the
/// rounding cent lands on the ex-VAT side first.
///
/// ## Errors
/// `InvalidAmount` for negative input.
///
/// ## Example
/// ```rust
/// use storefront_core::money::Money;
/// use storefront_core::vat::extract_vat;
///
/// let b = extract_vat(Money::from_cents(4999)).unwrap();
/// assert_eq!(b.ex_vat_amount.cents() + b.vat_amount.cents(), 4999);
/// ```
pub fn extract_vat(vat_inclusive: Money) -> CoreResult<VatBreakdown> {
    if vat_inclusive.is_negative() {
        return Err(CoreError::invalid_amount(format!(
            "VAT-inclusive price cannot be negative: {}",
            vat_inclusive
        )));
    }

    let (ex_vat_amount, vat_amount) = vat_inclusive.extract_inclusive_tax(VAT_RATE);

    Ok(VatBreakdown {
        rate: VAT_RATE,
        vat_amount,
        ex_vat_amount,
    })
}

/// Float entry point for amounts that arrive as JSON numbers.
///
/// Non-finite and negative values fail with `InvalidAmount`.
pub fn extract_vat_major(vat_inclusive: f64) -> CoreResult<VatBreakdown> {
    extract_vat(Money::try_from_major(vat_inclusive)?)
}
