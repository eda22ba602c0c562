//! # Shipping Engine
//!
//! Computes shipping cost, method and delivery estimate from cart contents
//! and the destination zone.
//!
//! ## Decision Table
//! ```text
//! ┌──────────────┬─────────────────────────────┬─────────┬───────────┐
//! │ Zone         │ Cart contents               │ Cost    │ ETA       │
//! ├──────────────┼─────────────────────────────┼─────────┼───────────┤
//! │ EU           │ contains footwear           │ €10.00  │ 2-7 days  │
//! │ EU           │ clothing only               │  €0.00  │ 2-7 days  │
//! │ US / OTHER   │ clothing + footwear         │ €55.00  │ 2-7 days  │
//! │ US / OTHER   │ footwear only               │ €44.03  │ 2-7 days  │
//! │ US / OTHER   │ clothing only               │ €30.00  │ 2-7 days  │
//! │ CA/AU/ASIA   │ clothing only, qty >= 3     │ €63.00  │ 5-14 days │
//! │ CA/AU/ASIA   │ clothing only, qty < 3      │ €53.00  │ 5-14 days │
//! │ CA/AU/ASIA   │ footwear only               │ €63.00  │ 5-14 days │
//! │ CA/AU/ASIA   │ clothing + footwear         │ €75.00  │ 5-14 days │
//! │ any          │ empty cart                  │  €0.00  │ 0-0 days  │
//! └──────────────┴─────────────────────────────┴─────────┴───────────┘
//! ```
//!
//! "Clothing" is tops, bottoms and accessories. The table is pure and total:
//! an unknown zone string parses to `Other` and is priced like the US.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::ProductCategory;

// =============================================================================
// Zones
// =============================================================================

/// Shipping-rate bucket derived from the destination country.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum ShippingZone {
    Eu,
    Us,
    Ca,
    Au,
    Asia,
    Other,
}

/// EU member states (ISO 3166-1 alpha-2).
const EU_COUNTRIES: [&str; 27] = [
    "AT", "BE", "BG", "HR", "CY", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IE", "IT",
    "LV", "LT", "LU", "MT", "NL", "PL", "PT", "RO", "SK", "SI", "ES", "SE",
];

const ASIA_COUNTRIES: [&str; 12] = [
    "JP", "CN", "HK", "TW", "KR", "SG", "MY", "TH", "ID", "PH", "VN", "IN",
];

impl ShippingZone {
    /// Parses a zone name case-insensitively. Unknown names map to `Other`.
    pub fn parse(zone: &str) -> Self {
        match zone.trim().to_ascii_uppercase().as_str() {
            "EU" => ShippingZone::Eu,
            "US" => ShippingZone::Us,
            "CA" => ShippingZone::Ca,
            "AU" => ShippingZone::Au,
            "ASIA" => ShippingZone::Asia,
            _ => ShippingZone::Other,
        }
    }

    /// Maps a destination country code to its zone.
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::shipping::ShippingZone;
    ///
    /// assert_eq!(ShippingZone::for_country("es"), ShippingZone::Eu);
    /// assert_eq!(ShippingZone::for_country("NZ"), ShippingZone::Au);
    /// assert_eq!(ShippingZone::for_country("GB"), ShippingZone::Other);
    /// ```
    pub fn for_country(country: &str) -> Self {
        let code = country.trim().to_ascii_uppercase();
        let code = code.as_str();

        if EU_COUNTRIES.contains(&code) {
            return ShippingZone::Eu;
        }
        if ASIA_COUNTRIES.contains(&code) {
            return ShippingZone::Asia;
        }
        match code {
            "US" => ShippingZone::Us,
            "CA" => ShippingZone::Ca,
            "AU" | "NZ" => ShippingZone::Au,
            _ => ShippingZone::Other,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            ShippingZone::Eu => "EU",
            ShippingZone::Us => "US",
            ShippingZone::Ca => "CA",
            ShippingZone::Au => "AU",
            ShippingZone::Asia => "ASIA",
            ShippingZone::Other => "OTHER",
        }
    }

    const fn is_long_haul(&self) -> bool {
        matches!(self, ShippingZone::Ca | ShippingZone::Au | ShippingZone::Asia)
    }
}

// =============================================================================
// Quote
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ShippingMethod {
    /// EU delivery, clothing only.
    EuFree,
    /// EU delivery with footwear in the parcel.
    EuStandard,
    /// US and everything outside the named buckets.
    International,
    /// CA, AU and ASIA.
    LongHaul,
    /// Nothing to ship.
    None,
}

impl ShippingMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ShippingMethod::EuFree => "eu_free",
            ShippingMethod::EuStandard => "eu_standard",
            ShippingMethod::International => "international",
            ShippingMethod::LongHaul => "long_haul",
            ShippingMethod::None => "none",
        }
    }
}

/// Delivery estimate in days, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeliveryEstimate {
    pub min: u32,
    pub max: u32,
}

const SHORT: DeliveryEstimate = DeliveryEstimate { min: 2, max: 7 };
const LONG: DeliveryEstimate = DeliveryEstimate { min: 5, max: 14 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ShippingQuote {
    pub cost: Money,
    pub method: ShippingMethod,
    pub estimated_days: DeliveryEstimate,
}

/// One shippable line: only category and quantity matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippableItem {
    pub category: ProductCategory,
    pub quantity: i64,
}

/// Prices shipping for `items` to `zone`.
///
/// Lines with a non-positive quantity are ignored.
///
/// ## Example
/// ```rust
/// use storefront_core::shipping::{quote, ShippableItem, ShippingZone};
/// use storefront_core::types::ProductCategory;
///
/// let items = [
///     ShippableItem { category: ProductCategory::Tops, quantity: 1 },
///     ShippableItem { category: ProductCategory::Footwear, quantity: 1 },
/// ];
/// assert_eq!(quote(&items, ShippingZone::Us).cost.cents(), 5500);
/// ```
pub fn quote(items: &[ShippableItem], zone: ShippingZone) -> ShippingQuote {
    let (clothing_qty, footwear_qty) =
        items
            .iter()
            .filter(|i| i.quantity > 0)
            .fold((0i64, 0i64), |(clothing, footwear), item| {
                if item.category.is_footwear() {
                    (clothing, footwear + item.quantity)
                } else {
                    (clothing + item.quantity, footwear)
                }
            });

    let has_clothing = clothing_qty > 0;
    let has_footwear = footwear_qty > 0;

    if !has_clothing && !has_footwear {
        return ShippingQuote {
            cost: Money::zero(),
            method: ShippingMethod::None,
            estimated_days: DeliveryEstimate { min: 0, max: 0 },
        };
    }

    let (cents, method, eta) = match zone {
        ShippingZone::Eu if has_footwear => (1000, ShippingMethod::EuStandard, SHORT),
        ShippingZone::Eu => (0, ShippingMethod::EuFree, SHORT),
        z if z.is_long_haul() => {
            let cents = match (has_clothing, has_footwear) {
                (true, true) => 7500,
                (false, true) => 6300,
                _ if clothing_qty >= 3 => 6300,
                _ => 5300,
            };
            (cents, ShippingMethod::LongHaul, LONG)
        }
        _ => {
            let cents = match (has_clothing, has_footwear) {
                (true, true) => 5500,
                (false, true) => 4403,
                _ => 3000,
            };
            (cents, ShippingMethod::International, SHORT)
        }
    };

    ShippingQuote {
        cost: Money::from_cents(cents),
        method,
        estimated_days: eta,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
