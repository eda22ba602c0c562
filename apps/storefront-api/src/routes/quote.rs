//! Cart pricing and discount lookups.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use storefront_core::discount::normalize_code;
use storefront_core::{CheckoutItem, Money, PriceQuote, ShippingZone};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub items: Vec<CheckoutItem>,
    /// Zone code (`EU`, `US`, ...). Unknown values price as `OTHER`.
    #[serde(default)]
    pub zone: Option<String>,
    /// Alternative to `zone`: derive it from an ISO country code.
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub discount_code: Option<String>,
}

impl QuoteRequest {
    fn zone(&self) -> ApiResult<ShippingZone> {
        match (&self.zone, &self.country) {
            (Some(zone), _) => Ok(ShippingZone::parse(zone)),
            (None, Some(country)) => Ok(ShippingZone::for_country(country)),
            (None, None) => Err(ApiError::BadRequest("zone or country is required".into())),
        }
    }
}

/// `POST /api/quote`
pub async fn quote(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> ApiResult<Json<PriceQuote>> {
    let zone = request.zone()?;
    let priced = state
        .pricing
        .price(&request.items, zone, request.discount_code.as_deref())
        .await?;
    Ok(Json(priced.quote))
}

#[derive(Debug, Deserialize)]
pub struct DiscountRequest {
    pub code: String,
    /// Cart subtotal in cents.
    pub subtotal: Money,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discounted_subtotal: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

/// `POST /api/discounts/validate`
///
/// Business-rule rejections are a 200 with `valid: false`.
pub async fn validate_discount(
    State(state): State<AppState>,
    Json(request): Json<DiscountRequest>,
) -> ApiResult<Json<DiscountResponse>> {
    if normalize_code(&request.code).is_empty() {
        return Err(ApiError::BadRequest("code is required".into()));
    }
    if request.subtotal.is_negative() {
        return Err(ApiError::BadRequest("subtotal must not be negative".into()));
    }

    let response = match state.discounts.validate(&request.code, request.subtotal).await? {
        Ok(applied) => DiscountResponse {
            valid: true,
            code: Some(applied.code),
            discount_amount: Some(applied.discount_amount),
            discounted_subtotal: Some(applied.discounted_subtotal),
            ..Default::default()
        },
        Err(rejection) => DiscountResponse {
            valid: false,
            error: Some(rejection.to_string()),
            reason: Some(rejection.code()),
            ..Default::default()
        },
    };
    Ok(Json(response))
}
