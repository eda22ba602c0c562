//! Order reads and health.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use storefront_core::{Order, OrderItem, OrderStatus, PaymentMethod};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// What anyone holding an order number may see: totals and line snapshots.
/// Contact details, the address and payment identifiers are left out.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReceipt {
    pub order_number: String,
    pub status: OrderStatus,
    pub currency: String,
    pub subtotal_cents: i64,
    pub shipping_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub discount_code: Option<String>,
    pub shipping_method: String,
    pub payment_method: PaymentMethod,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<ReceiptLine>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLine {
    pub product_id: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub size: Option<String>,
    pub color: Option<String>,
    pub line_total_cents: i64,
}

impl From<OrderItem> for ReceiptLine {
    fn from(item: OrderItem) -> Self {
        ReceiptLine {
            product_id: item.product_id,
            name: item.name_snapshot,
            unit_price_cents: item.unit_price_cents,
            quantity: item.quantity,
            size: item.size,
            color: item.color,
            line_total_cents: item.line_total_cents,
        }
    }
}

impl OrderReceipt {
    fn new(order: Order, items: Vec<OrderItem>) -> Self {
        OrderReceipt {
            order_number: order.order_number,
            status: order.status,
            currency: order.currency,
            subtotal_cents: order.subtotal_cents,
            shipping_cents: order.shipping_cents,
            tax_cents: order.tax_cents,
            discount_cents: order.discount_cents,
            total_cents: order.total_cents,
            discount_code: order.discount_code,
            shipping_method: order.shipping_method,
            payment_method: order.payment_method,
            paid_at: order.paid_at,
            created_at: order.created_at,
            items: items.into_iter().map(ReceiptLine::from).collect(),
        }
    }
}

/// `GET /api/orders/{order_number}`
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> ApiResult<Json<OrderReceipt>> {
    let orders = state.db.orders();
    let order = orders
        .find_by_order_number(&order_number)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("order {}", order_number)))?;
    let items = orders.get_items(&order.id).await?;
    Ok(Json(OrderReceipt::new(order, items)))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    if state.db.health_check().await {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "database unavailable")
    }
}
