//! # Order Repository
//!
//! Reads of paid orders and the single write that creates one.
//!
//! ## create_paid_order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 One Transaction, All Or Nothing                         │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    │                                                                    │
//! │    ├── 1. order already bound to this external payment id?              │
//! │    │        yes ──► ROLLBACK, return AlreadyExists(order)               │
//! │    │                                                                    │
//! │    ├── 2. INSERT order           (payment_intent_id UNIQUE)             │
//! │    │        unique violation ──► ROLLBACK, reload, AlreadyExists        │
//! │    │                                                                    │
//! │    ├── 3. INSERT order_items     (snapshots)                            │
//! │    │                                                                    │
//! │    ├── 4. UPDATE products SET stock_quantity = stock_quantity - n       │
//! │    │        WHERE stock_quantity >= n                                   │
//! │    │        0 rows ──► ROLLBACK, InsufficientStock                      │
//! │    │                                                                    │
//! │    ├── 5. UPDATE discount_codes SET used_count = used_count + 1         │
//! │    │        WHERE usage_limit IS NULL OR used_count < usage_limit       │
//! │    │        0 rows ──► ROLLBACK, DiscountExhausted                      │
//! │    │                                                                    │
//! │    └── 6. mark checkout session completed                               │
//! │  COMMIT ──► Created(order)                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every statement inside the transaction runs on the transaction's own
//! connection; the pool is only touched again after commit or rollback.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use storefront_core::{Order, OrderItem, OrderStatus, PaymentMethod, ProductCategory};

const ORDER_COLUMNS: &str = "id, order_number, status, currency, customer_email, user_id, \
                             subtotal_cents, shipping_cents, tax_cents, discount_cents, \
                             total_cents, discount_code, shipping_method, shipping_address, \
                             payment_method, payment_intent_id, provider_ref, paid_at, created_at";

// =============================================================================
// Input Types
// =============================================================================

/// A priced line ready to be frozen into an order item.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: String,
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub size: Option<String>,
    pub color: Option<String>,
    pub category: ProductCategory,
}

/// Everything needed to write a paid order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub currency: String,
    pub customer_email: String,
    pub user_id: Option<String>,
    pub subtotal_cents: i64,
    pub shipping_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub discount_code: Option<String>,
    pub shipping_method: String,
    /// JSON-encoded shipping address.
    pub shipping_address: String,
    pub payment_method: PaymentMethod,
    /// Idempotency key.
    pub external_payment_id: String,
    pub provider_ref: Option<String>,
    pub items: Vec<NewOrderItem>,
}

/// Result of [`OrderRepository::create_paid_order`].
#[derive(Debug, Clone)]
pub enum PersistOutcome {
    /// This call wrote the order, its items, and the stock/discount effects.
    Created(Order),
    /// An order already existed for the external payment id; nothing was written.
    AlreadyExists(Order),
}

impl PersistOutcome {
    pub fn order(&self) -> &Order {
        match self {
            PersistOutcome::Created(order) | PersistOutcome::AlreadyExists(order) => order,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            PersistOutcome::Created(order) | PersistOutcome::AlreadyExists(order) => order,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, PersistOutcome::Created(_))
    }
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    pub async fn find_by_external_payment_id(&self, external_id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE payment_intent_id = ?1",
            ORDER_COLUMNS
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Looks up an order by the reference returned at intent creation.
    pub async fn find_by_provider_ref(&self, provider_ref: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE provider_ref = ?1",
            ORDER_COLUMNS
        ))
        .bind(provider_ref)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    pub async fn find_by_order_number(&self, order_number: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE order_number = ?1",
            ORDER_COLUMNS
        ))
        .bind(order_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Gets the item snapshots of an order.
    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, product_id, name_snapshot, unit_price_cents, quantity,
                   size, color, category, line_total_cents, created_at
            FROM order_items
            WHERE order_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Atomically writes a paid order and its side effects, exactly once per
    /// external payment id.
    ///
    /// ## Errors
    /// - `InsufficientStock` - a line could not be decremented; nothing written
    /// - `DiscountExhausted` - the code ran out of uses; nothing written
    /// - `TransactionFailed` / `ConnectionFailed` / ... - transient, retry with
    ///   the same `NewOrder`
    pub async fn create_paid_order(&self, new: &NewOrder) -> DbResult<PersistOutcome> {
        debug!(
            order_number = %new.order_number,
            external_payment_id = %new.external_payment_id,
            lines = new.items.len(),
            "Persisting paid order"
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        // 1. Explicit idempotency check
        if let Some(existing) = find_by_external_id_tx(&mut tx, &new.external_payment_id).await? {
            rollback(tx).await;
            debug!(
                order_number = %existing.order_number,
                "Order already exists for external payment"
            );
            return Ok(PersistOutcome::AlreadyExists(existing));
        }

        let now = Utc::now();
        let order = build_order(new, now);

        // 2. Order row
        if let Err(err) = insert_order(&mut tx, &order).await {
            rollback(tx).await;
            return match err {
                // A concurrent attempt for the same payment committed first.
                DbError::UniqueViolation { ref field, .. } if field.contains("payment_intent_id") => {
                    let existing = self
                        .find_by_external_payment_id(&new.external_payment_id)
                        .await?
                        .ok_or(err)?;
                    Ok(PersistOutcome::AlreadyExists(existing))
                }
                other => Err(other),
            };
        }

        // 3-5. Items, stock, discount
        if let Err(err) = apply_effects(&mut tx, &order, new, now).await {
            rollback(tx).await;
            return Err(err);
        }

        // 6. Session bookkeeping (absent for replayed two-phase payloads is fine)
        if let Err(err) = complete_session(&mut tx, &new.order_number, now).await {
            rollback(tx).await;
            return Err(err);
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            order_number = %order.order_number,
            external_payment_id = %order.payment_intent_id,
            total_cents = order.total_cents,
            "Order persisted"
        );

        Ok(PersistOutcome::Created(order))
    }
}

// =============================================================================
// Transaction Steps
// =============================================================================

fn build_order(new: &NewOrder, now: DateTime<Utc>) -> Order {
    Order {
        id: Uuid::new_v4().to_string(),
        order_number: new.order_number.clone(),
        status: OrderStatus::Paid,
        currency: new.currency.clone(),
        customer_email: new.customer_email.clone(),
        user_id: new.user_id.clone(),
        subtotal_cents: new.subtotal_cents,
        shipping_cents: new.shipping_cents,
        tax_cents: new.tax_cents,
        discount_cents: new.discount_cents,
        total_cents: new.total_cents,
        discount_code: new.discount_code.clone(),
        shipping_method: new.shipping_method.clone(),
        shipping_address: new.shipping_address.clone(),
        payment_method: new.payment_method,
        payment_intent_id: new.external_payment_id.clone(),
        provider_ref: new.provider_ref.clone(),
        paid_at: Some(now),
        created_at: now,
    }
}

async fn rollback(tx: Transaction<'_, Sqlite>) {
    if let Err(e) = tx.rollback().await {
        warn!(error = %e, "Rollback failed");
    }
}

async fn find_by_external_id_tx(
    tx: &mut Transaction<'_, Sqlite>,
    external_id: &str,
) -> DbResult<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "SELECT {} FROM orders WHERE payment_intent_id = ?1",
        ORDER_COLUMNS
    ))
    .bind(external_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(order)
}

async fn insert_order(tx: &mut Transaction<'_, Sqlite>, order: &Order) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (
            id, order_number, status, currency, customer_email, user_id,
            subtotal_cents, shipping_cents, tax_cents, discount_cents, total_cents,
            discount_code, shipping_method, shipping_address,
            payment_method, payment_intent_id, provider_ref, paid_at, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
        "#,
    )
    .bind(&order.id)
    .bind(&order.order_number)
    .bind(order.status)
    .bind(&order.currency)
    .bind(&order.customer_email)
    .bind(&order.user_id)
    .bind(order.subtotal_cents)
    .bind(order.shipping_cents)
    .bind(order.tax_cents)
    .bind(order.discount_cents)
    .bind(order.total_cents)
    .bind(&order.discount_code)
    .bind(&order.shipping_method)
    .bind(&order.shipping_address)
    .bind(order.payment_method)
    .bind(&order.payment_intent_id)
    .bind(&order.provider_ref)
    .bind(order.paid_at)
    .bind(order.created_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn apply_effects(
    tx: &mut Transaction<'_, Sqlite>,
    order: &Order,
    new: &NewOrder,
    now: DateTime<Utc>,
) -> DbResult<()> {
    for item in &new.items {
        sqlx::query(
            r#"
            INSERT INTO order_items (
                id, order_id, product_id, name_snapshot, unit_price_cents, quantity,
                size, color, category, line_total_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&order.id)
        .bind(&item.product_id)
        .bind(&item.name_snapshot)
        .bind(item.unit_price_cents)
        .bind(item.quantity)
        .bind(&item.size)
        .bind(&item.color)
        .bind(item.category)
        .bind(item.unit_price_cents * item.quantity)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        decrement_stock(tx, &item.product_id, item.quantity, now).await?;
    }

    if let Some(code) = &new.discount_code {
        let result = sqlx::query(
            r#"
            UPDATE discount_codes
            SET used_count = used_count + 1
            WHERE code = ?1 AND (usage_limit IS NULL OR used_count < usage_limit)
            "#,
        )
        .bind(code)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::DiscountExhausted { code: code.clone() });
        }
    }

    Ok(())
}

/// Decrements stock only if enough is available right now.
async fn decrement_stock(
    tx: &mut Transaction<'_, Sqlite>,
    product_id: &str,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock_quantity = stock_quantity - ?2,
            in_stock = (stock_quantity - ?2 > 0),
            updated_at = ?3
        WHERE id = ?1 AND stock_quantity >= ?2
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        let available: Option<i64> =
            sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = ?1")
                .bind(product_id)
                .fetch_optional(&mut **tx)
                .await?;

        return Err(DbError::InsufficientStock {
            product_id: product_id.to_string(),
            requested: quantity,
            available: available.unwrap_or(0),
        });
    }

    Ok(())
}

async fn complete_session(
    tx: &mut Transaction<'_, Sqlite>,
    order_number: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE checkout_sessions
        SET status = 'completed', completed_at = ?2
        WHERE order_number = ?1
        "#,
    )
    .bind(order_number)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
