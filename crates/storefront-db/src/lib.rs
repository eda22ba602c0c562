//! # storefront-db: Database Layer for the Storefront Checkout
//!
//! SQLite persistence via sqlx: catalogue and inventory, discount codes,
//! checkout sessions, orders and payment reviews.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Storefront Data Flow                               │
//! │                                                                         │
//! │  OrderFinalizer / PricingPipeline (storefront-checkout)                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  storefront-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐   ┌────────────┐ │   │
//! │  │   │   Database    │    │   Repositories     │   │ Migrations │ │   │
//! │  │   │   (pool.rs)   │    │                    │   │ (embedded) │ │   │
//! │  │   │               │◄───│ ProductRepository  │   │            │ │   │
//! │  │   │ SqlitePool    │    │ DiscountRepository │   │ 001_init   │ │   │
//! │  │   │               │    │ CheckoutSession..  │   │            │ │   │
//! │  │   │               │    │ OrderRepository ★  │   │            │ │   │
//! │  │   │               │    │ PaymentReview..    │   │            │ │   │
//! │  │   └───────────────┘    └────────────────────┘   └────────────┘ │   │
//! │  │                                                                 │   │
//! │  │   ★ create_paid_order: order + items + stock + discount,       │   │
//! │  │     one transaction, keyed on the external payment id          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use storefront_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./storefront.db")).await?;
//! let product = db.products().get_by_id("...").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::checkout_session::CheckoutSessionRepository;
pub use repository::discount::DiscountRepository;
pub use repository::order::{NewOrder, NewOrderItem, OrderRepository, PersistOutcome};
pub use repository::product::ProductRepository;
pub use repository::review::{NewPaymentReview, PaymentReviewRepository};
