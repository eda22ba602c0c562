//! # Repository Module
//!
//! Database repository implementations.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Checkout service                                                      │
//! │       │                                                                 │
//! │       │  db.orders().create_paid_order(&new_order)                     │
//! │       ▼                                                                 │
//! │  OrderRepository                                                       │
//! │  ├── find_by_external_payment_id(&self, id)                            │
//! │  ├── find_by_order_number(&self, number)                               │
//! │  └── create_paid_order(&self, order)  ← one transaction                │
//! │       │                                                                 │
//! │       │  SQL                                                            │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Catalogue reads, inventory levels
//! - [`discount::DiscountRepository`] - Discount code lookup (case-insensitive)
//! - [`checkout_session::CheckoutSessionRepository`] - Intent bookkeeping + sweeper
//! - [`order::OrderRepository`] - Idempotent order persistence
//! - [`review::PaymentReviewRepository`] - Manual reconciliation queue

pub mod checkout_session;
pub mod discount;
pub mod order;
pub mod product;
pub mod review;
