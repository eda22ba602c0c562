//! # storefront-checkout: From Cart To Paid Order
//!
//! Orchestrates pricing, payment providers and order persistence.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Checkout Request Flow                              │
//! │                                                                         │
//! │  storefront-api handlers                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              storefront-checkout (THIS CRATE)                   │   │
//! │  │                                                                 │   │
//! │  │  quote ─────────► PricingPipeline ◄──── DiscountValidator       │   │
//! │  │                        ▲                                        │   │
//! │  │  create intent ─► CheckoutService ──► PaymentAdapter            │   │
//! │  │                        │                 ├─ HostedSession       │   │
//! │  │                        │                 └─ TwoPhase            │   │
//! │  │  webhook/capture ► OrderFinalizer ───────┘                      │   │
//! │  └────────────────────────┬────────────────────────────────────────┘   │
//! │                           ▼                                             │
//! │       storefront-core (rules)      storefront-db (SQLite)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`pricing`] - Authoritative re-pricing of a cart
//! - [`discount`] - Discount code validation service
//! - [`payment`] - Provider adapters behind one trait
//! - [`checkout`] - Payment intent creation
//! - [`finalizer`] - Pending → Priced → Captured → Persisted
//! - [`order_number`] - Order number generation
//! - [`settings`] - Tunables
//! - [`error`] - Error taxonomy

pub mod checkout;
pub mod discount;
pub mod error;
pub mod finalizer;
pub mod order_number;
pub mod payment;
pub mod pricing;
pub mod settings;

pub use checkout::{CheckoutService, CreatedIntent};
pub use discount::{DiscountValidator, DiscountVerdict};
pub use error::{CheckoutError, CheckoutResult};
pub use finalizer::{FinalizeState, FinalizedOrder, OrderFinalizer};
pub use payment::{
    CaptureResult, HostedSessionAdapter, HostedSessionConfig, IntentRequest, PaymentAdapter,
    PaymentError, ProviderIntent, TwoPhaseAdapter, TwoPhaseConfig, WebhookEvent, WebhookVerifier,
};
pub use pricing::{PricedCart, PricedLine, PricingPipeline};
pub use settings::CheckoutSettings;
