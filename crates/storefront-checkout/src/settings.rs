//! Checkout tunables, loaded as the `[checkout]` section of the API config.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use storefront_core::{Money, DEFAULT_CURRENCY};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSettings {
    /// Currency every quote and capture must be in.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Largest accepted difference between captured and computed totals.
    #[serde(default = "default_tolerance")]
    pub amount_tolerance_cents: i64,

    /// How long an unpaid checkout session stays valid.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_minutes: i64,

    /// Total time spent retrying a transient persistence failure.
    #[serde(default = "default_persist_retry")]
    pub persist_retry_secs: u64,

    /// Where the hosted page sends the buyer after paying.
    #[serde(default = "default_success_url")]
    pub success_url: String,

    /// Where the hosted page sends the buyer after cancelling.
    #[serde(default = "default_cancel_url")]
    pub cancel_url: String,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_tolerance() -> i64 {
    1
}

fn default_session_ttl() -> i64 {
    24 * 60
}

fn default_persist_retry() -> u64 {
    30
}

fn default_success_url() -> String {
    "http://localhost:8080/api/checkout/hosted/return".to_string()
}

fn default_cancel_url() -> String {
    "http://localhost:3000/cart".to_string()
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        CheckoutSettings {
            currency: default_currency(),
            amount_tolerance_cents: default_tolerance(),
            session_ttl_minutes: default_session_ttl(),
            persist_retry_secs: default_persist_retry(),
            success_url: default_success_url(),
            cancel_url: default_cancel_url(),
        }
    }
}

impl CheckoutSettings {
    pub fn amount_tolerance(&self) -> Money {
        Money::from_cents(self.amount_tolerance_cents)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_ttl_minutes)
    }

    pub fn persist_retry_budget(&self) -> Duration {
        Duration::from_secs(self.persist_retry_secs)
    }
}
