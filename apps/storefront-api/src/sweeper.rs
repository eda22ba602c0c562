//! Background expiry of abandoned checkout sessions.
//!
//! Sessions are only marked, never removed: their order numbers stay
//! reserved and a late hosted payment still finds its cart.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use storefront_db::Database;

/// Runs one sweep. Returns the number of sessions marked expired.
pub async fn sweep_once(db: &Database) -> u64 {
    match db.sessions().expire_stale(Utc::now()).await {
        Ok(0) => {
            debug!("No stale checkout sessions");
            0
        }
        Ok(expired) => {
            info!(expired, "Marked checkout sessions expired");
            expired
        }
        Err(e) => {
            warn!(error = %e, "Checkout session sweep failed");
            0
        }
    }
}

/// Sweeps every `interval` until `shutdown` flips to true.
pub fn spawn(db: Database, interval: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    sweep_once(&db).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("Session sweeper stopping");
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use storefront_core::{CheckoutSession, CheckoutSessionStatus, PaymentMethod};
    use storefront_db::DbConfig;

    #[tokio::test]
    async fn test_sweep_marks_only_stale_pending() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();

        for (order_number, expires_at) in [
            ("SF-OLD", now - ChronoDuration::minutes(5)),
            ("SF-NEW", now + ChronoDuration::minutes(5)),
        ] {
            db.sessions()
                .insert(&CheckoutSession {
                    order_number: order_number.into(),
                    payment_method: PaymentMethod::HostedSession,
                    provider_ref: None,
                    payload: "{}".into(),
                    quoted_total_cents: 1000,
                    currency: "EUR".into(),
                    status: CheckoutSessionStatus::Pending,
                    created_at: now - ChronoDuration::hours(1),
                    expires_at,
                    completed_at: None,
                })
                .await
                .unwrap();
        }

        assert_eq!(sweep_once(&db).await, 1);
        let old = db.sessions().get("SF-OLD").await.unwrap().unwrap();
        assert_eq!(old.status, CheckoutSessionStatus::Expired);
        let new = db.sessions().get("SF-NEW").await.unwrap().unwrap();
        assert_eq!(new.status, CheckoutSessionStatus::Pending);
    }
}
