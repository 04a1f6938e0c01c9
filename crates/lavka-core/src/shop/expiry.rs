//! Background sweep for stale pending orders
//!
//! Runs the deadline side of the order lifecycle so an abandoned order
//! cannot hold its buyer's pending slot forever.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::core::config;
use crate::shop::service::Storefront;

/// Spawn the periodic expiry sweep. The handle is returned for tests;
/// the production process lets it run for its whole lifetime.
pub fn spawn_expiry_task(store: Arc<Storefront>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config::orders::sweep_interval());
        loop {
            interval.tick().await;
            match store.expire_stale_orders().await {
                Ok(expired) if !expired.is_empty() => {
                    log::info!("Expired {} stale order(s)", expired.len());
                }
                Ok(_) => {}
                Err(e) => log::error!("Order expiry sweep failed: {}", e),
            }
        }
    })
}
