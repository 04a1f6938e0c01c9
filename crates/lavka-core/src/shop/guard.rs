//! Per-buyer command cooldown
//!
//! Gates entry into the order flow. Not safety-critical: the ledger's
//! one-pending-order check stays authoritative, this only throttles how
//! often a buyer can start the flow. Constructed once per process (or
//! per test) and injected, never ambient.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::core::config;

/// Rate limiter for the store commands.
///
/// Stores the instant each buyer's cooldown expires. A buyer asking again
/// before that instant is told to wait; the order ledger is not touched.
#[derive(Clone)]
pub struct RateLimiter {
    limits: Arc<Mutex<HashMap<i64, Instant>>>,
    duration: Duration,
}

impl RateLimiter {
    /// Limiter with the configured cooldown window.
    pub fn new() -> Self {
        Self::with_duration(config::rate_limit::duration())
    }

    /// Limiter with a custom cooldown window (tests use a short or zero one).
    pub fn with_duration(duration: Duration) -> Self {
        Self {
            limits: Arc::new(Mutex::new(HashMap::new())),
            duration,
        }
    }

    /// True while the buyer's cooldown has not expired yet.
    pub async fn is_rate_limited(&self, buyer_id: i64) -> bool {
        let limits = self.limits.lock().await;
        if let Some(&instant) = limits.get(&buyer_id) {
            if Instant::now() < instant {
                return true;
            }
        }
        false
    }

    /// Remaining cooldown for the buyer, or `None` when not limited.
    ///
    /// Drives the user-facing "try again in Ns" message.
    pub async fn get_remaining_time(&self, buyer_id: i64) -> Option<Duration> {
        let limits = self.limits.lock().await;
        if let Some(&instant) = limits.get(&buyer_id) {
            let now = Instant::now();
            if now < instant {
                return Some(instant - now);
            }
        }
        None
    }

    /// Start a fresh cooldown for the buyer. Called after a successful
    /// entry into the order flow.
    pub async fn update_rate_limit(&self, buyer_id: i64) {
        let mut limits = self.limits.lock().await;
        limits.insert(buyer_id, Instant::now() + self.duration);
    }

    /// Drop the buyer's cooldown early (administrative reset).
    pub async fn remove_rate_limit(&self, buyer_id: i64) {
        let mut limits = self.limits.lock().await;
        limits.remove(&buyer_id);
    }

    /// Remove expired entries, returning how many were dropped.
    pub async fn cleanup(&self) -> usize {
        let mut limits = self.limits.lock().await;
        let before = limits.len();
        let now = Instant::now();
        limits.retain(|_, &mut instant| now < instant);
        before - limits.len()
    }

    /// Spawn a periodic cleanup of expired entries.
    pub fn spawn_cleanup_task(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let removed = self.cleanup().await;
                if removed > 0 {
                    log::debug!("Cleaned up {} expired rate limit entries", removed);
                }
            }
        })
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
