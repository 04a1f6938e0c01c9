//! Short-lived purchase sessions
//!
//! A buyer-keyed hint of which plan and order the buyer is currently
//! working through. Used only for fast re-entry messages; the order
//! ledger remains the authority on what is actually open.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// What the buyer is in the middle of buying.
#[derive(Debug, Clone)]
pub struct PurchaseSession {
    pub plan: String,
    pub order_id: Option<String>,
    started_at: Instant,
}

/// Buyer sessions with TTL
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<i64, PurchaseSession>>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(crate::core::config::orders::session_ttl())
    }
}

impl SessionStore {
    /// Store with the given session time-to-live.
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// The buyer's live session, or `None` if absent or expired.
    /// Expired entries are dropped on the way out.
    pub async fn get(&self, buyer_id: i64) -> Option<PurchaseSession> {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get(&buyer_id) {
            if Instant::now().duration_since(session.started_at) < self.ttl {
                return Some(session.clone());
            }
            sessions.remove(&buyer_id);
        }
        None
    }

    /// Open a session for a plan selection, replacing any previous one.
    pub async fn start(&self, buyer_id: i64, plan: &str) {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(
            buyer_id,
            PurchaseSession {
                plan: plan.to_string(),
                order_id: None,
                started_at: Instant::now(),
            },
        );
    }

    /// Record which order the session's plan selection turned into.
    pub async fn bind_order(&self, buyer_id: i64, order_id: &str) {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get_mut(&buyer_id) {
            session.order_id = Some(order_id.to_string());
        }
    }

    /// Drop the buyer's session (order reached a terminal state).
    pub async fn clear(&self, buyer_id: i64) {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(&buyer_id);
    }

    /// Remove expired sessions, returning how many were dropped.
    pub async fn cleanup(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        let now = Instant::now();
        sessions.retain(|_, session| now.duration_since(session.started_at) < self.ttl);
        before - sessions.len()
    }

    /// Spawn a periodic cleanup of expired sessions.
    pub fn spawn_cleanup_task(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let removed = self.cleanup().await;
                if removed > 0 {
                    log::debug!("Cleaned up {} expired purchase sessions", removed);
                }
            }
        })
    }
}
