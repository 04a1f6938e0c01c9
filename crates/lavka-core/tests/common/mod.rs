//! Common test utilities
//!
//! A fully wired store over a file-backed temp database, plus helpers
//! for seeding stock and steering orders into interesting states.

#![allow(dead_code)] // Helpers are shared across several test crates

use std::sync::Arc;
use std::time::Duration;

use lavka_core::shop::{Messenger, RateLimiter, SessionStore, Storefront};
use lavka_core::storage::orders::{self, Order};
use lavka_core::storage::{self, inventory, DbConnection, DbPool};
use rusqlite::params;
use tempfile::TempDir;

use crate::mocks::RecordingMessenger;

pub const BUYER: i64 = 501_001;
pub const OTHER_BUYER: i64 = 501_002;
pub const REVIEWER: i64 = 900_042;
pub const STRANGER: i64 = 666_013;

/// One store instance per test, with every collaborator reachable for
/// assertions. The temp dir keeps the database file alive.
pub struct TestStore {
    pub store: Storefront,
    pub pool: Arc<DbPool>,
    pub messenger: Arc<RecordingMessenger>,
    pub sessions: Arc<SessionStore>,
    pub limiter: Arc<RateLimiter>,
    _dir: TempDir,
}

impl TestStore {
    /// Store with the cooldown guard effectively off.
    pub fn new() -> Self {
        Self::with_cooldown(Duration::ZERO)
    }

    pub fn with_cooldown(cooldown: Duration) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("store.db");
        let pool = Arc::new(
            storage::create_pool(db_path.to_str().expect("utf-8 temp path")).expect("create pool"),
        );
        let messenger = Arc::new(RecordingMessenger::new());
        let limiter = Arc::new(RateLimiter::with_duration(cooldown));
        let sessions = Arc::new(SessionStore::new(Duration::from_secs(30 * 60)));
        let store = Storefront::new(
            Arc::clone(&pool),
            Arc::clone(&messenger) as Arc<dyn Messenger>,
            Arc::clone(&limiter),
            Arc::clone(&sessions),
            REVIEWER,
        );
        Self {
            store,
            pool,
            messenger,
            sessions,
            limiter,
            _dir: dir,
        }
    }

    pub fn conn(&self) -> DbConnection {
        storage::get_connection(&self.pool).expect("db connection")
    }

    /// Seed `count` fresh credentials for a plan, returning the payloads.
    pub fn restock(&self, plan: &str, count: usize) -> Vec<String> {
        let conn = self.conn();
        (0..count)
            .map(|i| {
                let payload = format!("{}-login{}:pass{}", plan, i, i);
                inventory::restock(&conn, plan, &payload).expect("restock");
                payload
            })
            .collect()
    }

    /// Open an order and attach a proof, right up to the review gate.
    pub async fn order_with_proof(&self, buyer_id: i64, plan: &str) -> Order {
        let order = self
            .store
            .on_plan_selected(buyer_id, plan)
            .await
            .expect("plan selection")
            .expect("order created");
        let attached = self
            .store
            .on_proof_submitted(buyer_id, "receipt-0001.jpg")
            .await
            .expect("proof submission");
        assert!(attached, "proof should land on the open order");
        self.order(&order.id)
    }

    /// Reload an order from the ledger.
    pub fn order(&self, order_id: &str) -> Order {
        orders::get_order(&self.conn(), order_id)
            .expect("get order")
            .expect("order exists")
    }

    /// Shift an order's creation time into the past.
    pub fn backdate(&self, order_id: &str, minutes: i64) {
        self.conn()
            .execute(
                "UPDATE orders SET created_at = datetime('now', '-' || ?1 || ' minutes') WHERE id = ?2",
                params![minutes, order_id],
            )
            .expect("backdate order");
    }
}
