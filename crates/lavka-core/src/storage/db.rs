use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::time::Duration;

use crate::core::error::AppResult;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections and ensures
/// the schema exists. Every connection gets a 30s busy timeout so that
/// writers queued behind an allocation transaction wait instead of
/// failing with `SQLITE_BUSY`.
///
/// # Arguments
///
/// * `database_path` - Path to SQLite database file
///
/// # Example
///
/// ```no_run
/// use lavka_core::storage::db;
///
/// let pool = db::create_pool("lavka.sqlite").expect("pool");
/// ```
pub fn create_pool(database_path: &str) -> AppResult<DbPool> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.busy_timeout(Duration::from_secs(30))?;
        conn.pragma_update(None, "foreign_keys", "ON")
    });
    let pool = Pool::builder()
        .max_size(10) // Maximum 10 connections in the pool
        .build(manager)?;

    // Ensure schema exists on first connection
    let conn = pool.get()?;
    init_schema(&conn)?;

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is automatically returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

/// Create the store schema if it does not exist yet.
///
/// Idempotent; safe to run on every startup. The partial unique index on
/// `orders(buyer_id) WHERE status = 'pending'` is what makes the
/// one-pending-order check inseparable from the insert.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS inventory (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            plan TEXT NOT NULL,
            secret_payload TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'available'
                CHECK (status IN ('available', 'sold')),
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            sold_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_inventory_plan_status
            ON inventory(plan, status);

        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            buyer_id INTEGER NOT NULL,
            plan TEXT NOT NULL,
            price_snapshot TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'approved', 'rejected', 'expired')),
            review_stage TEXT NOT NULL DEFAULT 'none'
                CHECK (review_stage IN ('none', 'confirm')),
            proof_ref TEXT,
            item_id INTEGER REFERENCES inventory(id),
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            approved_at TEXT
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_orders_one_pending
            ON orders(buyer_id) WHERE status = 'pending';

        CREATE INDEX IF NOT EXISTS idx_orders_buyer_created
            ON orders(buyer_id, created_at);

        CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            action TEXT NOT NULL,
            plan TEXT,
            buyer_id INTEGER,
            order_id TEXT,
            status TEXT NOT NULL,
            detail TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_audit_log_buyer
            ON audit_log(buyer_id, created_at);",
    )
}
