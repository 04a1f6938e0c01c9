//! Database pool, schema, and the store's three tables

pub mod audit;
pub mod db;
pub mod inventory;
pub mod orders;

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool};
