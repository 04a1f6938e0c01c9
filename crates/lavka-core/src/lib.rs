//! Lavka - inventory and order-approval core for a digital-goods store
//!
//! This library implements the store engine behind a chat storefront:
//! a pool of prepaid accounts, the order lifecycle from plan selection
//! to reviewed approval, exactly-once credential allocation, and the
//! append-only audit trail of every decision.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, logging, and metrics
//! - `storage`: Database pool, inventory, orders, and the audit log
//! - `shop`: Purchase and review flows over the storage layer

pub mod core;
pub mod shop;
pub mod storage;

// Re-export commonly used types for convenience
pub use crate::core::config;
pub use crate::core::error::{AppError, AppResult};
pub use crate::shop::{Messenger, OrderSummary, RateLimiter, ReviewerAction, SessionStore, Storefront};
pub use crate::storage::{create_pool, get_connection, DbConnection, DbPool};
