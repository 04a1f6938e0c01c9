//! Store flows: allocation, review, sessions, and the guard layer

pub mod allocation;
pub mod expiry;
pub mod guard;
pub mod messenger;
pub mod service;
pub mod session;

// Re-exports for convenience
pub use expiry::spawn_expiry_task;
pub use guard::RateLimiter;
pub use messenger::{Messenger, OrderSummary, ReviewerAction};
pub use service::Storefront;
pub use session::{PurchaseSession, SessionStore};
