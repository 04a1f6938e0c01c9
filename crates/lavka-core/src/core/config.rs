use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Configuration constants for the store core
/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: lavka.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "lavka.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: lavka.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "lavka.log".to_string()));

/// Reviewer configuration
pub mod reviewer {
    use super::*;

    /// The single trusted identity allowed to approve/reject orders.
    /// Read from REVIEWER_ID environment variable.
    /// Default: 0 (no reviewer configured; every reviewer action is refused)
    pub static REVIEWER_ID: Lazy<i64> = Lazy::new(|| {
        env::var("REVIEWER_ID")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    });
}

/// Rate limiting configuration
pub mod rate_limit {
    use super::Duration;

    /// Cooldown between store commands per buyer (in seconds)
    pub const COOLDOWN_SECONDS: u64 = 30;

    /// Rate limit duration
    pub fn duration() -> Duration {
        Duration::from_secs(COOLDOWN_SECONDS)
    }
}

/// Order lifecycle configuration
pub mod orders {
    use super::*;

    /// Minutes a PENDING order may sit without proof/approval before the
    /// sweep expires it.
    /// Read from ORDER_EXPIRY_MINUTES environment variable
    /// Default: 30
    pub static EXPIRY_MINUTES: Lazy<i64> = Lazy::new(|| {
        env::var("ORDER_EXPIRY_MINUTES")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(30)
    });

    /// Interval between expiry sweep runs (in seconds)
    pub const SWEEP_INTERVAL_SECS: u64 = 60;

    /// Time-to-live of the in-memory purchase session hint (in minutes).
    /// Matches the order expiry window so the hint never outlives the order.
    pub const SESSION_TTL_MINUTES: u64 = 30;

    /// Sweep interval duration
    pub fn sweep_interval() -> Duration {
        Duration::from_secs(SWEEP_INTERVAL_SECS)
    }

    /// Session TTL duration
    pub fn session_ttl() -> Duration {
        Duration::from_secs(SESSION_TTL_MINUTES * 60)
    }
}

/// Plan pricing configuration
///
/// Prices are display strings shown to the buyer at order creation and
/// snapshotted into the order row; changing an env var later does not
/// affect open orders.
pub mod pricing {
    use super::*;

    /// Price of the Monthly plan
    /// Read from PRICE_MONTHLY environment variable
    /// Default: 199 ₽
    pub static MONTHLY_PRICE: Lazy<String> =
        Lazy::new(|| env::var("PRICE_MONTHLY").unwrap_or_else(|_| "199 ₽".to_string()));

    /// Price of the Yearly plan
    /// Read from PRICE_YEARLY environment variable
    /// Default: 1490 ₽
    pub static YEARLY_PRICE: Lazy<String> =
        Lazy::new(|| env::var("PRICE_YEARLY").unwrap_or_else(|_| "1490 ₽".to_string()));

    /// Returns the display price for a plan, or None for a plan the
    /// store does not sell.
    pub fn price_for(plan: &str) -> Option<String> {
        match plan.to_lowercase().as_str() {
            "monthly" => Some(MONTHLY_PRICE.clone()),
            "yearly" => Some(YEARLY_PRICE.clone()),
            _ => None,
        }
    }
}
