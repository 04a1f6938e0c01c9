//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - Store configuration logging at startup

use anyhow::Result;
use simplelog::*;
use std::fs::File;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs store configuration at application startup
///
/// Validates and logs:
/// - Reviewer principal configuration
/// - Order expiry window and sweep interval
/// - Per-buyer cooldown
pub fn log_store_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("🏪 Store Configuration Check");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    log::info!("📦 Database: {}", config::DATABASE_PATH.as_str());

    let reviewer_id = *config::reviewer::REVIEWER_ID;
    if reviewer_id != 0 {
        log::info!("✅ REVIEWER_ID: {}", reviewer_id);
    } else {
        log::error!("❌ REVIEWER_ID: not set");
        log::error!("   Every approve/reject action will be refused!");
        log::error!("   Set: export REVIEWER_ID=<telegram user id>");
    }

    log::info!(
        "⏲️  Order expiry: {} min (sweep every {} s)",
        *config::orders::EXPIRY_MINUTES,
        config::orders::SWEEP_INTERVAL_SECS
    );
    log::info!("🚦 Buyer cooldown: {} s", config::rate_limit::COOLDOWN_SECONDS);
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
