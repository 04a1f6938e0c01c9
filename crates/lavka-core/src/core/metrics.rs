//! Metrics collection for the store core using Prometheus
//!
//! This module provides a centralized metrics registry for tracking:
//! - Business metrics (orders, approvals, rejections, stock level)
//! - Failure metrics (out-of-stock hits, unauthorized review attempts)

use once_cell::sync::Lazy;
use prometheus::{register_counter, register_counter_vec, register_gauge_vec, Counter, CounterVec, GaugeVec};

// ======================
// BUSINESS METRICS
// ======================

/// Orders created, by plan
pub static ORDERS_CREATED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "lavka_orders_created_total",
        "Total number of orders created",
        &["plan"]
    )
    .unwrap()
});

/// Orders approved (credentials allocated), by plan
pub static ORDERS_APPROVED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "lavka_orders_approved_total",
        "Total number of orders approved and allocated",
        &["plan"]
    )
    .unwrap()
});

/// Orders rejected by the reviewer, by plan
pub static ORDERS_REJECTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "lavka_orders_rejected_total",
        "Total number of orders rejected",
        &["plan"]
    )
    .unwrap()
});

/// Orders expired by the background sweep, by plan
pub static ORDERS_EXPIRED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "lavka_orders_expired_total",
        "Total number of orders expired without proof or approval",
        &["plan"]
    )
    .unwrap()
});

/// Remaining AVAILABLE inventory, by plan
/// Updated whenever a stock report is built
pub static STOCK_AVAILABLE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "lavka_stock_available",
        "Number of AVAILABLE inventory items by plan",
        &["plan"]
    )
    .unwrap()
});

// ======================
// FAILURE METRICS
// ======================

/// Approvals that failed because the plan pool was empty
pub static OUT_OF_STOCK_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "lavka_out_of_stock_total",
        "Approval attempts that found no available item",
        &["plan"]
    )
    .unwrap()
});

/// Reviewer actions attempted by a non-reviewer identity
pub static UNAUTHORIZED_ACTIONS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "lavka_unauthorized_actions_total",
        "Reviewer actions attempted by someone other than the reviewer"
    )
    .unwrap()
});
