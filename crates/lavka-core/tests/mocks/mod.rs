//! Mock implementations for scenario tests
//!
//! This module provides a recording messenger so store flows can run
//! without a real chat platform behind them.

pub mod mock_messenger;

#[allow(unused_imports)]
pub use mock_messenger::RecordingMessenger;
