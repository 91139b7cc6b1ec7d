//! Fusion pipeline integration tests.
//!
//! - Aggregator correlation of observations with out-of-order poses
//! - Crash handling and partial reports
//! - Full runs wired from a JSON configuration
#![cfg(feature = "fusion")]

mod support;
mod aggregator;
