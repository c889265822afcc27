//! lctrack End-to-End Test Support
//!
//! Shared harness and data factories for the journey tests:
//! - `harness`: isolated tracker instances backed by temporary directories
//! - `mocks`: problem catalogs and review histories for common scenarios

pub mod harness;
pub mod mocks;

pub use harness::TestDatabaseManager;
pub use mocks::{BatchConfig, TestDataFactory};

/// Fixed reference time for deterministic scenarios (2023-11-14 22:13:20 UTC)
pub const T0: i64 = 1_700_000_000;

/// Seconds in a day
pub const DAY: i64 = lctrack_core::sm2::SECONDS_PER_DAY;
