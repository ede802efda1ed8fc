//! Reelcut Common Utilities
//!
//! Shared infrastructure for all reelcut crates:
//! - Error types and result aliases
//! - Job timing and deadline utilities
//! - Tracing/logging initialization
//! - Worker configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
