//! Reelcut Common Utilities
//!
//! Shared infrastructure for all Reelcut crates:
//! - Error types and result aliases
//! - Generic bounded worker pool
//! - Tracing/logging initialization
//! - Configuration loading

pub mod config;
pub mod error;
pub mod logging;
pub mod pool;

pub use config::*;
pub use error::*;
pub use pool::{PoolError, Priority, TaskHandle, WorkerPool};
