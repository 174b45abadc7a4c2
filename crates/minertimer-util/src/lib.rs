//! Shared utilities for minertimer
//!
//! This crate provides:
//! - ID types (ClientId, DeviceId)
//! - Time utilities (mockable wall clock, monotonic time, local midnight, day type)
//! - Error types
//! - Rate limiting and publish throttling
//! - Default paths for config, socket and data directories

mod error;
mod ids;
mod paths;
mod rate_limit;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use rate_limit::*;
pub use time::*;
