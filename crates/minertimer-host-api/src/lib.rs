//! Host trait interfaces for minertimer
//!
//! This crate defines the interface between the budget core and the
//! platform: listing processes and sending pause/continue signals. It
//! contains no platform code itself; `MockHost` stands in for tests.

mod mock;
mod traits;

pub use mock::*;
pub use traits::*;
