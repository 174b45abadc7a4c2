//! Time-budget engine for minertimer
//!
//! This crate is the heart of minertimer, containing:
//! - Synced values (persisted, change-tracked minutes with publish throttling)
//! - Process discovery and pause/continue control
//! - The budget clock: accrual, day rollover, enforcement and warnings
//! - Password gating for privileged operations

mod auth;
mod clock;
mod events;
mod process;
mod synced;
mod warnings;

pub use auth::*;
pub use clock::*;
pub use events::*;
pub use process::*;
pub use synced::*;
pub use warnings::*;
