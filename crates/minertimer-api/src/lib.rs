//! Protocol types for minertimer
//!
//! This crate defines the types shared between the daemon, its remote
//! bridge and local control clients:
//! - Value kinds, origins and process state
//! - State snapshots
//! - Control commands and responses
//! - Events (daemon -> clients)

mod commands;
mod events;
mod types;

pub use commands::*;
pub use events::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
