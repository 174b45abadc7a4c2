//! Unix host for minertimer
//!
//! Provides:
//! - Process discovery by name via `sysinfo`
//! - Pause (SIGSTOP) and continue (SIGCONT) via `nix`

mod adapter;
mod process;

pub use adapter::*;
pub use process::*;
