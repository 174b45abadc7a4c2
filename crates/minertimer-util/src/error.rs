//! Error types for minertimer

use thiserror::Error;

/// Errors from budget operations requested by a control client
#[derive(Debug, Error)]
pub enum MinerTimerError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl MinerTimerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, MinerTimerError>;
