//! MQTT remote bridge for minertimer
//!
//! Mirrors the four synced values to a broker so a supervisor can watch
//! and adjust them (typically from Home Assistant):
//! - Topic scheme and Home Assistant discovery payloads
//! - State payload encoding and inbound command decoding
//! - Staleness and range filtering of inbound commands
//! - Connection state machine over `rumqttc`, with fixed-delay reconnect

mod bridge;
mod connection;
mod discovery;
mod payload;
mod publisher;
mod topics;

pub use bridge::*;
pub use connection::*;
pub use discovery::*;
pub use payload::*;
pub use publisher::*;
pub use topics::*;

use thiserror::Error;

/// Bridge errors
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Broker connection error: {0}")]
    Connection(String),

    #[error("Not connected to broker")]
    NotConnected,

    #[error("Client request failed: {0}")]
    Client(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rumqttc::ClientError> for BridgeError {
    fn from(e: rumqttc::ClientError) -> Self {
        BridgeError::Client(e.to_string())
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
