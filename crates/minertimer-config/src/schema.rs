//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    #[serde(default)]
    pub service: RawServiceConfig,

    #[serde(default)]
    pub process: RawProcessConfig,

    #[serde(default)]
    pub limits: RawLimitsConfig,

    #[serde(default)]
    pub mqtt: RawMqttConfig,
}

/// Daemon-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Data directory for the store
    pub data_dir: Option<PathBuf>,

    /// Control socket path
    pub socket_path: Option<PathBuf>,

    /// Scheduler tick period in milliseconds (default: 1000)
    pub tick_interval_ms: Option<u64>,

    /// Password gating privileged control commands.
    /// When unset, privileged commands are always denied.
    pub admin_password: Option<String>,
}

/// Which process to monitor
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawProcessConfig {
    /// Case-insensitive substring of the process name (default: "java")
    pub pattern: Option<String>,

    /// Human-friendly name for logs and notifications
    pub display_name: Option<String>,
}

/// Daily budget configuration, all in minutes
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawLimitsConfig {
    pub weekday_minutes: Option<f64>,
    pub weekend_minutes: Option<f64>,

    /// Remaining-time thresholds that trigger a warning event
    pub warning_minutes: Option<Vec<u32>>,

    /// Amount added by a "request more time" command
    pub request_more_minutes: Option<f64>,

    /// Upper bound for any limit, advertised to and enforced on remote commands
    pub max_minutes: Option<f64>,
}

/// How values are encoded on state topics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateFormat {
    /// Bare decimal number
    #[default]
    Plain,
    /// `{"value": <number>, "timestamp": <epoch seconds>}`
    Json,
}

/// MQTT broker and Home Assistant discovery settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawMqttConfig {
    #[serde(default)]
    pub enabled: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,

    /// Device identifier used in discovery topics and unique ids
    pub device_id: Option<String>,
    pub device_name: Option<String>,

    /// Prefix for state and command topics (default: "minertimer")
    pub topic_prefix: Option<String>,

    /// Home Assistant discovery prefix (default: "homeassistant")
    pub discovery_prefix: Option<String>,

    pub reconnect_seconds: Option<u64>,

    /// Minimum interval between publishes of the same value
    pub publish_interval_seconds: Option<u64>,
    pub keep_alive_seconds: Option<u64>,

    pub state_format: Option<StateFormat>,
}
