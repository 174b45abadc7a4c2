//! Validated settings

use minertimer_util::DeviceId;
use std::path::PathBuf;
use std::time::Duration;

use crate::schema::{
    RawConfig, RawLimitsConfig, RawMqttConfig, RawProcessConfig, RawServiceConfig, StateFormat,
};
use crate::{ConfigError, ConfigResult, ValidationError};

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_PROCESS_PATTERN: &str = "java";
pub const DEFAULT_WEEKDAY_MINUTES: f64 = 60.0;
pub const DEFAULT_WEEKEND_MINUTES: f64 = 120.0;
pub const DEFAULT_WARNING_MINUTES: [u32; 2] = [5, 1];
pub const DEFAULT_REQUEST_MORE_MINUTES: f64 = 30.0;
pub const DEFAULT_MAX_MINUTES: f64 = 1440.0;
pub const DEFAULT_MQTT_HOST: &str = "homeassistant";
pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_DEVICE_ID: &str = "minertimer_mac";
pub const DEFAULT_TOPIC_PREFIX: &str = "minertimer";
pub const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";

/// Validated configuration
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub service: ServiceSettings,
    pub process: ProcessSettings,
    pub limits: LimitSettings,
    pub mqtt: MqttSettings,
}

impl Settings {
    /// Convert from raw config. Call after `validate_config` reported no errors.
    pub fn from_raw(raw: RawConfig) -> ConfigResult<Self> {
        Ok(Self {
            service: ServiceSettings::from_raw(raw.service),
            process: ProcessSettings::from_raw(raw.process),
            limits: LimitSettings::from_raw(raw.limits),
            mqtt: MqttSettings::from_raw(raw.mqtt)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub data_dir: Option<PathBuf>,
    pub socket_path: Option<PathBuf>,
    pub tick_interval: Duration,
    pub admin_password: Option<String>,
}

impl ServiceSettings {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            data_dir: raw.data_dir,
            socket_path: raw.socket_path,
            tick_interval: Duration::from_millis(
                raw.tick_interval_ms.unwrap_or(DEFAULT_TICK_INTERVAL_MS),
            ),
            // An empty password would let anyone through; treat it as unset
            admin_password: raw.admin_password.filter(|p| !p.is_empty()),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct ProcessSettings {
    pub pattern: String,
    pub display_name: String,
}

impl ProcessSettings {
    fn from_raw(raw: RawProcessConfig) -> Self {
        Self {
            pattern: raw
                .pattern
                .unwrap_or_else(|| DEFAULT_PROCESS_PATTERN.to_string()),
            display_name: raw.display_name.unwrap_or_else(|| "Minecraft".to_string()),
        }
    }
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self::from_raw(RawProcessConfig::default())
    }
}

/// Daily limits, all in minutes
#[derive(Debug, Clone)]
pub struct LimitSettings {
    pub weekday_minutes: f64,
    pub weekend_minutes: f64,
    /// Sorted descending
    pub warning_minutes: Vec<u32>,
    pub request_more_minutes: f64,
    pub max_minutes: f64,
}

impl LimitSettings {
    fn from_raw(raw: RawLimitsConfig) -> Self {
        let mut warning_minutes = raw
            .warning_minutes
            .unwrap_or_else(|| DEFAULT_WARNING_MINUTES.to_vec());
        warning_minutes.sort_unstable_by(|a, b| b.cmp(a));

        Self {
            weekday_minutes: raw.weekday_minutes.unwrap_or(DEFAULT_WEEKDAY_MINUTES),
            weekend_minutes: raw.weekend_minutes.unwrap_or(DEFAULT_WEEKEND_MINUTES),
            warning_minutes,
            request_more_minutes: raw
                .request_more_minutes
                .unwrap_or(DEFAULT_REQUEST_MORE_MINUTES),
            max_minutes: raw.max_minutes.unwrap_or(DEFAULT_MAX_MINUTES),
        }
    }
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self::from_raw(RawLimitsConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    pub device_id: DeviceId,
    pub device_name: String,
    pub topic_prefix: String,
    pub discovery_prefix: String,
    pub reconnect_interval: Duration,
    pub publish_interval: Duration,
    pub keep_alive: Duration,
    pub state_format: StateFormat,
}

impl MqttSettings {
    fn from_raw(raw: RawMqttConfig) -> ConfigResult<Self> {
        let device_id = DeviceId::new(
            raw.device_id
                .unwrap_or_else(|| DEFAULT_DEVICE_ID.to_string()),
        )
        .map_err(|e| ConfigError::ValidationFailed {
            errors: vec![ValidationError::MqttError(e.to_string())],
        })?;

        Ok(Self {
            enabled: raw.enabled,
            host: raw.host.unwrap_or_else(|| DEFAULT_MQTT_HOST.to_string()),
            port: raw.port.unwrap_or(DEFAULT_MQTT_PORT),
            username: raw.username,
            password: raw.password,
            client_id: raw
                .client_id
                .unwrap_or_else(|| format!("minertimer-{}", device_id)),
            device_name: raw.device_name.unwrap_or_else(|| "MinerTimer".to_string()),
            device_id,
            topic_prefix: raw
                .topic_prefix
                .unwrap_or_else(|| DEFAULT_TOPIC_PREFIX.to_string()),
            discovery_prefix: raw
                .discovery_prefix
                .unwrap_or_else(|| DEFAULT_DISCOVERY_PREFIX.to_string()),
            reconnect_interval: Duration::from_secs(raw.reconnect_seconds.unwrap_or(5)),
            publish_interval: Duration::from_secs(raw.publish_interval_seconds.unwrap_or(60)),
            keep_alive: Duration::from_secs(raw.keep_alive_seconds.unwrap_or(30)),
            state_format: raw.state_format.unwrap_or_default(),
        })
    }
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: DEFAULT_MQTT_HOST.to_string(),
            port: DEFAULT_MQTT_PORT,
            username: None,
            password: None,
            client_id: format!("minertimer-{}", DEFAULT_DEVICE_ID),
            device_id: DeviceId::default(),
            device_name: "MinerTimer".to_string(),
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            discovery_prefix: DEFAULT_DISCOVERY_PREFIX.to_string(),
            reconnect_interval: Duration::from_secs(5),
            publish_interval: Duration::from_secs(60),
            keep_alive: Duration::from_secs(30),
            state_format: StateFormat::Plain,
        }
    }
}
