//! Home Assistant discovery payloads

use minertimer_api::ValueKind;
use minertimer_config::{MqttSettings, StateFormat};
use serde::{Deserialize, Serialize};

use crate::{Component, TopicScheme};

pub const DEVICE_MODEL: &str = "MinerTimer";
pub const DEVICE_MANUFACTURER: &str = "MinerTimer";

/// Device block shared by all entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub identifiers: Vec<String>,
    pub name: String,
    pub model: String,
    pub manufacturer: String,
}

impl DeviceDescriptor {
    pub fn from_settings(settings: &MqttSettings) -> Self {
        Self {
            identifiers: vec![settings.device_id.to_string()],
            name: settings.device_name.clone(),
            model: DEVICE_MODEL.to_string(),
            manufacturer: DEVICE_MANUFACTURER.to_string(),
        }
    }
}

/// Discovery config published (retained) for each value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryPayload {
    pub name: String,
    pub unique_id: String,
    pub state_topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_topic: Option<String>,
    pub unit_of_measurement: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    /// Extracts the number from JSON-encoded state payloads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_template: Option<String>,
    pub device: DeviceDescriptor,
}

impl DiscoveryPayload {
    pub fn build(
        kind: ValueKind,
        scheme: &TopicScheme,
        device: &DeviceDescriptor,
        format: StateFormat,
        max_minutes: f64,
    ) -> Self {
        let number = Component::for_kind(kind) == Component::Number;

        Self {
            name: kind.display_name().to_string(),
            unique_id: format!("{}_{}", scheme.device_id(), kind.key()),
            state_topic: scheme.state_topic(kind),
            command_topic: number.then(|| scheme.command_topic(kind)),
            unit_of_measurement: "min".to_string(),
            min: number.then_some(0.0),
            max: number.then_some(max_minutes),
            step: number.then_some(1.0),
            value_template: match format {
                StateFormat::Plain => None,
                StateFormat::Json => Some("{{ value_json.value }}".to_string()),
            },
            device: device.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> DeviceDescriptor {
        DeviceDescriptor::from_settings(&MqttSettings::default())
    }

    #[test]
    fn number_entity() {
        let scheme = TopicScheme::new("minertimer", "homeassistant", "minertimer_mac");
        let payload = DiscoveryPayload::build(
            ValueKind::CurrentLimit,
            &scheme,
            &device(),
            StateFormat::Plain,
            1440.0,
        );

        let json: serde_json::Value = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["name"], "Current Limit");
        assert_eq!(json["unique_id"], "minertimer_mac_current_limit");
        assert_eq!(json["state_topic"], "minertimer/current_limit/state");
        assert_eq!(json["command_topic"], "minertimer/current_limit/set");
        assert_eq!(json["unit_of_measurement"], "min");
        assert_eq!(json["min"], 0.0);
        assert_eq!(json["max"], 1440.0);
        assert_eq!(json["device"]["identifiers"][0], "minertimer_mac");
        assert!(json.get("value_template").is_none());
    }

    #[test]
    fn sensor_entity_has_no_command_or_bounds() {
        let scheme = TopicScheme::new("minertimer", "homeassistant", "minertimer_mac");
        let payload = DiscoveryPayload::build(
            ValueKind::PlayedTime,
            &scheme,
            &device(),
            StateFormat::Json,
            1440.0,
        );

        let json: serde_json::Value = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["name"], "Time Played");
        assert!(json.get("command_topic").is_none());
        assert!(json.get("min").is_none());
        assert!(json.get("max").is_none());
        assert_eq!(json["value_template"], "{{ value_json.value }}");
    }
}
