//! Topic naming

use minertimer_api::ValueKind;
use minertimer_config::MqttSettings;

/// Home Assistant entity component for a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    /// Settable from Home Assistant
    Number,
    /// Read-only
    Sensor,
}

impl Component {
    pub fn for_kind(kind: ValueKind) -> Self {
        if kind.is_mutable() {
            Component::Number
        } else {
            Component::Sensor
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Component::Number => "number",
            Component::Sensor => "sensor",
        }
    }
}

/// Maps each value kind to its state, command and discovery topics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicScheme {
    prefix: String,
    discovery_prefix: String,
    device_id: String,
}

impl TopicScheme {
    pub fn new(
        prefix: impl Into<String>,
        discovery_prefix: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            discovery_prefix: discovery_prefix.into(),
            device_id: device_id.into(),
        }
    }

    pub fn from_settings(settings: &MqttSettings) -> Self {
        Self::new(
            settings.topic_prefix.clone(),
            settings.discovery_prefix.clone(),
            settings.device_id.as_str(),
        )
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// `minertimer/{key}/state`
    pub fn state_topic(&self, kind: ValueKind) -> String {
        format!("{}/{}/state", self.prefix, kind.key())
    }

    /// `minertimer/{key}/set`
    pub fn command_topic(&self, kind: ValueKind) -> String {
        format!("{}/{}/set", self.prefix, kind.key())
    }

    /// `homeassistant/{number|sensor}/{device_id}/{key}/config`
    pub fn discovery_topic(&self, kind: ValueKind) -> String {
        format!(
            "{}/{}/{}/{}/config",
            self.discovery_prefix,
            Component::for_kind(kind).as_str(),
            self.device_id,
            kind.key()
        )
    }

    /// Command topics to subscribe to (mutable values only)
    pub fn command_topics(&self) -> Vec<String> {
        ValueKind::ALL
            .into_iter()
            .filter(|k| k.is_mutable())
            .map(|k| self.command_topic(k))
            .collect()
    }

    /// Which value a command topic addresses, including read-only ones
    pub fn kind_for_command_topic(&self, topic: &str) -> Option<ValueKind> {
        let rest = topic.strip_prefix(&self.prefix)?.strip_prefix('/')?;
        let key = rest.strip_suffix("/set")?;
        ValueKind::from_key(key)
    }
}
