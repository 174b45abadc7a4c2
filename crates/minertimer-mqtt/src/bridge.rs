//! Remote bridge: mirrors synced values to the broker

use chrono::{DateTime, Local};
use minertimer_api::{ConnectionState, StatePublication, ValueKind};
use minertimer_config::{MqttSettings, StateFormat};
use tracing::{debug, info, warn};

use crate::{
    encode_state, validate_command, BridgeError, BridgeResult, DeviceDescriptor,
    DiscoveryPayload, InboundRejection, Publisher, TopicScheme,
};

/// Publishes state and discovery, and validates inbound commands.
///
/// Owns no network resources; the connection task feeds it state changes
/// and messages, and it writes through a `Publisher`.
pub struct RemoteBridge<P: Publisher> {
    publisher: P,
    scheme: TopicScheme,
    device: DeviceDescriptor,
    format: StateFormat,
    max_minutes: f64,
    state: ConnectionState,
}

impl<P: Publisher> RemoteBridge<P> {
    pub fn new(publisher: P, settings: &MqttSettings, max_minutes: f64) -> Self {
        Self {
            publisher,
            scheme: TopicScheme::from_settings(settings),
            device: DeviceDescriptor::from_settings(settings),
            format: settings.state_format,
            max_minutes,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn scheme(&self) -> &TopicScheme {
        &self.scheme
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Record a connection state change. Returns whether it changed.
    pub fn set_state(&mut self, state: ConnectionState) -> bool {
        if self.state == state {
            return false;
        }
        info!(from = %self.state, to = %state, "Broker link state changed");
        self.state = state;
        true
    }

    /// Subscribe to command topics, announce entities and push the full state.
    ///
    /// Called on every (re)connect since the session is not persistent.
    pub fn on_connected(&mut self, states: &[StatePublication]) -> BridgeResult<()> {
        self.set_state(ConnectionState::Connected);

        for topic in self.scheme.command_topics() {
            debug!(topic = %topic, "Subscribing");
            self.publisher.subscribe(&topic)?;
        }

        for kind in ValueKind::ALL {
            let payload = DiscoveryPayload::build(
                kind,
                &self.scheme,
                &self.device,
                self.format,
                self.max_minutes,
            );
            let body = serde_json::to_string(&payload)?;
            self.publisher
                .publish(&self.scheme.discovery_topic(kind), body, true)?;
        }

        for publication in states {
            self.publish(publication)?;
        }

        info!(values = states.len(), "Announced entities and pushed state");
        Ok(())
    }

    /// Publish one value to its state topic (retained)
    pub fn publish(&self, publication: &StatePublication) -> BridgeResult<()> {
        if !self.state.is_connected() {
            return Err(BridgeError::NotConnected);
        }

        let payload = encode_state(publication, self.format);
        debug!(kind = %publication.kind, payload = %payload, "Publishing state");
        self.publisher
            .publish(&self.scheme.state_topic(publication.kind), payload, true)
    }

    /// Validate an inbound message and resolve it to a value update.
    ///
    /// Read-only values, stale timestamps and out-of-range numbers are
    /// rejected and never reach the budget.
    pub fn handle_message(
        &self,
        topic: &str,
        payload: &[u8],
        now: DateTime<Local>,
    ) -> Result<(ValueKind, f64), InboundRejection> {
        if !self.state.is_connected() {
            return Err(InboundRejection::NotConnected);
        }

        let kind = self
            .scheme
            .kind_for_command_topic(topic)
            .ok_or(InboundRejection::UnknownTopic)?;

        if !kind.is_mutable() {
            return Err(InboundRejection::ReadOnly(kind));
        }

        match validate_command(payload, now, self.max_minutes) {
            Ok(value) => {
                debug!(kind = %kind, value, "Accepted remote value");
                Ok((kind, value))
            }
            Err(rejection @ InboundRejection::Decode(_)) => {
                warn!(kind = %kind, reason = %rejection, "Dropped malformed remote command");
                Err(rejection)
            }
            Err(rejection) => {
                debug!(kind = %kind, reason = %rejection, "Dropped remote command");
                Err(rejection)
            }
        }
    }
}
