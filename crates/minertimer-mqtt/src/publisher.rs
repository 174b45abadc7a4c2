//! Outbound side of the broker client

use rumqttc::{AsyncClient, QoS};
use std::sync::{Arc, Mutex};

use crate::BridgeResult;

/// Something that can subscribe and publish on the broker.
///
/// Calls are non-blocking; delivery happens on the connection task.
pub trait Publisher: Send + Sync {
    fn subscribe(&self, topic: &str) -> BridgeResult<()>;
    fn publish(&self, topic: &str, payload: String, retain: bool) -> BridgeResult<()>;
}

/// `rumqttc` client handle
#[derive(Clone)]
pub struct RumqttcPublisher {
    client: AsyncClient,
}

impl RumqttcPublisher {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }

    /// Ask the event loop to send DISCONNECT
    pub async fn disconnect(&self) -> BridgeResult<()> {
        self.client.disconnect().await?;
        Ok(())
    }
}

impl Publisher for RumqttcPublisher {
    fn subscribe(&self, topic: &str) -> BridgeResult<()> {
        self.client.try_subscribe(topic, QoS::AtLeastOnce)?;
        Ok(())
    }

    fn publish(&self, topic: &str, payload: String, retain: bool) -> BridgeResult<()> {
        self.client
            .try_publish(topic, QoS::AtLeastOnce, retain, payload.into_bytes())?;
        Ok(())
    }
}

/// A publish captured by `RecordingPublisher`
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPublish {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

/// In-memory publisher for tests
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    publishes: Arc<Mutex<Vec<RecordedPublish>>>,
    subscriptions: Arc<Mutex<Vec<String>>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publishes(&self) -> Vec<RecordedPublish> {
        self.publishes.lock().unwrap().clone()
    }

    /// Publishes to a given topic, oldest first
    pub fn publishes_to(&self, topic: &str) -> Vec<RecordedPublish> {
        self.publishes()
            .into_iter()
            .filter(|p| p.topic == topic)
            .collect()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.publishes.lock().unwrap().clear();
    }
}

impl Publisher for RecordingPublisher {
    fn subscribe(&self, topic: &str) -> BridgeResult<()> {
        self.subscriptions.lock().unwrap().push(topic.to_string());
        Ok(())
    }

    fn publish(&self, topic: &str, payload: String, retain: bool) -> BridgeResult<()> {
        self.publishes.lock().unwrap().push(RecordedPublish {
            topic: topic.to_string(),
            payload,
            retain,
        });
        Ok(())
    }
}
