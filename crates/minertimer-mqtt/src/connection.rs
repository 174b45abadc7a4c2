//! Broker connection task

use minertimer_api::ConnectionState;
use minertimer_config::MqttSettings;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, MqttOptions, Packet};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::RumqttcPublisher;

/// Capacity of the client request channel
const REQUEST_CAPACITY: usize = 64;

/// What the connection task reports to the service loop
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    StateChanged(ConnectionState),
    Message { topic: String, payload: Vec<u8> },
}

pub fn mqtt_options(settings: &MqttSettings) -> MqttOptions {
    let mut options = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
    options.set_keep_alive(settings.keep_alive);
    options.set_clean_session(true);
    if let Some(username) = &settings.username {
        options.set_credentials(username, settings.password.as_deref().unwrap_or(""));
    }
    options
}

/// Start the connection task.
///
/// The task drives the `rumqttc` event loop, reporting connection state and
/// inbound publishes. On any error it reports `Disconnected`, waits
/// `reconnect_interval`, then tries again. It exits when the receiver is
/// dropped.
pub fn spawn_connection(
    settings: &MqttSettings,
) -> (
    RumqttcPublisher,
    JoinHandle<()>,
    mpsc::UnboundedReceiver<BridgeEvent>,
) {
    let (client, mut eventloop) = AsyncClient::new(mqtt_options(settings), REQUEST_CAPACITY);
    let (tx, rx) = mpsc::unbounded_channel();
    let reconnect_interval = settings.reconnect_interval;
    let host = format!("{}:{}", settings.host, settings.port);

    let handle = tokio::spawn(async move {
        info!(broker = %host, "Connecting to broker");
        if tx
            .send(BridgeEvent::StateChanged(ConnectionState::Connecting))
            .is_err()
        {
            return;
        }

        loop {
            let event = match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code == ConnectReturnCode::Success {
                        info!(broker = %host, "Connected to broker");
                        Some(BridgeEvent::StateChanged(ConnectionState::Connected))
                    } else {
                        warn!(code = ?ack.code, "Broker refused connection");
                        None
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => Some(BridgeEvent::Message {
                    topic: publish.topic.clone(),
                    payload: publish.payload.to_vec(),
                }),
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    Some(BridgeEvent::StateChanged(ConnectionState::Disconnected))
                }
                Ok(other) => {
                    debug!(event = ?other, "Broker event");
                    None
                }
                Err(e) => {
                    warn!(broker = %host, error = %e, "Broker connection lost");
                    if tx
                        .send(BridgeEvent::StateChanged(ConnectionState::Disconnected))
                        .is_err()
                    {
                        break;
                    }
                    tokio::time::sleep(reconnect_interval).await;
                    Some(BridgeEvent::StateChanged(ConnectionState::Connecting))
                }
            };

            if let Some(event) = event
                && tx.send(event).is_err()
            {
                break;
            }
        }

        debug!("Broker connection task exiting");
    });

    (RumqttcPublisher::new(client), handle, rx)
}
