//! minertimerd - The minertimer background service
//!
//! Wires together:
//! - Configuration loading
//! - Store initialization
//! - Budget clock (process discovery, accrual, rollover, enforcement)
//! - Host adapter (Unix)
//! - Control socket
//! - MQTT bridge to Home Assistant (optional)

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Parser;
use minertimer_api::{
    Command, ConnectionState, ErrorCode, ErrorInfo, Event, EventPayload, Response,
    ResponsePayload, ValueKind,
};
use minertimer_config::{load_config_or_default, Settings};
use minertimer_core::{BudgetClock, ConfiguredPassword, CoreEvent};
use minertimer_host_unix::UnixHost;
use minertimer_ipc::{IpcServer, ServerMessage};
use minertimer_mqtt::{spawn_connection, BridgeEvent, RemoteBridge, RumqttcPublisher};
use minertimer_store::{AuditEvent, AuditEventType, SqliteStore, Store};
use minertimer_util::{
    database_path, default_config_path, default_data_dir, default_socket_path, ClientId,
    MinerTimerError, MonotonicInstant, RateLimiter,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// How long shutdown waits for the broker task to send queued publishes
const BRIDGE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// minertimerd - Daily play-time budget service
#[derive(Parser, Debug)]
#[command(name = "minertimerd")]
#[command(about = "Daily play-time budget service with Home Assistant sync", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/minertimer/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override (or set MINERTIMER_SOCKET env var)
    #[arg(short, long, env = "MINERTIMER_SOCKET")]
    socket: Option<PathBuf>,

    /// Data directory override (or set MINERTIMER_DATA_DIR env var)
    #[arg(short, long, env = "MINERTIMER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Broker side of the service
struct Bridge {
    remote: RemoteBridge<RumqttcPublisher>,
    task: JoinHandle<()>,
}

/// Main service state
struct Service {
    clock: BudgetClock,
    ipc: Arc<IpcServer>,
    store: Arc<dyn Store>,
    bridge: Option<Bridge>,
    bridge_events: Option<mpsc::UnboundedReceiver<BridgeEvent>>,
    rate_limiter: RateLimiter,
    tick_interval: Duration,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let settings = load_config_or_default(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(
            config_path = %args.config.display(),
            pattern = %settings.process.pattern,
            mqtt = settings.mqtt.enabled,
            "Configuration loaded"
        );

        let socket_path = args
            .socket
            .clone()
            .or_else(|| settings.service.socket_path.clone())
            .unwrap_or_else(default_socket_path);

        let data_dir = args
            .data_dir
            .clone()
            .or_else(|| settings.service.data_dir.clone())
            .unwrap_or_else(default_data_dir);

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = database_path(&data_dir);
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        store.append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;

        let auth = ConfiguredPassword::new(settings.service.admin_password.clone());
        if !auth.is_configured() {
            warn!("No admin password configured; privileged commands are disabled");
        }

        let host = Arc::new(UnixHost::new());
        let clock = BudgetClock::new(
            &settings,
            store.clone(),
            host,
            Arc::new(auth),
            minertimer_util::now(),
        );

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start().await?;

        info!(socket_path = %socket_path.display(), "Control socket started");

        let (bridge, bridge_events) = Self::start_bridge(&settings);

        // 30 requests per second per client
        let rate_limiter = RateLimiter::new(30, Duration::from_secs(1));

        Ok(Self {
            clock,
            ipc: Arc::new(ipc),
            store,
            bridge,
            bridge_events,
            rate_limiter,
            tick_interval: settings.service.tick_interval,
        })
    }

    fn start_bridge(
        settings: &Settings,
    ) -> (Option<Bridge>, Option<mpsc::UnboundedReceiver<BridgeEvent>>) {
        if !settings.mqtt.enabled {
            info!("MQTT bridge disabled");
            return (None, None);
        }

        let (publisher, task, events) = spawn_connection(&settings.mqtt);
        let remote = RemoteBridge::new(publisher, &settings.mqtt, settings.limits.max_minutes);

        info!(
            host = %settings.mqtt.host,
            port = settings.mqtt.port,
            device_id = %settings.mqtt.device_id,
            "MQTT bridge started"
        );

        (Some(Bridge { remote, task }), Some(events))
    }

    async fn run(mut self) -> Result<()> {
        let mut ipc_messages = self
            .ipc
            .take_message_receiver()
            .await
            .context("Control socket message receiver already taken")?;
        let mut bridge_events = self.bridge_events.take();

        let ipc_accept = self.ipc.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "Control socket error");
            }
        });

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup =
            signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        let mut tick_timer = tokio::time::interval(self.tick_interval);
        tick_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(tick_ms = self.tick_interval.as_millis() as u64, "Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                _ = tick_timer.tick() => {
                    let now_mono = MonotonicInstant::now();
                    let now = minertimer_util::now();

                    let events = self.clock.tick(now, now_mono);
                    self.dispatch_core_events(events, now);
                    self.publish_due(now_mono);
                }

                Some(event) = recv_bridge_event(&mut bridge_events) => {
                    self.handle_bridge_event(event);
                }

                Some(msg) = ipc_messages.recv() => {
                    self.handle_ipc_message(msg).await;
                }
            }
        }

        // Lets the broker task exit on its next report
        drop(bridge_events);
        self.shutdown().await;
        Ok(())
    }

    async fn shutdown(mut self) {
        info!("Shutting down minertimerd");

        self.ipc.broadcast_event(Event::new(EventPayload::Shutdown));

        if let Some(bridge) = self.bridge.take() {
            if bridge.remote.state().is_connected() {
                let pending = self.clock.flush_publications(MonotonicInstant::now());
                for publication in &pending {
                    if let Err(e) = bridge.remote.publish(publication) {
                        debug!(kind = %publication.kind, error = %e, "Final publish dropped");
                    }
                }
                if let Err(e) = bridge.remote.publisher().disconnect().await {
                    debug!(error = %e, "Broker disconnect failed");
                }
            }

            let mut task = bridge.task;
            if tokio::time::timeout(BRIDGE_DRAIN_TIMEOUT, &mut task)
                .await
                .is_err()
            {
                task.abort();
            }
        }

        if let Err(e) = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStopped))
        {
            warn!(error = %e, "Failed to log service shutdown");
        }

        self.ipc.shutdown();
        info!("Shutdown complete");
    }

    /// Send queued local changes whose throttle window has opened
    fn publish_due(&mut self, now_mono: MonotonicInstant) {
        let Some(bridge) = &self.bridge else {
            return;
        };
        // Left pending while offline; the full push on connect covers them
        if !bridge.remote.state().is_connected() {
            return;
        }

        for publication in self.clock.take_due_publications(now_mono) {
            if let Err(e) = bridge.remote.publish(&publication) {
                warn!(kind = %publication.kind, error = %e, "Publish failed");
            }
        }
    }

    fn handle_bridge_event(&mut self, event: BridgeEvent) {
        let now = minertimer_util::now();
        let now_mono = MonotonicInstant::now();

        let Some(bridge) = &mut self.bridge else {
            return;
        };

        match event {
            BridgeEvent::StateChanged(ConnectionState::Connected) => {
                let states = self.clock.all_publications(now_mono);
                if let Err(e) = bridge.remote.on_connected(&states) {
                    warn!(error = %e, "Failed to announce entities");
                }
                self.set_remote_link(ConnectionState::Connected);
            }

            BridgeEvent::StateChanged(state) => {
                if bridge.remote.set_state(state) {
                    self.set_remote_link(state);
                }
            }

            BridgeEvent::Message { topic, payload } => {
                match bridge.remote.handle_message(&topic, &payload, now) {
                    Ok((kind, value)) => {
                        if let Some(event) = self.clock.apply_remote(kind, value, now) {
                            self.dispatch_core_events(vec![event], now);
                        }
                    }
                    Err(rejection) => {
                        debug!(topic = %topic, reason = %rejection, "Inbound message ignored");
                    }
                }
            }
        }
    }

    fn set_remote_link(&mut self, state: ConnectionState) {
        if self.clock.remote_link() == state {
            return;
        }
        self.clock.set_remote_link(state);
        self.ipc
            .broadcast_event(Event::new(EventPayload::RemoteLinkChanged { state }));
    }

    /// Forward core events to subscribers; value changes collapse into one snapshot
    fn dispatch_core_events(&self, events: Vec<CoreEvent>, now: DateTime<Local>) {
        let mut state_changed = false;

        for event in events {
            match event {
                CoreEvent::ValueChanged { .. } => {
                    state_changed = true;
                }

                CoreEvent::ProcessDiscovered { pid, name } => {
                    debug!(pid, name = %name, "Process discovered");
                    state_changed = true;
                }

                CoreEvent::ProcessLost { pid } => {
                    debug!(pid, "Process lost");
                    state_changed = true;
                }

                CoreEvent::ProcessSuspended {
                    pid,
                    played_minutes,
                    limit_minutes,
                } => {
                    self.ipc
                        .broadcast_event(Event::new(EventPayload::ProcessSuspended {
                            pid,
                            played_minutes,
                            limit_minutes,
                        }));
                    state_changed = true;
                }

                CoreEvent::ProcessResumed {
                    pid,
                    played_minutes,
                    limit_minutes,
                } => {
                    self.ipc
                        .broadcast_event(Event::new(EventPayload::ProcessResumed {
                            pid,
                            played_minutes,
                            limit_minutes,
                        }));
                    state_changed = true;
                }

                CoreEvent::DayRolledOver {
                    weekend,
                    current_limit,
                } => {
                    self.ipc.broadcast_event(Event::new(EventPayload::DayRolledOver {
                        weekend,
                        current_limit,
                    }));
                    state_changed = true;
                }

                CoreEvent::Warning {
                    threshold_minutes,
                    remaining_minutes,
                } => {
                    self.ipc.broadcast_event(Event::new(EventPayload::WarningIssued {
                        threshold_minutes,
                        remaining_minutes,
                    }));
                }
            }
        }

        if state_changed {
            self.ipc
                .broadcast_event(Event::new(EventPayload::StateChanged(
                    self.clock.snapshot(now),
                )));
        }
    }

    async fn handle_ipc_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                if !self.rate_limiter.check(&client_id) {
                    let response = Response::error(
                        request.request_id,
                        ErrorInfo::new(ErrorCode::RateLimited, "Too many requests"),
                    );
                    let _ = self.ipc.send_response(&client_id, response).await;
                    return;
                }

                let response = self
                    .handle_command(&client_id, request.request_id, request.command)
                    .await;

                let _ = self.ipc.send_response(&client_id, response).await;
            }

            ServerMessage::ClientConnected { client_id, info } => {
                debug!(client_id = %client_id, uid = ?info.uid, "Client connected");
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Client disconnected");
                self.rate_limiter.remove_client(&client_id);
            }
        }
    }

    async fn handle_command(
        &mut self,
        client_id: &ClientId,
        request_id: u64,
        command: Command,
    ) -> Response {
        let now = minertimer_util::now();
        let command_name = command_name(&command);

        let outcome = match command {
            Command::GetState => {
                return Response::success(
                    request_id,
                    ResponsePayload::State(self.clock.snapshot(now)),
                );
            }

            Command::SubscribeEvents => {
                // Send the current state so the subscriber starts in sync
                self.ipc
                    .broadcast_event(Event::new(EventPayload::StateChanged(
                        self.clock.snapshot(now),
                    )));
                return Response::success(
                    request_id,
                    ResponsePayload::Subscribed {
                        client_id: client_id.clone(),
                    },
                );
            }

            Command::UnsubscribeEvents => {
                return Response::success(request_id, ResponsePayload::Unsubscribed);
            }

            Command::Ping => return Response::success(request_id, ResponsePayload::Pong),

            Command::AddTime { minutes, password } => {
                let before = self.clock.value(ValueKind::CurrentLimit);
                self.clock.add_time(minutes, &password, now).map(|events| {
                    let current_limit = self.clock.value(ValueKind::CurrentLimit);
                    (
                        events,
                        ResponsePayload::LimitExtended {
                            added_minutes: current_limit - before,
                            current_limit,
                        },
                    )
                })
            }

            Command::RequestMoreTime { password } => {
                let before = self.clock.value(ValueKind::CurrentLimit);
                self.clock.request_more_time(&password, now).map(|events| {
                    let current_limit = self.clock.value(ValueKind::CurrentLimit);
                    (
                        events,
                        ResponsePayload::LimitExtended {
                            added_minutes: current_limit - before,
                            current_limit,
                        },
                    )
                })
            }

            Command::ResetPlayedTime { password } => self
                .clock
                .reset_played_time(&password, now)
                .map(|events| (events, ResponsePayload::PlayedTimeReset)),

            Command::SimulateMidnight { password } => {
                self.clock.simulate_midnight(&password, now).map(|events| {
                    let current_limit = self.clock.value(ValueKind::CurrentLimit);
                    (events, ResponsePayload::DayRolledOver { current_limit })
                })
            }
        };

        match outcome {
            Ok((events, payload)) => {
                self.dispatch_core_events(events, now);
                self.publish_due(MonotonicInstant::now());
                Response::success(request_id, payload)
            }
            Err(e) => {
                if matches!(e, MinerTimerError::PermissionDenied(_)) {
                    let uid = self
                        .ipc
                        .get_client_info(client_id)
                        .await
                        .and_then(|info| info.uid);
                    let _ = self.store.append_audit(AuditEvent::new(
                        AuditEventType::PermissionDenied {
                            command: command_name.to_string(),
                            uid,
                        },
                    ));
                }
                Response::error(request_id, error_info(&e))
            }
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::GetState => "get_state",
        Command::AddTime { .. } => "add_time",
        Command::RequestMoreTime { .. } => "request_more_time",
        Command::ResetPlayedTime { .. } => "reset_played_time",
        Command::SimulateMidnight { .. } => "simulate_midnight",
        Command::SubscribeEvents => "subscribe_events",
        Command::UnsubscribeEvents => "unsubscribe_events",
        Command::Ping => "ping",
    }
}

fn error_info(e: &MinerTimerError) -> ErrorInfo {
    let code = match e {
        MinerTimerError::PermissionDenied(_) => ErrorCode::PermissionDenied,
        MinerTimerError::ValidationError(_) => ErrorCode::InvalidValue,
    };
    ErrorInfo::new(code, e.to_string())
}

/// Next broker event, or never when the bridge is disabled
async fn recv_bridge_event(
    events: &mut Option<mpsc::UnboundedReceiver<BridgeEvent>>,
) -> Option<BridgeEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "minertimerd starting");

    if minertimer_util::is_mock_time_active() {
        warn!(now = %minertimer_util::now(), "Mock time is active");
    }

    let service = Service::new(&args).await?;
    service.run().await
}
