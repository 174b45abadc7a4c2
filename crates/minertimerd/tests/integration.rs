//! Integration tests for minertimerd
//!
//! These tests drive the budget clock, the MQTT bridge and the control
//! socket together, the way the daemon wires them.

use chrono::{DateTime, Local, TimeZone};
use minertimer_api::{
    Command, ConnectionState, ProcessState, Response, ResponsePayload, ResponseResult,
    StatePublication, ValueKind,
};
use minertimer_config::{MqttSettings, Settings};
use minertimer_core::{BudgetClock, ConfiguredPassword, CoreEvent};
use minertimer_host_api::{ControlSignal, MockHost};
use minertimer_ipc::{IpcClient, IpcServer, ServerMessage};
use minertimer_mqtt::{InboundRejection, RecordingPublisher, RemoteBridge};
use minertimer_store::{AuditEventType, SqliteStore, Store, ValueRecord};
use minertimer_util::MonotonicInstant;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const PASSWORD: &str = "parent";

/// Wednesday afternoon
fn wednesday(h: u32, m: u32, s: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(2025, 12, 24, h, m, s).unwrap()
}

fn seed(store: &dyn Store, kind: ValueKind, value: f64, at: DateTime<Local>) {
    store
        .save_value(kind.key(), &ValueRecord { value, last_updated: at })
        .unwrap();
}

fn make_settings() -> Settings {
    let mut settings = Settings::default();
    settings.mqtt.enabled = true;
    settings
}

fn make_clock(store: Arc<dyn Store>, host: Arc<MockHost>, now: DateTime<Local>) -> BudgetClock {
    BudgetClock::new(
        &make_settings(),
        store,
        host,
        Arc::new(ConfiguredPassword::new(Some(PASSWORD.into()))),
        now,
    )
}

fn connected_bridge(
    clock: &mut BudgetClock,
    now_mono: MonotonicInstant,
) -> (RemoteBridge<RecordingPublisher>, RecordingPublisher) {
    let publisher = RecordingPublisher::new();
    let mut bridge = RemoteBridge::new(publisher.clone(), &MqttSettings::default(), 1440.0);
    let states = clock.all_publications(now_mono);
    bridge.on_connected(&states).unwrap();
    clock.set_remote_link(ConnectionState::Connected);
    (bridge, publisher)
}

fn publish_due(
    clock: &mut BudgetClock,
    bridge: &RemoteBridge<RecordingPublisher>,
    now_mono: MonotonicInstant,
) -> Vec<StatePublication> {
    let due = clock.take_due_publications(now_mono);
    for publication in &due {
        bridge.publish(publication).unwrap();
    }
    due
}

#[test]
fn test_suspend_exactly_once_at_limit() {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let now = wednesday(16, 0, 0);
    seed(store.as_ref(), ValueKind::CurrentLimit, 60.0, now);
    seed(store.as_ref(), ValueKind::PlayedTime, 59.9, now);

    let host = Arc::new(MockHost::new());
    host.spawn_process(4242, "java");
    let mut clock = make_clock(store, host.clone(), now);
    let t0 = MonotonicInstant::now();

    clock.tick(now, t0);
    let events = clock.tick(wednesday(16, 0, 12), t0 + Duration::from_secs(12));

    assert!((clock.value(ValueKind::PlayedTime) - 60.1).abs() < 1e-9);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, CoreEvent::ProcessSuspended { .. }))
            .count(),
        1
    );
    assert_eq!(clock.process().unwrap().state, ProcessState::Suspended);

    for s in 13..20 {
        clock.tick(wednesday(16, 0, s), t0 + Duration::from_secs(s as u64));
    }
    assert_eq!(host.signal_count(ControlSignal::Stop), 1);
    assert_eq!(host.signal_count(ControlSignal::Continue), 0);
}

#[test]
fn test_remote_limit_resumes_suspended_process() {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let now = wednesday(16, 0, 0);
    seed(store.as_ref(), ValueKind::CurrentLimit, 40.0, now);
    seed(store.as_ref(), ValueKind::PlayedTime, 45.0, now);

    let host = Arc::new(MockHost::new());
    host.spawn_process(4242, "java");
    let mut clock = make_clock(store.clone(), host.clone(), now);
    let t0 = MonotonicInstant::now();

    clock.tick(now, t0);
    assert_eq!(clock.process().unwrap().state, ProcessState::Suspended);

    let (bridge, _publisher) = connected_bridge(&mut clock, t0);
    let at = wednesday(16, 0, 5);
    let (kind, value) = bridge
        .handle_message("minertimer/current_limit/set", b"90", at)
        .unwrap();
    clock.apply_remote(kind, value, at);

    assert_eq!(clock.value(ValueKind::CurrentLimit), 90.0);
    assert_eq!(clock.value(ValueKind::PlayedTime), 45.0);
    // Not resumed until the next tick
    assert_eq!(host.signal_count(ControlSignal::Continue), 0);

    let events = clock.tick(wednesday(16, 0, 6), t0 + Duration::from_secs(6));
    assert!(events
        .iter()
        .any(|e| matches!(e, CoreEvent::ProcessResumed { pid: 4242, .. })));
    assert_eq!(host.signal_count(ControlSignal::Continue), 1);
    assert_eq!(clock.process().unwrap().state, ProcessState::Running);

    let audits = store.recent_audits(20).unwrap();
    assert!(audits.iter().any(|a| matches!(
        a.event,
        AuditEventType::RemoteUpdateApplied {
            kind: ValueKind::CurrentLimit,
            ..
        }
    )));
}

#[test]
fn test_remote_update_is_not_echoed() {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let host = Arc::new(MockHost::new());
    let now = wednesday(10, 0, 0);
    let mut clock = make_clock(store, host, now);
    let t0 = MonotonicInstant::now();

    let (bridge, publisher) = connected_bridge(&mut clock, t0);
    publisher.clear();

    let (kind, value) = bridge
        .handle_message("minertimer/weekend_limit/set", b"{\"value\": 150}", now)
        .unwrap();
    clock.apply_remote(kind, value, now);

    for secs in [1, 30, 61, 120, 300] {
        let t = t0 + Duration::from_secs(secs);
        clock.tick(now + chrono::Duration::seconds(secs as i64), t);
        publish_due(&mut clock, &bridge, t);
    }

    assert_eq!(clock.value(ValueKind::WeekendLimit), 150.0);
    assert!(publisher
        .publishes_to("minertimer/weekend_limit/state")
        .is_empty());
}

#[test]
fn test_local_change_published_after_window() {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let host = Arc::new(MockHost::new());
    let now = wednesday(10, 0, 0);
    let mut clock = make_clock(store, host, now);
    let t0 = MonotonicInstant::now();

    let (bridge, publisher) = connected_bridge(&mut clock, t0);
    publisher.clear();

    // Inside the window opened by the connect push
    clock.add_time(15.0, PASSWORD, now).unwrap();
    publish_due(&mut clock, &bridge, t0 + Duration::from_secs(10));
    assert!(publisher
        .publishes_to("minertimer/current_limit/state")
        .is_empty());

    // Next opportunity after the window
    publish_due(&mut clock, &bridge, t0 + Duration::from_secs(61));
    let sent = publisher.publishes_to("minertimer/current_limit/state");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload, "75");
    assert!(sent[0].retain);
}

#[test]
fn test_stale_inbound_message_dropped() {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let host = Arc::new(MockHost::new());
    let now = wednesday(8, 0, 0);
    let mut clock = make_clock(store, host, now);
    let t0 = MonotonicInstant::now();
    let (bridge, _publisher) = connected_bridge(&mut clock, t0);

    let yesterday = Local.with_ymd_and_hms(2025, 12, 23, 21, 0, 0).unwrap();
    let payload = format!(
        "{{\"value\": 500, \"timestamp\": {}}}",
        yesterday.timestamp()
    );

    let result = bridge.handle_message("minertimer/current_limit/set", payload.as_bytes(), now);
    assert!(matches!(result, Err(InboundRejection::Stale(_))));
    assert_eq!(clock.value(ValueKind::CurrentLimit), 60.0);
}

#[test]
fn test_weekend_rollover() {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let friday_night = Local.with_ymd_and_hms(2025, 12, 26, 23, 59, 50).unwrap();
    seed(store.as_ref(), ValueKind::WeekendLimit, 150.0, friday_night);
    seed(store.as_ref(), ValueKind::CurrentLimit, 90.0, friday_night);
    seed(store.as_ref(), ValueKind::PlayedTime, 70.0, friday_night);

    let host = Arc::new(MockHost::new());
    host.spawn_process(7, "java");
    let mut clock = make_clock(store, host, friday_night);
    let t0 = MonotonicInstant::now();

    clock.tick(friday_night, t0);
    let saturday = Local.with_ymd_and_hms(2025, 12, 27, 0, 0, 5).unwrap();
    let events = clock.tick(saturday, t0 + Duration::from_secs(15));

    assert!(events.contains(&CoreEvent::DayRolledOver {
        weekend: true,
        current_limit: 150.0,
    }));
    // The five seconds after midnight count toward Saturday
    let played = clock.value(ValueKind::PlayedTime);
    assert!((played - 5.0 / 60.0).abs() < 1e-9, "played = {}", played);
    assert_eq!(clock.value(ValueKind::CurrentLimit), 150.0);
}

#[test]
fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("minertimer.db");
    let now = wednesday(12, 0, 0);

    {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&db_path).unwrap());
        let host = Arc::new(MockHost::new());
        host.spawn_process(9, "java");
        let mut clock = make_clock(store, host, now);
        let t0 = MonotonicInstant::now();

        clock.tick(now, t0);
        clock.tick(wednesday(12, 3, 0), t0 + Duration::from_secs(180));
        clock.add_time(30.0, PASSWORD, wednesday(12, 3, 0)).unwrap();
    }

    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&db_path).unwrap());
    let clock = make_clock(store, Arc::new(MockHost::new()), wednesday(12, 10, 0));

    assert!((clock.value(ValueKind::PlayedTime) - 3.0).abs() < 1e-9);
    assert_eq!(clock.value(ValueKind::CurrentLimit), 90.0);
    assert_eq!(clock.last_observed(), wednesday(12, 3, 0));
}

#[tokio::test]
async fn test_control_socket_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("minertimer.sock");

    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let clock = Arc::new(Mutex::new(make_clock(
        store,
        Arc::new(MockHost::new()),
        minertimer_util::now(),
    )));

    let mut server = IpcServer::new(&socket_path);
    server.start().await.unwrap();
    let mut messages = server.take_message_receiver().await.unwrap();
    let server = Arc::new(server);

    let accept = server.clone();
    tokio::spawn(async move {
        let _ = accept.run().await;
    });

    let responder = server.clone();
    let responder_clock = clock.clone();
    tokio::spawn(async move {
        while let Some(msg) = messages.recv().await {
            let ServerMessage::Request { client_id, request } = msg else {
                continue;
            };
            let now = minertimer_util::now();
            let mut clock = responder_clock.lock().await;
            let response = match request.command {
                Command::GetState => Response::success(
                    request.request_id,
                    ResponsePayload::State(clock.snapshot(now)),
                ),
                Command::AddTime { minutes, password } => {
                    match clock.add_time(minutes, &password, now) {
                        Ok(_) => Response::success(
                            request.request_id,
                            ResponsePayload::LimitExtended {
                                added_minutes: minutes,
                                current_limit: clock.value(ValueKind::CurrentLimit),
                            },
                        ),
                        Err(e) => Response::error(
                            request.request_id,
                            minertimer_api::ErrorInfo::new(
                                minertimer_api::ErrorCode::PermissionDenied,
                                e.to_string(),
                            ),
                        ),
                    }
                }
                _ => Response::success(request.request_id, ResponsePayload::Pong),
            };
            let _ = responder.send_response(&client_id, response).await;
        }
    });

    // Weekday or weekend base, depending on when the test runs
    let initial_limit = clock.lock().await.value(ValueKind::CurrentLimit);
    let mut client = IpcClient::connect(&socket_path).await.unwrap();

    let response = client.send(Command::GetState).await.unwrap();
    match response.result {
        ResponseResult::Ok(ResponsePayload::State(snapshot)) => {
            assert_eq!(snapshot.played_time, 0.0);
            assert!(snapshot.process.is_none());
        }
        other => panic!("unexpected response: {:?}", other),
    }

    let denied = client
        .send(Command::AddTime {
            minutes: 15.0,
            password: "wrong".into(),
        })
        .await
        .unwrap();
    assert!(matches!(denied.result, ResponseResult::Err(_)));

    let granted = client
        .send(Command::AddTime {
            minutes: 15.0,
            password: PASSWORD.into(),
        })
        .await
        .unwrap();
    let current_limit = match granted.result {
        ResponseResult::Ok(ResponsePayload::LimitExtended { current_limit, .. }) => current_limit,
        other => panic!("unexpected response: {:?}", other),
    };
    assert_eq!(current_limit, initial_limit + 15.0);
    assert_eq!(clock.lock().await.value(ValueKind::CurrentLimit), current_limit);
}

#[test]
fn test_discovery_announces_every_value() {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let mut clock = make_clock(store, Arc::new(MockHost::new()), wednesday(9, 0, 0));
    let (_bridge, publisher) = connected_bridge(&mut clock, MonotonicInstant::now());

    let config = publisher.publishes_to("homeassistant/number/minertimer_mac/current_limit/config");
    assert_eq!(config.len(), 1);
    let json: serde_json::Value = serde_json::from_str(&config[0].payload).unwrap();
    assert_eq!(json["command_topic"], "minertimer/current_limit/set");
    assert_eq!(json["device"]["name"], "MinerTimer");

    assert_eq!(
        publisher
            .publishes_to("homeassistant/sensor/minertimer_mac/played_time/config")
            .len(),
        1
    );
    for kind in ValueKind::ALL {
        let topic = format!("minertimer/{}/state", kind.key());
        assert_eq!(publisher.publishes_to(&topic).len(), 1, "{}", topic);
    }
}
