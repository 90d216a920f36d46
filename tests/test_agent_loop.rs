//! Agent control-loop behavior tests
//!
//! Tests drive the agent through its public notification and tick entry
//! points with mock collaborators, covering the registration handshake,
//! telemetry gating, and remote command handling end to end without a live
//! server.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use iotagent::agent::Agent;
use iotagent::config::{AgentConfig, DeviceSection, ServerSection, TelemetrySection};
use iotagent::protocol::{Envelope, Payload, EVENT_REGISTER, EVENT_TELEMETRY};
use iotagent::session::SessionState;
use iotagent::telemetry::SendMode;
use iotagent::testing::{FixedMonitor, MockDeviceControl, MockSensors, MockTransport, SentEvent};
use iotagent::transport::Notification;
use tokio::sync::Mutex;

const REGISTERED_EVENT: &str = r#"["device_register",{"response":"device registered"}]"#;
const AUTH_REJECTED_EVENT: &str = r#"["device_register",{"error":"invalid api key"}]"#;

type TestAgent = Agent<MockTransport, MockSensors, MockDeviceControl, FixedMonitor>;
type SentEvents = Arc<Mutex<Vec<SentEvent>>>;
type Restarts = Arc<StdMutex<Vec<Duration>>>;

fn test_config(mode: SendMode) -> AgentConfig {
    AgentConfig {
        device: DeviceSection {
            name: "test-device".to_string(),
            capabilities: ["temperature", "humidity", "pressure", "light"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        },
        server: ServerSection {
            host: "localhost".to_string(),
            port: 5000,
            api_key_env: "INGEST_API_KEY".to_string(),
            reconnect_interval_ms: 5000,
        },
        telemetry: TelemetrySection {
            send_interval_ms: 10_000,
            mode,
        },
    }
}

fn build_agent(mode: SendMode) -> (TestAgent, SentEvents, Restarts) {
    let transport = MockTransport::new();
    let sent_events = transport.sent_events.clone();
    let control = MockDeviceControl::new();
    let restarts = control.restarts.clone();

    let agent = Agent::new(
        &test_config(mode),
        "test-api-key".to_string(),
        transport,
        MockSensors::constant(21.5),
        control,
        FixedMonitor::default(),
    );
    (agent, sent_events, restarts)
}

async fn sent(events: &SentEvents) -> Vec<SentEvent> {
    events.lock().await.clone()
}

async fn clear(events: &SentEvents) {
    events.lock().await.clear();
}

async fn telemetry_count(events: &SentEvents) -> usize {
    sent(events)
        .await
        .iter()
        .filter(|(event, _)| event == EVENT_TELEMETRY)
        .count()
}

async fn register(agent: &mut TestAgent) {
    agent.handle_notification(Notification::Connected).await;
    agent
        .handle_notification(Notification::Event(REGISTERED_EVENT.to_string()))
        .await;
    assert_eq!(agent.session_state(), SessionState::Registered);
}

fn command_event(json: &str) -> Notification {
    Notification::Event(json.to_string())
}

#[tokio::test]
async fn test_connect_sends_registration_before_any_telemetry() {
    let (mut agent, events, _) = build_agent(SendMode::Combined);

    // Scheduler interval has long elapsed before the channel comes up.
    agent.tick_at(60_000).await;
    agent.handle_notification(Notification::Connected).await;
    agent.tick_at(70_000).await;

    let events = sent(&events).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, EVENT_REGISTER);

    let envelope = Envelope::decode(&events[0].1).unwrap();
    assert_eq!(envelope.topic, "register");
    assert_eq!(envelope.device, "test-device");
    assert_eq!(envelope.api_key, "test-api-key");
    let Payload::Registration(payload) = envelope.payload else {
        panic!("expected registration payload");
    };
    assert_eq!(payload.action, "register");
    assert_eq!(payload.capabilities, "temperature,humidity,pressure,light");
}

#[tokio::test]
async fn test_no_telemetry_while_connected_but_unregistered() {
    let (mut agent, events, _) = build_agent(SendMode::Combined);

    agent.handle_notification(Notification::Connected).await;
    agent.tick_at(10_000).await;
    agent.tick_at(100_000).await;

    assert_eq!(telemetry_count(&events).await, 0);
    assert_eq!(agent.session_state(), SessionState::Connected);
}

#[tokio::test]
async fn test_combined_cycle_after_registration() {
    let (mut agent, events, _) = build_agent(SendMode::Combined);

    register(&mut agent).await;
    agent.tick_at(10_000).await;

    let telemetry: Vec<SentEvent> = sent(&events)
        .await
        .into_iter()
        .filter(|(event, _)| event == EVENT_TELEMETRY)
        .collect();
    assert_eq!(telemetry.len(), 1);

    let envelope = Envelope::decode(&telemetry[0].1).unwrap();
    assert_eq!(envelope.topic, "sensors");
    let Payload::Telemetry(payload) = envelope.payload else {
        panic!("expected telemetry payload");
    };
    assert_eq!(payload.measurements.len(), 4);
    assert_eq!(payload.source, "test-device");
    assert!(payload
        .measurements
        .iter()
        .all(|m| m.timestamp == payload.device_time));
}

#[tokio::test]
async fn test_per_metric_cycle_sends_one_envelope_per_capability() {
    let (mut agent, events, _) = build_agent(SendMode::PerMetric);

    register(&mut agent).await;
    agent.tick_at(10_000).await;

    let telemetry: Vec<SentEvent> = sent(&events)
        .await
        .into_iter()
        .filter(|(event, _)| event == EVENT_TELEMETRY)
        .collect();
    assert_eq!(telemetry.len(), 4);

    let topics: Vec<String> = telemetry
        .iter()
        .map(|(_, payload)| Envelope::decode(payload).unwrap().topic)
        .collect();
    assert_eq!(topics, vec!["temperature", "humidity", "pressure", "light"]);

    for (_, payload) in &telemetry {
        let envelope = Envelope::decode(payload).unwrap();
        let Payload::Telemetry(payload) = envelope.payload else {
            panic!("expected telemetry payload");
        };
        assert_eq!(payload.measurements.len(), 1);
    }
}

#[tokio::test]
async fn test_disconnect_resets_and_reconnect_reregisters_once() {
    let (mut agent, events, _) = build_agent(SendMode::Combined);

    register(&mut agent).await;
    agent.handle_notification(Notification::Disconnected).await;
    assert_eq!(agent.session_state(), SessionState::Disconnected);

    agent.handle_notification(Notification::Connected).await;
    assert_eq!(agent.session_state(), SessionState::Connected);

    let registrations = sent(&events)
        .await
        .iter()
        .filter(|(event, _)| event == EVENT_REGISTER)
        .count();
    assert_eq!(registrations, 2);

    // Telemetry stays gated until the new handshake completes.
    agent.tick_at(200_000).await;
    assert_eq!(telemetry_count(&events).await, 0);
}

#[tokio::test]
async fn test_set_interval_command_updates_cadence() {
    let (mut agent, events, _) = build_agent(SendMode::Combined);

    register(&mut agent).await;
    agent.tick_at(10_000).await;
    clear(&events).await;

    agent
        .handle_notification(command_event(
            r#"["telemetry",{"command":"set_interval","value":5000}]"#,
        ))
        .await;
    assert_eq!(agent.send_interval_ms(), 5000);

    agent.tick_at(14_999).await;
    assert!(sent(&events).await.is_empty());

    agent.tick_at(15_000).await;
    assert_eq!(sent(&events).await.len(), 1);
}

#[tokio::test]
async fn test_set_interval_below_threshold_is_noop() {
    let (mut agent, _, _) = build_agent(SendMode::Combined);

    register(&mut agent).await;
    agent
        .handle_notification(command_event(
            r#"["telemetry",{"command":"set_interval","value":500}]"#,
        ))
        .await;

    assert_eq!(agent.send_interval_ms(), 10_000);
}

#[tokio::test]
async fn test_set_interval_missing_value_is_noop() {
    let (mut agent, _, _) = build_agent(SendMode::Combined);

    register(&mut agent).await;
    agent
        .handle_notification(command_event(r#"["telemetry",{"command":"set_interval"}]"#))
        .await;

    assert_eq!(agent.send_interval_ms(), 10_000);
}

#[tokio::test]
async fn test_status_command_sends_status_envelope() {
    let (mut agent, events, _) = build_agent(SendMode::Combined);

    register(&mut agent).await;
    clear(&events).await;

    agent
        .handle_notification(command_event(r#"["telemetry",{"command":"status"}]"#))
        .await;

    let events = sent(&events).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, EVENT_TELEMETRY);

    let envelope = Envelope::decode(&events[0].1).unwrap();
    assert_eq!(envelope.topic, "status");
    let Payload::Status(payload) = envelope.payload else {
        panic!("expected status payload");
    };
    assert_eq!(payload.ip, "192.168.1.40");
    assert_eq!(payload.rssi, -61);
    assert_eq!(payload.free_heap, 151_264);
}

#[tokio::test]
async fn test_status_command_skipped_when_not_registered() {
    let (mut agent, events, _) = build_agent(SendMode::Combined);

    agent.handle_notification(Notification::Connected).await;
    clear(&events).await;

    agent
        .handle_notification(command_event(r#"["telemetry",{"command":"status"}]"#))
        .await;

    assert!(sent(&events).await.is_empty());
}

#[tokio::test]
async fn test_restart_command_schedules_restart() {
    let (mut agent, _, restarts) = build_agent(SendMode::Combined);

    agent.handle_notification(Notification::Connected).await;
    agent
        .handle_notification(command_event(r#"["telemetry",{"command":"restart"}]"#))
        .await;

    assert_eq!(*restarts.lock().unwrap(), vec![Duration::from_secs(1)]);
}

#[tokio::test]
async fn test_unknown_command_is_absorbed() {
    let (mut agent, events, restarts) = build_agent(SendMode::Combined);

    register(&mut agent).await;
    clear(&events).await;

    agent
        .handle_notification(command_event(r#"["telemetry",{"command":"reboot"}]"#))
        .await;

    assert!(sent(&events).await.is_empty());
    assert!(restarts.lock().unwrap().is_empty());
    assert_eq!(agent.session_state(), SessionState::Registered);
}

#[tokio::test]
async fn test_malformed_command_event_is_absorbed() {
    let (mut agent, events, _) = build_agent(SendMode::Combined);

    agent.handle_notification(Notification::Connected).await;
    clear(&events).await;

    agent
        .handle_notification(command_event(r#"["telemetry",{"command":5}]"#))
        .await;

    assert!(sent(&events).await.is_empty());
    assert_eq!(agent.session_state(), SessionState::Connected);
}

#[tokio::test]
async fn test_auth_rejection_keeps_session_connected_and_gated() {
    let (mut agent, events, _) = build_agent(SendMode::Combined);

    agent.handle_notification(Notification::Connected).await;
    agent
        .handle_notification(Notification::Event(AUTH_REJECTED_EVENT.to_string()))
        .await;

    assert_eq!(agent.session_state(), SessionState::Connected);

    agent.tick_at(100_000).await;
    assert_eq!(telemetry_count(&events).await, 0);
}

#[tokio::test]
async fn test_send_failures_are_absorbed() {
    let mut agent = Agent::new(
        &test_config(SendMode::Combined),
        "test-api-key".to_string(),
        MockTransport::with_failure(),
        MockSensors::constant(21.5),
        MockDeviceControl::new(),
        FixedMonitor::default(),
    );

    // Registration send fails; the agent reports it and stays up.
    agent.handle_notification(Notification::Connected).await;
    assert_eq!(agent.session_state(), SessionState::Connected);
}

#[tokio::test]
async fn test_error_and_ack_notifications_are_reported_only() {
    let (mut agent, events, _) = build_agent(SendMode::Combined);

    register(&mut agent).await;
    clear(&events).await;

    agent
        .handle_notification(Notification::Error("transport timeout".to_string()))
        .await;
    agent
        .handle_notification(Notification::Ack("2".to_string()))
        .await;

    assert!(sent(&events).await.is_empty());
    assert_eq!(agent.session_state(), SessionState::Registered);
}
