//! Mock implementations for testing
//!
//! Provides mock Transport, SensorReader, DeviceControl, and DeviceMonitor
//! implementations to enable comprehensive testing without external
//! dependencies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::commands::{DeviceControl, DeviceMonitor, StatusSnapshot};
use crate::telemetry::{Metric, SensorReader};
use crate::transport::{Notification, Transport, TransportError};

/// A sent event: `(event_name, payload_text)`.
pub type SentEvent = (String, String);

/// Mock transport for testing.
///
/// Records every sent event; tests clone the `sent_events` handle before
/// moving the mock into an agent.
#[derive(Debug, Default)]
pub struct MockTransport {
    pub sent_events: Arc<Mutex<Vec<SentEvent>>>,
    pub should_fail: bool,
    connected: Arc<AtomicBool>,
    notify_tx: Arc<StdMutex<Option<mpsc::Sender<Notification>>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub async fn get_sent_events(&self) -> Vec<SentEvent> {
        self.sent_events.lock().await.clone()
    }

    pub async fn clear_history(&self) {
        self.sent_events.lock().await.clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = TransportError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        if self.should_fail {
            return Err(TransportError::ConnectionFailed(
                "mock connection failure".to_string(),
            ));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn send_event(&self, event: &str, payload: &str) -> Result<(), Self::Error> {
        if self.should_fail {
            return Err(TransportError::NotConnected);
        }

        let mut sent = self.sent_events.lock().await;
        sent.push((event.to_string(), payload.to_string()));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn set_notification_sender(&self, sender: mpsc::Sender<Notification>) {
        if let Ok(mut notify_tx) = self.notify_tx.lock() {
            *notify_tx = Some(sender);
        }
    }
}

/// Mock sensor source returning a constant value for every metric.
#[derive(Debug)]
pub struct MockSensors {
    value: f64,
    pub reads: Vec<String>,
}

impl MockSensors {
    pub fn constant(value: f64) -> Self {
        Self {
            value,
            reads: Vec::new(),
        }
    }
}

impl SensorReader for MockSensors {
    fn read(&mut self, metric: &Metric) -> f64 {
        self.reads.push(metric.kind.clone());
        self.value
    }
}

/// Mock device control recording scheduled restarts.
#[derive(Debug, Default)]
pub struct MockDeviceControl {
    pub restarts: Arc<StdMutex<Vec<Duration>>>,
}

impl MockDeviceControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduled_restarts(&self) -> Vec<Duration> {
        self.restarts.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl DeviceControl for MockDeviceControl {
    fn schedule_restart(&self, delay: Duration) {
        if let Ok(mut restarts) = self.restarts.lock() {
            restarts.push(delay);
        }
    }
}

/// Device monitor returning a fixed snapshot.
#[derive(Debug, Clone)]
pub struct FixedMonitor {
    pub snapshot: StatusSnapshot,
}

impl Default for FixedMonitor {
    fn default() -> Self {
        Self {
            snapshot: StatusSnapshot {
                ip: "192.168.1.40".to_string(),
                rssi: -61,
                free_heap: 151_264,
            },
        }
    }
}

impl DeviceMonitor for FixedMonitor {
    fn snapshot(&self) -> StatusSnapshot {
        self.snapshot.clone()
    }
}
