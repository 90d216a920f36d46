//! Telemetry scheduling and envelope building
//!
//! The scheduler is tick-driven: the control loop polls it on its own
//! cadence, and a send cycle fires when the configured interval has elapsed
//! and the session is registered. The elapsed timer resets to the poll
//! instant, not to the overshoot, so missed ticks do not accumulate.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::protocol::{DeviceIdentity, Envelope, Measurement, TelemetryPayload, TOPIC_SENSORS};

pub mod sensors;

pub use sensors::{SensorReader, SimulatedSensors};

/// Default send interval.
pub const DEFAULT_SEND_INTERVAL_MS: u64 = 10_000;
/// Lower bound accepted for the send interval, locally and via
/// `set_interval` commands.
pub const MIN_SEND_INTERVAL_MS: u64 = 1000;

/// Milliseconds-since-boot clock backing every protocol timestamp.
#[derive(Debug, Clone)]
pub struct Clock {
    boot: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            boot: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.boot.elapsed().as_millis() as u64
    }

    /// Whole seconds since boot, as reported in status uptime.
    pub fn uptime_secs(&self) -> u64 {
        self.boot.elapsed().as_secs()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// How a send cycle maps metrics onto envelopes.
///
/// Policy choice wired through configuration, never switched at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SendMode {
    /// One envelope on the `sensors` topic carrying one measurement per
    /// metric, all stamped with a single clock read.
    #[default]
    Combined,
    /// One envelope per metric on the metric's own topic, each stamped at
    /// its own build instant. The resulting per-envelope jitter is
    /// accepted behavior, not an error.
    PerMetric,
}

/// A tracked metric: the wire `type` and its fixed unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub kind: String,
    pub unit: String,
}

impl Metric {
    /// Look up a metric by kind. Returns `None` for kinds the agent has no
    /// unit mapping for.
    pub fn for_kind(kind: &str) -> Option<Self> {
        unit_for(kind).map(|unit| Self {
            kind: kind.to_string(),
            unit: unit.to_string(),
        })
    }
}

/// Fixed unit table for the supported metric kinds.
pub fn unit_for(kind: &str) -> Option<&'static str> {
    match kind {
        "temperature" => Some("celsius"),
        "humidity" => Some("percent"),
        "pressure" => Some("hPa"),
        "light" => Some("lux"),
        _ => None,
    }
}

/// Tick-driven telemetry scheduler.
#[derive(Debug)]
pub struct TelemetryScheduler {
    interval_ms: u64,
    last_send_ms: u64,
    mode: SendMode,
    metrics: Vec<Metric>,
}

impl TelemetryScheduler {
    /// `interval_ms` is assumed validated against [`MIN_SEND_INTERVAL_MS`]
    /// by configuration loading.
    pub fn new(interval_ms: u64, mode: SendMode, metrics: Vec<Metric>) -> Self {
        Self {
            interval_ms,
            last_send_ms: 0,
            mode,
            metrics,
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn mode(&self) -> SendMode {
        self.mode
    }

    /// Update the send period. Values below [`MIN_SEND_INTERVAL_MS`] are
    /// rejected and leave the interval unchanged.
    pub fn set_interval(&mut self, interval_ms: u64) -> bool {
        if interval_ms < MIN_SEND_INTERVAL_MS {
            return false;
        }
        self.interval_ms = interval_ms;
        true
    }

    /// Whether a send cycle is due at `now_ms`. When due, the elapsed
    /// timer resets to `now_ms`.
    pub fn due(&mut self, now_ms: u64) -> bool {
        if now_ms.saturating_sub(self.last_send_ms) >= self.interval_ms {
            self.last_send_ms = now_ms;
            true
        } else {
            false
        }
    }

    /// Build the envelopes for one send cycle.
    pub fn build_cycle(
        &self,
        sensors: &mut dyn SensorReader,
        identity: &DeviceIdentity,
        api_key: &str,
        clock: &Clock,
    ) -> Vec<Envelope> {
        match self.mode {
            SendMode::Combined => vec![self.build_combined(sensors, identity, api_key, clock)],
            SendMode::PerMetric => self.build_per_metric(sensors, identity, api_key, clock),
        }
    }

    fn build_combined(
        &self,
        sensors: &mut dyn SensorReader,
        identity: &DeviceIdentity,
        api_key: &str,
        clock: &Clock,
    ) -> Envelope {
        let timestamp = clock.now_ms();
        let measurements = self
            .metrics
            .iter()
            .map(|metric| {
                Measurement::new(
                    sensors.read(metric),
                    metric.unit.clone(),
                    metric.kind.clone(),
                    timestamp,
                )
            })
            .collect();

        Envelope::telemetry(
            api_key,
            &identity.name,
            TOPIC_SENSORS,
            TelemetryPayload {
                measurements,
                source: identity.name.clone(),
                device_time: timestamp,
            },
        )
    }

    fn build_per_metric(
        &self,
        sensors: &mut dyn SensorReader,
        identity: &DeviceIdentity,
        api_key: &str,
        clock: &Clock,
    ) -> Vec<Envelope> {
        self.metrics
            .iter()
            .map(|metric| {
                let timestamp = clock.now_ms();
                let measurement = Measurement::new(
                    sensors.read(metric),
                    metric.unit.clone(),
                    metric.kind.clone(),
                    timestamp,
                );
                Envelope::telemetry(
                    api_key,
                    &identity.name,
                    &metric.kind,
                    TelemetryPayload {
                        measurements: vec![measurement],
                        source: identity.name.clone(),
                        device_time: timestamp,
                    },
                )
            })
            .collect()
    }
}
