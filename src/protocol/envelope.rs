//! Envelope and payload structures for outbound messages
//!
//! Every message to the server is an [`Envelope`]: the device credential and
//! identity, a logical topic, and a topic-specific payload. Serialization
//! uses struct declaration order, so encoded field order is deterministic.

use serde::{Deserialize, Serialize};

use super::DecodeError;

/// Event name for the registration handshake.
pub const EVENT_REGISTER: &str = "device_register";
/// Event name for telemetry and status reports.
pub const EVENT_TELEMETRY: &str = "telemetry";

/// Topic carried by the registration envelope.
pub const TOPIC_REGISTER: &str = "register";
/// Topic for combined sensor reports.
pub const TOPIC_SENSORS: &str = "sensors";
/// Topic for device status reports.
pub const TOPIC_STATUS: &str = "status";

/// Device identity configured once at startup.
///
/// The capability list is fixed for the process lifetime and is joined with
/// commas on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceIdentity {
    pub name: String,
    pub capabilities: Vec<String>,
}

impl DeviceIdentity {
    pub fn new<S: Into<String>>(name: S, capabilities: Vec<String>) -> Self {
        Self {
            name: name.into(),
            capabilities,
        }
    }

    /// Capability list in wire form: `"temperature,humidity,pressure,light"`.
    pub fn capabilities_joined(&self) -> String {
        self.capabilities.join(",")
    }
}

/// Single timestamped metric reading.
///
/// Built fresh for every send and never mutated afterwards. The timestamp is
/// milliseconds since agent boot, matching the device-local clock the server
/// expects in `device_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    pub unit: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: u64,
}

impl Measurement {
    /// Build a measurement. `unit` and `kind` must be non-empty.
    pub fn new<U: Into<String>, K: Into<String>>(value: f64, unit: U, kind: K, timestamp: u64) -> Self {
        let unit = unit.into();
        let kind = kind.into();
        assert!(!unit.is_empty(), "measurement unit must be non-empty");
        assert!(!kind.is_empty(), "measurement kind must be non-empty");
        Self {
            value,
            unit,
            kind,
            timestamp,
        }
    }
}

/// Payload of the registration handshake envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationPayload {
    pub action: String,
    pub capabilities: String,
}

impl RegistrationPayload {
    pub fn for_device(identity: &DeviceIdentity) -> Self {
        Self {
            action: "register".to_string(),
            capabilities: identity.capabilities_joined(),
        }
    }
}

/// Payload carrying one or more measurements.
///
/// `measurements` holds at least one entry; insertion order is preserved but
/// carries no meaning beyond display. `device_time` is the device clock at
/// build time, in milliseconds since boot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPayload {
    pub measurements: Vec<Measurement>,
    pub source: String,
    pub device_time: u64,
}

/// Payload for the `status` topic, sent in response to a `status` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub ip: String,
    pub rssi: i32,
    pub uptime: u64,
    pub free_heap: u64,
    pub timestamp: u64,
}

/// Topic-specific payload variants.
///
/// Untagged on the wire; the field sets of the three variants are disjoint,
/// so deserialization is unambiguous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Registration(RegistrationPayload),
    Telemetry(TelemetryPayload),
    Status(StatusPayload),
}

/// Top-level message wrapper sent to the server.
///
/// Invariant: `topic` is non-empty. Envelopes are constructed per send and
/// discarded after serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub api_key: String,
    pub device: String,
    pub topic: String,
    pub payload: Payload,
}

impl Envelope {
    /// Build the registration handshake envelope sent after every connect.
    pub fn registration(api_key: &str, identity: &DeviceIdentity) -> Self {
        Self {
            api_key: api_key.to_string(),
            device: identity.name.clone(),
            topic: TOPIC_REGISTER.to_string(),
            payload: Payload::Registration(RegistrationPayload::for_device(identity)),
        }
    }

    /// Build a telemetry envelope for the given topic.
    pub fn telemetry(api_key: &str, device: &str, topic: &str, payload: TelemetryPayload) -> Self {
        debug_assert!(!topic.is_empty());
        Self {
            api_key: api_key.to_string(),
            device: device.to_string(),
            topic: topic.to_string(),
            payload: Payload::Telemetry(payload),
        }
    }

    /// Build a status envelope on the fixed `status` topic.
    pub fn status(api_key: &str, device: &str, payload: StatusPayload) -> Self {
        Self {
            api_key: api_key.to_string(),
            device: device.to_string(),
            topic: TOPIC_STATUS.to_string(),
            payload: Payload::Status(payload),
        }
    }

    /// Serialize to the wire text format. Field order follows struct
    /// declaration order and is stable across calls.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse an envelope back from wire text.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))
    }
}
