//! Device Telemetry Agent
//!
//! A device-side agent that keeps a persistent event channel to a remote
//! data-ingestion server, registers the device, reports sensor measurements
//! on a fixed cadence, and reacts to remote commands.
//!
//! # Overview
//!
//! This crate provides:
//! - Wire envelope and measurement types with deterministic serialization
//! - A pure session state machine driving the registration handshake
//! - Remote command interpretation (`restart`, `status`, `set_interval`)
//! - A tick-driven telemetry scheduler with combined and per-metric modes
//! - A websocket transport session with fixed-interval reconnection
//!
//! # Quick Start
//!
//! ```rust
//! use iotagent::protocol::{DeviceIdentity, Envelope, TOPIC_SENSORS};
//! use iotagent::protocol::{Measurement, TelemetryPayload};
//!
//! let identity = DeviceIdentity::new(
//!     "esp32-lab-01",
//!     vec!["temperature".to_string(), "humidity".to_string()],
//! );
//!
//! let payload = TelemetryPayload {
//!     measurements: vec![Measurement::new(23.5, "celsius", "temperature", 12_000)],
//!     source: identity.name.clone(),
//!     device_time: 12_000,
//! };
//! let envelope = Envelope::telemetry("api-key", &identity.name, TOPIC_SENSORS, payload);
//!
//! let wire_text = envelope.encode().unwrap();
//! assert!(wire_text.contains("\"topic\":\"sensors\""));
//! ```

pub mod agent;
pub mod commands;
pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod session;
pub mod telemetry;
pub mod testing;
pub mod transport;

pub use agent::Agent;
pub use config::*;
pub use error::{AgentError, AgentResult};
pub use protocol::*;
pub use session::{Effect, SessionMachine, SessionState};
pub use telemetry::{SendMode, TelemetryScheduler};
pub use transport::{Notification, Transport, WsTransport};
