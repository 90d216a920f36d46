//! Transport layer for the server event channel
//!
//! This module provides the transport abstraction and its websocket
//! implementation. The transport owns the long-lived bidirectional channel
//! to the ingestion server; the rest of the agent only ever sees discrete
//! [`Notification`]s and sends named events with a text payload.

use thiserror::Error;
use tokio::sync::mpsc;

pub mod ws;

/// Inbound notification delivered by the transport session.
///
/// The session state machine consumes these through a pure transition
/// function, so the agent core can be exercised without a live connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// The event channel is established.
    Connected,
    /// The event channel dropped; the transport will retry on its own
    /// fixed interval.
    Disconnected,
    /// A named event arrived, delivered as raw text.
    Event(String),
    /// The transport surfaced an error without dropping the channel.
    Error(String),
    /// The server acknowledged a prior send.
    Ack(String),
}

/// Transport session errors.
///
/// Connection drops are recovered by the transport's own retry loop; these
/// errors are reported, never fatal to the agent.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("not connected")]
    NotConnected,
    #[error("send failed")]
    SendFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("serialization error")]
    Serialization(#[from] serde_json::Error),
}

/// Transport trait for the server event channel.
///
/// Abstracts the websocket session so the agent can be driven by a mock in
/// tests. Implementations own reconnection; `connect` returns once the
/// session supervisor is running, not necessarily once the first connection
/// attempt succeeds.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Start the session and its reconnect supervisor.
    async fn connect(&mut self) -> Result<(), Self::Error>;

    /// Stop the session and tear down the supervisor.
    async fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Send a named event with an already-serialized JSON payload.
    async fn send_event(&self, event: &str, payload: &str) -> Result<(), Self::Error>;

    /// Whether the event channel is currently established.
    fn is_connected(&self) -> bool;

    /// Set the channel on which inbound notifications are delivered.
    fn set_notification_sender(&self, sender: mpsc::Sender<Notification>);
}

/// Type alias for the production transport.
pub type WsTransport = ws::WsSession;
