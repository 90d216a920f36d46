//! Wire protocol types for the ingestion-server event channel
//!
//! This module defines the envelope and payload structures exchanged with the
//! data-ingestion server, inbound command decoding, and classification of
//! server responses.

pub mod command;
pub mod envelope;
pub mod response;

pub use command::{decode_command, Command};
pub use envelope::*;
pub use response::{classify_server_event, ServerEvent};

use thiserror::Error;

/// Errors produced while decoding inbound event payloads.
///
/// Decode failures never terminate the agent; the offending event is dropped
/// and the failure is reported through the session log.
#[derive(Debug, Error, PartialEq, Clone)]
pub enum DecodeError {
    /// The payload could not be parsed into the expected shape.
    #[error("malformed event payload: {0}")]
    Malformed(String),
    /// The payload parsed but a required field was absent.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}
