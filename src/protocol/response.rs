//! Classification of inbound server events
//!
//! The server's response schema is not published, so events are classified
//! by the marker substrings its responses are known to carry. The scan is
//! isolated here so a typed response schema can replace it in one place if
//! the wire format ever becomes a contract.

/// Success responses carry a `response` field.
const MARKER_SUCCESS: &str = "\"response\"";
/// Registration confirmations embed this phrase in the response text.
const MARKER_REGISTERED: &str = "\"device registered\"";
/// Error responses carry an `error` field.
const MARKER_ERROR: &str = "\"error\"";
/// Credential rejections embed this phrase in the error text.
const MARKER_INVALID_KEY: &str = "\"invalid api key\"";
/// Command events carry a `command` field.
const MARKER_COMMAND: &str = "\"command\"";

/// Classified inbound server event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerEvent {
    /// Success response confirming device registration.
    RegistrationConfirmed,
    /// Success response unrelated to registration.
    Success,
    /// Error response rejecting the device credential.
    AuthRejected,
    /// Any other error response.
    Error,
    /// Remote command; decode with [`super::decode_command`].
    Command,
    /// Unrecognized payload shape, ignored for forward compatibility.
    Other,
}

/// Classify raw inbound event text by its markers.
///
/// Success markers win over error markers, which win over command markers;
/// a success response that merely mentions a command is still a success.
pub fn classify_server_event(text: &str) -> ServerEvent {
    if text.contains(MARKER_SUCCESS) {
        if text.contains(MARKER_REGISTERED) {
            ServerEvent::RegistrationConfirmed
        } else {
            ServerEvent::Success
        }
    } else if text.contains(MARKER_ERROR) {
        if text.contains(MARKER_INVALID_KEY) {
            ServerEvent::AuthRejected
        } else {
            ServerEvent::Error
        }
    } else if text.contains(MARKER_COMMAND) {
        ServerEvent::Command
    } else {
        ServerEvent::Other
    }
}
