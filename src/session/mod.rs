//! Session state machine
//!
//! Tracks connection and registration status and decides how to react to
//! transport notifications. [`SessionMachine::handle`] is a pure transition
//! function returning typed [`Effect`]s; the control loop performs the
//! actual sends and reporting. This replaces the connected/registered flag
//! pair a naive client would keep, so inconsistent combinations cannot be
//! represented.

use crate::protocol::{classify_server_event, decode_command, Command, DecodeError, ServerEvent};
use crate::transport::Notification;

/// Connection and registration status of the device session.
///
/// Owned exclusively by the [`SessionMachine`]; transitions happen only on
/// transport notifications or a matching registration confirmation. There
/// is no terminal state: `Disconnected` is always recoverable because the
/// transport retries on its own interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No event channel.
    #[default]
    Disconnected,
    /// Event channel up, registration not yet confirmed.
    Connected,
    /// Server confirmed the registration handshake.
    Registered,
}

/// Action the control loop must take after a state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Emit the registration request envelope.
    SendRegistration,
    /// Hand a decoded remote command to the dispatcher.
    Dispatch(Command),
    /// The server rejected the credential; registration stays pending
    /// until the next reconnect cycle.
    AuthFailure,
    /// An inbound command could not be decoded; the event is dropped.
    DecodeFailure(DecodeError),
}

/// Drives [`SessionState`] from transport notifications.
#[derive(Debug, Default)]
pub struct SessionMachine {
    state: SessionState,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self {
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether telemetry sends are currently allowed.
    pub fn is_registered(&self) -> bool {
        self.state == SessionState::Registered
    }

    /// Apply one transport notification and return the effects to perform.
    ///
    /// Pure: no I/O, no clock. Error and ack notifications carry no
    /// transition and no effect; the caller logs them for observability.
    pub fn handle(&mut self, notification: &Notification) -> Vec<Effect> {
        match notification {
            Notification::Connected => {
                self.state = SessionState::Connected;
                vec![Effect::SendRegistration]
            }
            Notification::Disconnected => {
                self.state = SessionState::Disconnected;
                Vec::new()
            }
            Notification::Event(text) => self.handle_event(text),
            Notification::Error(_) | Notification::Ack(_) => Vec::new(),
        }
    }

    fn handle_event(&mut self, text: &str) -> Vec<Effect> {
        // Events can only be acted on over an established channel.
        if self.state == SessionState::Disconnected {
            return Vec::new();
        }

        match classify_server_event(text) {
            ServerEvent::RegistrationConfirmed => {
                self.state = SessionState::Registered;
                Vec::new()
            }
            ServerEvent::AuthRejected => vec![Effect::AuthFailure],
            ServerEvent::Command => match decode_command(text) {
                Ok(command) => vec![Effect::Dispatch(command)],
                Err(e) => vec![Effect::DecodeFailure(e)],
            },
            // Plain successes, foreign errors, and unknown shapes carry no
            // state change; unknown shapes are ignored for forward
            // compatibility.
            ServerEvent::Success | ServerEvent::Error | ServerEvent::Other => Vec::new(),
        }
    }
}
