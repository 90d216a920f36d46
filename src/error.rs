//! Crate-level error types
//!
//! Per-module error enums compose into [`AgentError`] at the control-loop
//! boundary. No variant is fatal to the agent: decode and command failures
//! drop the offending event, transport failures ride out the reconnect
//! cycle, and auth rejections suppress telemetry until a later successful
//! registration.

use thiserror::Error;

use crate::commands::CommandError;
use crate::config::ConfigError;
use crate::protocol::DecodeError;

/// Main error type for agent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("transport error: {0}")]
    Transport(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("registration rejected: {message}")]
    Auth { message: String },

    #[error("command error: {0}")]
    Command(#[from] CommandError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl AgentError {
    /// Wrap a concrete transport error.
    pub fn transport<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Transport(Box::new(error))
    }

    /// Create an auth rejection error.
    pub fn auth<S: Into<String>>(message: S) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }
}

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_constructor() {
        let error = AgentError::auth("invalid api key");
        assert!(matches!(error, AgentError::Auth { .. }));
        assert_eq!(error.to_string(), "registration rejected: invalid api key");
    }

    #[test]
    fn test_decode_error_converts() {
        let error: AgentError = DecodeError::MissingField("command").into();
        assert_eq!(
            error.to_string(),
            "decode error: missing required field: command"
        );
    }

    #[test]
    fn test_command_error_converts() {
        let error: AgentError = CommandError::Unknown("reboot".to_string()).into();
        assert!(error.to_string().contains("unknown command: reboot"));
    }
}
