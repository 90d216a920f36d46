//! Observability for the telemetry agent
//!
//! Structured logging is the agent's only user-visible surface: every
//! absorbed failure (decode errors, rejected commands, dropped channels)
//! is reported here and nowhere else.

pub mod logging;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, LogFormat};
