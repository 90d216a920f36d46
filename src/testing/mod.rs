//! Testing utilities and mock implementations
//!
//! This module provides mock implementations for testing the agent without
//! requiring a live ingestion server or sensor hardware.

pub mod mocks;

pub use mocks::*;
