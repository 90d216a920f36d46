//! Remote command interpretation and device actions
//!
//! [`interpret`] is the pure half: it maps a decoded [`Command`] plus the
//! current registration status onto a [`CommandAction`] or a reported
//! rejection. The control loop performs the action through the
//! [`DeviceControl`] and [`DeviceMonitor`] seams, which firmware ports
//! implement against real hardware.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::protocol::Command;
use crate::telemetry::MIN_SEND_INTERVAL_MS;

/// Delay between accepting a restart command and performing it, so the
/// acknowledging log lines still make it out.
pub const RESTART_DELAY: Duration = Duration::from_secs(1);

/// Rejections reported while interpreting a command. Never fatal; the
/// command is dropped.
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("set_interval value out of range: {0:?}")]
    IntervalOutOfRange(Option<u64>),
}

/// Action the control loop performs for an accepted command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandAction {
    /// Restart the device after [`RESTART_DELAY`].
    ScheduleRestart { delay: Duration },
    /// Build and send a status envelope.
    SendStatus,
    /// Update the telemetry send period.
    SetInterval { interval_ms: u64 },
    /// Accepted but deliberately skipped (status while unregistered).
    Skip,
}

/// Map a command onto its action.
///
/// `status` requires a registered session and is silently skipped
/// otherwise. `set_interval` requires a value of at least
/// [`MIN_SEND_INTERVAL_MS`]; out-of-range or missing values are reported
/// no-ops. Unknown commands are reported and ignored.
pub fn interpret(command: &Command, registered: bool) -> Result<CommandAction, CommandError> {
    match command.command.as_str() {
        "restart" => Ok(CommandAction::ScheduleRestart {
            delay: RESTART_DELAY,
        }),
        "status" => {
            if registered {
                Ok(CommandAction::SendStatus)
            } else {
                debug!("Status command skipped - device not registered");
                Ok(CommandAction::Skip)
            }
        }
        "set_interval" => match command.value {
            Some(interval_ms) if interval_ms >= MIN_SEND_INTERVAL_MS => {
                Ok(CommandAction::SetInterval { interval_ms })
            }
            other => Err(CommandError::IntervalOutOfRange(other)),
        },
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

/// Point-in-time device status readings for the `status` topic. Uptime and
/// the report timestamp are stamped by the caller from the boot clock.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub ip: String,
    pub rssi: i32,
    pub free_heap: u64,
}

/// Device-level actions a command can trigger.
pub trait DeviceControl: Send + Sync {
    /// Restart the device after `delay`. Irreversible once performed.
    fn schedule_restart(&self, delay: Duration);
}

/// Source of device status readings.
pub trait DeviceMonitor: Send + Sync {
    fn snapshot(&self) -> StatusSnapshot;
}

/// Host-process implementation of [`DeviceControl`].
///
/// A host has no hardware reset line; the closest equivalent is exiting
/// cleanly and letting the process supervisor bring the agent back up.
#[derive(Debug, Default)]
pub struct HostControl;

impl DeviceControl for HostControl {
    fn schedule_restart(&self, delay: Duration) {
        info!(delay_ms = delay.as_millis() as u64, "Restart scheduled");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            info!("Restarting on server command");
            std::process::exit(0);
        });
    }
}

/// Host-process implementation of [`DeviceMonitor`].
///
/// Hosts expose no radio RSSI or heap counter; those readings are reported
/// as zero. Firmware ports implement the trait against real counters.
#[derive(Debug, Default)]
pub struct HostMonitor;

impl DeviceMonitor for HostMonitor {
    fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            ip: "0.0.0.0".to_string(),
            rssi: 0,
            free_heap: 0,
        }
    }
}
