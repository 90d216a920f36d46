//! Agent control loop
//!
//! One single-threaded cooperative loop services the transport notification
//! channel and the telemetry scheduler tick in sequence, never concurrently.
//! The session machine and the scheduler both write to the wire, but only
//! through this loop, so no further synchronization is needed; a
//! multi-threaded port must put a single-writer lock around
//! [`Transport::send_event`].

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::commands::{
    interpret, CommandAction, DeviceControl, DeviceMonitor, HostControl, HostMonitor,
};
use crate::config::AgentConfig;
use crate::error::{AgentError, AgentResult};
use crate::protocol::{
    Command, DeviceIdentity, Envelope, StatusPayload, EVENT_REGISTER, EVENT_TELEMETRY,
};
use crate::session::{Effect, SessionMachine, SessionState};
use crate::telemetry::{Clock, SensorReader, SimulatedSensors, TelemetryScheduler};
use crate::transport::{Notification, Transport, WsTransport};

/// Poll cadence of the scheduler tick.
const TICK_INTERVAL: Duration = Duration::from_millis(250);
/// Capacity of the transport notification channel.
const NOTIFICATION_BUFFER: usize = 100;

/// Device telemetry agent with injected collaborators.
pub struct Agent<T, S, C, M>
where
    T: Transport,
    S: SensorReader,
    C: DeviceControl,
    M: DeviceMonitor,
{
    identity: DeviceIdentity,
    api_key: String,
    machine: SessionMachine,
    scheduler: TelemetryScheduler,
    transport: T,
    notifications: mpsc::Receiver<Notification>,
    sensors: S,
    control: C,
    monitor: M,
    clock: Clock,
}

impl Agent<WsTransport, SimulatedSensors, HostControl, HostMonitor> {
    /// Build the production agent: websocket transport, simulated sensors,
    /// host restart/status collaborators.
    pub fn from_config(config: &AgentConfig) -> AgentResult<Self> {
        let api_key = config.api_key()?;
        let transport = WsTransport::new(
            config.server_url()?,
            Duration::from_millis(config.server.reconnect_interval_ms),
        );
        Ok(Self::new(
            config,
            api_key,
            transport,
            SimulatedSensors::new(),
            HostControl,
            HostMonitor,
        ))
    }
}

impl<T, S, C, M> Agent<T, S, C, M>
where
    T: Transport,
    S: SensorReader,
    C: DeviceControl,
    M: DeviceMonitor,
{
    pub fn new(
        config: &AgentConfig,
        api_key: String,
        transport: T,
        sensors: S,
        control: C,
        monitor: M,
    ) -> Self {
        let (notify_tx, notify_rx) = mpsc::channel(NOTIFICATION_BUFFER);
        transport.set_notification_sender(notify_tx);

        Self {
            identity: config.identity(),
            api_key,
            machine: SessionMachine::new(),
            scheduler: TelemetryScheduler::new(
                config.telemetry.send_interval_ms,
                config.telemetry.mode,
                config.metrics(),
            ),
            transport,
            notifications: notify_rx,
            sensors,
            control,
            monitor,
            clock: Clock::new(),
        }
    }

    pub fn session_state(&self) -> SessionState {
        self.machine.state()
    }

    /// Currently configured telemetry send period.
    pub fn send_interval_ms(&self) -> u64 {
        self.scheduler.interval_ms()
    }

    /// Run until shutdown is signalled.
    ///
    /// All runtime failures are absorbed and reported; the only errors that
    /// propagate are from starting and stopping the transport session.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> AgentResult<()> {
        self.transport
            .connect()
            .await
            .map_err(AgentError::transport)?;

        let mut tick = tokio::time::interval(TICK_INTERVAL);
        info!(device = %self.identity.name, "Agent running");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                notification = self.notifications.recv() => match notification {
                    Some(notification) => self.handle_notification(notification).await,
                    None => {
                        warn!("Notification channel closed - stopping");
                        break;
                    }
                },
                _ = tick.tick() => {
                    let now_ms = self.clock.now_ms();
                    self.tick_at(now_ms).await;
                }
            }
        }

        info!("Agent shutting down");
        self.transport
            .disconnect()
            .await
            .map_err(AgentError::transport)?;
        Ok(())
    }

    /// Apply one transport notification and perform the resulting effects.
    pub async fn handle_notification(&mut self, notification: Notification) {
        match &notification {
            Notification::Connected => info!("Event channel established"),
            Notification::Disconnected => {
                warn!("Event channel dropped - transport retries on its own interval");
            }
            Notification::Event(text) => debug!(event = %text, "Inbound server event"),
            Notification::Error(error) => warn!(error = %error, "Transport reported an error"),
            Notification::Ack(ack) => debug!(ack = %ack, "Server acknowledgement"),
        }

        for effect in self.machine.handle(&notification) {
            self.apply(effect).await;
        }
    }

    /// Advance the telemetry scheduler as of `now_ms` milliseconds since
    /// boot. Sends one cycle when the interval has elapsed and the session
    /// is registered.
    pub async fn tick_at(&mut self, now_ms: u64) {
        if !self.machine.is_registered() {
            return;
        }
        if !self.scheduler.due(now_ms) {
            return;
        }

        let envelopes =
            self.scheduler
                .build_cycle(&mut self.sensors, &self.identity, &self.api_key, &self.clock);
        debug!(envelopes = envelopes.len(), "Telemetry cycle");
        for envelope in envelopes {
            self.send(EVENT_TELEMETRY, &envelope).await;
        }
    }

    async fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::SendRegistration => self.send_registration().await,
            Effect::Dispatch(command) => self.dispatch(command).await,
            Effect::AuthFailure => {
                let error = AgentError::auth("invalid api key");
                warn!(
                    error = %error,
                    "Registration rejected - telemetry stays suppressed until a later registration"
                );
            }
            Effect::DecodeFailure(error) => {
                warn!(error = %AgentError::from(error), "Dropping undecodable command event");
            }
        }
    }

    async fn send_registration(&mut self) {
        info!(device = %self.identity.name, "Registering device");
        let envelope = Envelope::registration(&self.api_key, &self.identity);
        self.send(EVENT_REGISTER, &envelope).await;
    }

    async fn dispatch(&mut self, command: Command) {
        info!(command = %command.command, "Remote command received");
        match interpret(&command, self.machine.is_registered()) {
            Ok(CommandAction::ScheduleRestart { delay }) => {
                self.control.schedule_restart(delay);
            }
            Ok(CommandAction::SendStatus) => self.send_status().await,
            Ok(CommandAction::SetInterval { interval_ms }) => {
                if self.scheduler.set_interval(interval_ms) {
                    info!(interval_ms, "Telemetry interval updated");
                }
            }
            Ok(CommandAction::Skip) => {}
            Err(error) => warn!(error = %AgentError::from(error), "Command dropped"),
        }
    }

    async fn send_status(&mut self) {
        let snapshot = self.monitor.snapshot();
        let payload = StatusPayload {
            ip: snapshot.ip,
            rssi: snapshot.rssi,
            uptime: self.clock.uptime_secs(),
            free_heap: snapshot.free_heap,
            timestamp: self.clock.now_ms(),
        };
        let envelope = Envelope::status(&self.api_key, &self.identity.name, payload);
        self.send(EVENT_TELEMETRY, &envelope).await;
    }

    /// Encode and send one envelope, absorbing failures: the transport
    /// recovers dropped channels on its own and registration is re-driven
    /// by the next connect notification.
    async fn send(&self, event: &str, envelope: &Envelope) {
        let payload = match envelope.encode() {
            Ok(payload) => payload,
            Err(error) => {
                warn!(error = %error, "Failed to encode envelope");
                return;
            }
        };

        if let Err(error) = self.transport.send_event(event, &payload).await {
            warn!(error = %error, event, "Send failed");
        }
    }
}
