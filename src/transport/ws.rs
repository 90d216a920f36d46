//! Websocket implementation of the transport session
//!
//! Owns the long-lived websocket connection to the ingestion server. A
//! supervisor task drives the connection: it dials, pumps inbound frames
//! into the notification channel, and on drop retries on a fixed interval
//! until shutdown. Outbound events are text frames shaped as the
//! two-element array `["event_name", {payload}]`, the same shape the server
//! uses for inbound events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use super::{Notification, Transport, TransportError};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type NotifySender = Arc<StdMutex<Option<mpsc::Sender<Notification>>>>;

/// Default fixed reconnect interval.
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 5000;

/// Websocket session with fixed-interval reconnection.
pub struct WsSession {
    url: Url,
    reconnect_interval: Duration,
    writer: Arc<Mutex<Option<WsSink>>>,
    notify_tx: NotifySender,
    connected: Arc<AtomicBool>,
    shutdown_tx: Option<watch::Sender<bool>>,
    supervisor: Option<JoinHandle<()>>,
}

impl WsSession {
    pub fn new(url: Url, reconnect_interval: Duration) -> Self {
        Self {
            url,
            reconnect_interval,
            writer: Arc::new(Mutex::new(None)),
            notify_tx: Arc::new(StdMutex::new(None)),
            connected: Arc::new(AtomicBool::new(false)),
            shutdown_tx: None,
            supervisor: None,
        }
    }

    /// Serialize a named event into its wire frame.
    ///
    /// The payload must already be valid JSON text; it is embedded verbatim
    /// rather than re-encoded.
    fn build_event_frame(event: &str, payload: &str) -> Result<String, serde_json::Error> {
        let raw = serde_json::value::RawValue::from_string(payload.to_string())?;
        serde_json::to_string(&(event, &raw))
    }

    /// Deliver a notification, dropping it if no consumer is wired up.
    async fn notify(notify_tx: &NotifySender, notification: Notification) {
        let sender = notify_tx.lock().ok().and_then(|guard| guard.clone());
        match sender {
            Some(sender) => {
                if sender.send(notification).await.is_err() {
                    warn!("Notification receiver dropped - notification discarded");
                }
            }
            None => warn!("No notification sender configured - notification discarded"),
        }
    }

    /// Session supervisor: connect, pump frames, reconnect on a fixed
    /// interval until shutdown is signalled.
    async fn supervise(
        url: Url,
        reconnect_interval: Duration,
        writer: Arc<Mutex<Option<WsSink>>>,
        notify_tx: NotifySender,
        connected: Arc<AtomicBool>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!(url = %url, "Starting transport session supervisor");

        'session: loop {
            if *shutdown_rx.borrow() {
                break;
            }

            match connect_async(url.as_str()).await {
                Ok((stream, _response)) => {
                    info!(url = %url, "Event channel established");
                    let (sink, mut read) = stream.split();
                    *writer.lock().await = Some(sink);
                    connected.store(true, Ordering::SeqCst);
                    Self::notify(&notify_tx, Notification::Connected).await;

                    let mut channel_dropped = false;
                    loop {
                        tokio::select! {
                            changed = shutdown_rx.changed() => {
                                if changed.is_err() || *shutdown_rx.borrow() {
                                    break;
                                }
                            }
                            frame = read.next() => match frame {
                                Some(Ok(Message::Text(text))) => {
                                    debug!(bytes = text.len(), "Inbound event frame");
                                    Self::notify(
                                        &notify_tx,
                                        Notification::Event(text.as_str().to_owned()),
                                    )
                                    .await;
                                }
                                Some(Ok(Message::Close(_))) | None => {
                                    channel_dropped = true;
                                    break;
                                }
                                // Ping/pong and binary frames are handled by the
                                // websocket stack; nothing event-shaped in them.
                                Some(Ok(_)) => {}
                                Some(Err(e)) => {
                                    Self::notify(&notify_tx, Notification::Error(e.to_string()))
                                        .await;
                                    channel_dropped = true;
                                    break;
                                }
                            }
                        }
                    }

                    connected.store(false, Ordering::SeqCst);
                    writer.lock().await.take();

                    if channel_dropped {
                        warn!("Event channel dropped");
                        Self::notify(&notify_tx, Notification::Disconnected).await;
                    } else {
                        break 'session;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Connection attempt failed");
                }
            }

            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
                () = tokio::time::sleep(reconnect_interval) => {}
            }
        }

        info!("Transport session supervisor stopped");
    }
}

#[async_trait::async_trait]
impl Transport for WsSession {
    type Error = TransportError;

    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.supervisor.is_some() {
            return Err(TransportError::ConnectionFailed(
                "session already started".to_string(),
            ));
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown_tx = Some(shutdown_tx);

        let handle = tokio::spawn(Self::supervise(
            self.url.clone(),
            self.reconnect_interval,
            self.writer.clone(),
            self.notify_tx.clone(),
            self.connected.clone(),
            shutdown_rx,
        ));
        self.supervisor = Some(handle);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(true);
        }
        if let Some(handle) = self.supervisor.take() {
            let _ = handle.await;
        }
        self.writer.lock().await.take();
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn send_event(&self, event: &str, payload: &str) -> Result<(), TransportError> {
        let frame = Self::build_event_frame(event, payload)?;

        let mut guard = self.writer.lock().await;
        let sink = guard.as_mut().ok_or(TransportError::NotConnected)?;
        sink.send(Message::text(frame))
            .await
            .map_err(|e| TransportError::SendFailed(Box::new(e)))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn set_notification_sender(&self, sender: mpsc::Sender<Notification>) {
        if let Ok(mut notify_tx) = self.notify_tx.lock() {
            *notify_tx = Some(sender);
        }
    }
}
