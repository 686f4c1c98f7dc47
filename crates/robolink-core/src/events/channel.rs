//! The event connection and its background listener.

use super::event::Event;
use crate::config::LinkConfig;
use crate::connection::event_handshake;
use crate::error::{ConnectError, Result, RobolinkError};
use crate::transport::Session;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Buffered events between the listener task and its consumer.
const LISTENER_CAPACITY: usize = 256;

/// A dedicated session that receives pushed events.
#[derive(Debug)]
pub struct EventChannel {
    session: Session,
    version: i32,
}

impl EventChannel {
    /// Connect to `config.host:port` and subscribe to events.
    ///
    /// Once subscribed, reads wait for as long as the configured extended
    /// timeout, so an idle station does not break the channel.
    pub async fn open(config: &LinkConfig, port: u16) -> Result<Self> {
        let mut session = Session::connect(&config.host, port, config.connect_timeout)
            .await
            .map_err(|e| {
                debug!("Event connection to {}:{} failed: {}", config.host, port, e);
                ConnectError::RemoteUnreachable {
                    host: config.host.clone(),
                    port_start: port,
                    port_end: port,
                    attempts: 1,
                }
            })?;

        session.set_default_timeout(config.default_timeout);
        let version = match event_handshake(&mut session).await {
            Ok(version) => version,
            Err(e) => {
                session.disconnect().await;
                return Err(match e {
                    RobolinkError::Connect(_) => e,
                    other => ConnectError::HandshakeFailed {
                        reason: other.to_string(),
                    }
                    .into(),
                });
            }
        };

        session.set_default_timeout(config.extended_timeout);
        info!("Event channel open on port {} (version {})", port, version);
        Ok(Self { session, version })
    }

    /// Event protocol version reported by the station.
    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn port(&self) -> u16 {
        self.session.port()
    }

    /// Wait for the next event.
    ///
    /// Returns `Ok(None)` when `timeout` elapses before the station sends
    /// anything; nothing is consumed in that case. `None` waits indefinitely.
    pub async fn wait_for_event(&mut self, timeout: Option<Duration>) -> Result<Option<Event>> {
        if !self.session.wait_readable(timeout).await? {
            return Ok(None);
        }
        let event = Event::decode(&mut self.session).await?;
        if event.is_unknown() {
            debug!("Ignoring unknown event type {}", event.code());
        }
        Ok(Some(event))
    }

    /// Move the channel onto its own task, forwarding events to a queue.
    ///
    /// The task ends on shutdown, when the receiver is dropped, or on the
    /// first channel error.
    pub fn spawn(self) -> EventListenerHandle {
        let (events_tx, events_rx) = mpsc::channel(LISTENER_CAPACITY);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(events_tx, shutdown_rx));

        EventListenerHandle {
            events: events_rx,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    async fn run(
        mut self,
        events_tx: mpsc::Sender<Event>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    debug!("Event listener shutting down");
                    break;
                }
                next = self.wait_for_event(None) => {
                    match next {
                        Ok(Some(event)) => {
                            if events_tx.send(event).await.is_err() {
                                debug!("Event receiver dropped, stopping listener");
                                break;
                            }
                        }
                        Ok(None) => continue,
                        Err(e) => {
                            warn!("Event channel failed: {}", e);
                            self.session.disconnect().await;
                            return Err(e);
                        }
                    }
                }
            }
        }
        self.session.disconnect().await;
        Ok(())
    }
}

/// Handle to a running event listener. Dropping it stops the listener.
#[derive(Debug)]
pub struct EventListenerHandle {
    events: mpsc::Receiver<Event>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<Result<()>>>,
}

impl EventListenerHandle {
    /// Next event, or `None` once the listener has stopped.
    pub async fn recv(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// Ask the listener to stop.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Stop the listener and return how it ended.
    pub async fn join(mut self) -> Result<()> {
        self.shutdown();
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        match task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            // Cancelled
            Err(_) => Ok(()),
        }
    }
}

impl Drop for EventListenerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
