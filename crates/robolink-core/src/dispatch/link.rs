//! The command dispatcher.

use super::frame::{CallTimeout, CommandFrame, Reply};
use super::status;
use crate::config::LinkConfig;
use crate::connection::{ConnectionManager, Launcher, StationInfo};
use crate::error::{ProtocolError, Result, RobolinkError};
use crate::events::EventChannel;
use crate::transport::Session;
use crate::wire::WireValue;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

struct LinkState {
    manager: ConnectionManager,
    last_warning: Option<String>,
}

/// A connection to the station that runs commands one at a time.
///
/// `Link` is `Send + Sync`; concurrent callers queue on an internal lock, so
/// each request/response exchange is atomic on the wire. The connection is
/// made lazily on the first call and replaced transparently when it dies.
pub struct Link {
    state: Mutex<LinkState>,
}

impl Link {
    /// Create a link. Nothing is connected until the first call.
    pub fn new(config: LinkConfig) -> Self {
        Self::from_manager(ConnectionManager::new(config))
    }

    /// Create a link that starts the station through a custom launcher.
    pub fn with_launcher(config: LinkConfig, launcher: Arc<dyn Launcher>) -> Self {
        Self::from_manager(ConnectionManager::with_launcher(config, launcher))
    }

    fn from_manager(manager: ConnectionManager) -> Self {
        Self {
            state: Mutex::new(LinkState {
                manager,
                last_warning: None,
            }),
        }
    }

    /// Create a link and connect immediately.
    pub async fn connect(config: LinkConfig) -> Result<Self> {
        let link = Self::new(config);
        link.ensure_connected().await?;
        Ok(link)
    }

    /// Connect (or reconnect) now and return what the station reported.
    pub async fn ensure_connected(&self) -> Result<StationInfo> {
        let mut state = self.state.lock().await;
        state.manager.ensure_connected().await?;
        state
            .manager
            .station()
            .ok_or_else(|| crate::error::TransportError::NotConnected.into())
    }

    /// Run one command and decode its results.
    ///
    /// The request is written in a single send. Results are decoded in order,
    /// then the trailing status is read and classified. Transport and framing
    /// failures discard the session; the next call reconnects.
    pub async fn call(&self, frame: CommandFrame) -> Result<Reply> {
        let mut state = self.state.lock().await;
        let LinkState {
            manager,
            last_warning,
        } = &mut *state;

        let extended = match frame.timeout() {
            CallTimeout::Default => None,
            CallTimeout::Extended(timeout) => {
                Some(timeout.unwrap_or(manager.config().extended_timeout))
            }
        };

        let session = manager.ensure_connected().await?;
        let started = Instant::now();
        let outcome = match extended {
            Some(timeout) => exchange(&mut session.extended(timeout), &frame).await,
            None => exchange(session, &frame).await,
        };

        match &outcome {
            Ok(reply) => {
                if let Some(warning) = reply.warning() {
                    *last_warning = Some(warning.to_string());
                }
                debug!(
                    "{} completed in {:?}",
                    frame.name(),
                    started.elapsed()
                );
            }
            Err(e) if e.is_session_fatal() => {
                session.mark_dead();
                warn!("{} failed, dropping session: {}", frame.name(), e);
            }
            Err(e) => debug!("{} failed: {}", frame.name(), e),
        }
        outcome
    }

    /// Build number of the connected station, 0 if unknown or not connected.
    pub async fn build(&self) -> u32 {
        self.state.lock().await.manager.build()
    }

    /// Protocol version from the last handshake.
    pub async fn protocol_version(&self) -> Option<i32> {
        self.state
            .lock()
            .await
            .manager
            .station()
            .map(|s| s.protocol_version)
    }

    /// Port of the current session.
    pub async fn port(&self) -> Option<u16> {
        self.state.lock().await.manager.session().map(Session::port)
    }

    /// Timeout currently applied to the session's I/O.
    pub async fn current_timeout(&self) -> Option<Duration> {
        self.state.lock().await.manager.session().map(Session::timeout)
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.manager.is_connected()
    }

    /// Most recent warning reported by the station.
    pub async fn last_warning(&self) -> Option<String> {
        self.state.lock().await.last_warning.clone()
    }

    pub async fn take_last_warning(&self) -> Option<String> {
        self.state.lock().await.last_warning.take()
    }

    /// Fail unless the station is known to be at least `min_build`.
    pub async fn require_build(&self, min_build: u32) -> Result<()> {
        self.state.lock().await.manager.require_build(min_build)
    }

    pub async fn config(&self) -> LinkConfig {
        self.state.lock().await.manager.config().clone()
    }

    /// Close the session. The next call reconnects.
    pub async fn disconnect(&self) {
        self.state.lock().await.manager.disconnect().await;
    }

    /// Open a separate event connection to the same station.
    pub async fn open_events(&self) -> Result<EventChannel> {
        let (config, port) = {
            let mut state = self.state.lock().await;
            let port = state.manager.ensure_connected().await?.port();
            (state.manager.config().clone(), port)
        };
        EventChannel::open(&config, port).await
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link").finish_non_exhaustive()
    }
}

async fn exchange(session: &mut Session, frame: &CommandFrame) -> Result<Reply> {
    session.send_raw(&frame.encode()).await?;

    let mut values = VecDeque::with_capacity(frame.results().len());
    let mut invalid_text = None;
    for ty in frame.results() {
        match WireValue::decode(&mut *session, *ty).await {
            Ok(value) => values.push_back(value),
            // The bad line was consumed; keep reading so the status is not left behind.
            Err(e @ RobolinkError::Protocol(ProtocolError::InvalidText(_))) => {
                invalid_text.get_or_insert(e);
            }
            Err(e) => return Err(e),
        }
    }

    let warning = status::read_status(&mut *session).await?;
    match invalid_text {
        Some(e) => Err(e),
        None => Ok(Reply::new(values, warning)),
    }
}
