//! Connection lifecycle: port scan, auto-launch, handshake, reconnect.

use super::handshake::{self, StationInfo};
use super::launcher::{LaunchPlan, LaunchedProcess, Launcher, ProcessLauncher};
use super::locate::locate_executable;
use crate::config::LinkConfig;
use crate::error::{ConnectError, Result, RobolinkError, TransportError};
use crate::transport::Session;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owns the command session and (re)establishes it on demand.
pub struct ConnectionManager {
    config: LinkConfig,
    launcher: Arc<dyn Launcher>,
    session: Option<Session>,
    station: Option<StationInfo>,
    process: Option<LaunchedProcess>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("config", &self.config)
            .field("session", &self.session)
            .field("station", &self.station)
            .field("process", &self.process)
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Manager that launches the station as a child process when needed.
    pub fn new(config: LinkConfig) -> Self {
        Self::with_launcher(config, Arc::new(ProcessLauncher))
    }

    pub fn with_launcher(config: LinkConfig, launcher: Arc<dyn Launcher>) -> Self {
        Self {
            config,
            launcher,
            session: None,
            station: None,
            process: None,
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Station details from the last successful handshake.
    pub fn station(&self) -> Option<StationInfo> {
        self.station
    }

    /// Build number of the connected station, 0 if unknown.
    pub fn build(&self) -> u32 {
        self.station.map(|s| s.build).unwrap_or(0)
    }

    /// The current session, dead or alive.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn launched_process(&self) -> Option<&LaunchedProcess> {
        self.process.as_ref()
    }

    /// Whether a live session exists. Does not reconnect.
    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_alive)
    }

    /// Fail when the station is known to be older than `min_build`.
    ///
    /// An unknown build (0) is let through; the station will answer with an
    /// error status if it really lacks the feature.
    pub fn require_build(&self, min_build: u32) -> Result<()> {
        let current_build = self.build();
        if current_build != 0 && current_build < min_build {
            return Err(ConnectError::FeatureRequiresNewerBuild {
                min_build,
                current_build,
            }
            .into());
        }
        Ok(())
    }

    /// Return a live, handshaken session, connecting or reconnecting first
    /// when needed.
    pub async fn ensure_connected(&mut self) -> Result<&mut Session> {
        let alive = self.session.as_ref().is_some_and(Session::is_alive);
        if !alive {
            if let Some(stale) = self.session.take() {
                info!("Session with {} lost, reconnecting", stale.peer_addr());
                stale.disconnect().await;
            }
            self.station = None;
            let session = self.connect().await?;
            self.session = Some(session);
        }
        self.session
            .as_mut()
            .ok_or_else(|| TransportError::NotConnected.into())
    }

    /// Drop the current session. The next call reconnects.
    pub async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            session.disconnect().await;
        }
        self.station = None;
    }

    async fn connect(&mut self) -> Result<Session> {
        self.config.validate()?;

        let (found, mut attempts) = self.scan().await;
        let session = match found {
            Some(session) => session,
            None if !self.config.is_local() => return Err(self.unreachable(attempts)),
            None => {
                let executable = locate_executable(self.config.executable.as_deref())?;
                let plan = LaunchPlan::from_config(&self.config, executable);
                let process = self.launcher.launch(&plan).await?;
                self.process = Some(process);

                let (found, retry_attempts) = self.scan().await;
                attempts += retry_attempts;
                match found {
                    Some(session) => session,
                    None => return Err(self.unreachable(attempts)),
                }
            }
        };

        self.handshake(session).await
    }

    async fn handshake(&mut self, mut session: Session) -> Result<Session> {
        session.set_default_timeout(self.config.default_timeout);
        match handshake::api_handshake(&mut session).await {
            Ok(info) => {
                self.station = Some(info);
                Ok(session)
            }
            Err(e) => {
                warn!("Handshake with {} failed: {}", session.peer_addr(), e);
                self.process = None;
                session.disconnect().await;
                Err(match e {
                    RobolinkError::Connect(ConnectError::HandshakeFailed { .. }) => e,
                    other => ConnectError::HandshakeFailed {
                        reason: other.to_string(),
                    }
                    .into(),
                })
            }
        }
    }

    /// Try each configured port once, in order.
    async fn scan(&self) -> (Option<Session>, usize) {
        let mut attempts = 0;
        for port in self.config.ports() {
            attempts += 1;
            match Session::connect(&self.config.host, port, self.config.connect_timeout).await {
                Ok(session) => return (Some(session), attempts),
                Err(e) => debug!("No station on {}:{}: {}", self.config.host, port, e),
            }
        }
        (None, attempts)
    }

    fn unreachable(&self, attempts: usize) -> RobolinkError {
        ConnectError::RemoteUnreachable {
            host: self.config.host.clone(),
            port_start: self.config.port_start,
            port_end: self.config.port_end,
            attempts,
        }
        .into()
    }
}
