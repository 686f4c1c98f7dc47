//! Centralized configuration for the robolink client.
//!
//! `ProtocolConfig` holds the fixed wire constants. `LinkConfig` is the
//! construction-time configuration of a connection: where the station lives,
//! how long to wait, and how to start it when it is not running.

use crate::error::{Result, RobolinkError};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Protocol-level constants.
pub struct ProtocolConfig;

impl ProtocolConfig {
    // Handshakes
    pub const API_HANDSHAKE: &'static str = "RDK_API";
    pub const EVENT_HANDSHAKE: &'static str = "RDK_EVT";
    pub const HANDSHAKE_ARG: i32 = 0;

    // Station startup
    pub const READY_MARKER: &'static str = "running";
    pub const DEFAULT_HOST: &'static str = "localhost";
    pub const DEFAULT_PORT: u16 = 20500;

    // Timeouts
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const EXTENDED_TIMEOUT: Duration = Duration::from_secs(3600);
    pub const CONNECT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);
    pub const LAUNCH_TIMEOUT: Duration = Duration::from_secs(60);

    /// Upper bound on any count-prefixed payload (arrays, matrices, lists).
    pub const MAX_ELEMENTS: usize = 64 * 1024 * 1024;

    /// First build that accepts `S_Selection`.
    pub const MIN_BUILD_SELECTION: u32 = 14_000;
}

/// Status codes read after every response.
pub struct StatusCodes;

impl StatusCodes {
    pub const OK: i32 = 0;
    pub const INVALID_ITEM: i32 = 1;
    pub const WARNING: i32 = 2;
    pub const ERROR: i32 = 3;
    pub const INVALID_LICENSE: i32 = 9;
    pub const TARGET_UNREACHABLE: i32 = 10;
    pub const CANCELLED: i32 = 11;
    pub const INVALID_INPUT: i32 = 12;
    /// Codes at or above this value are not part of the protocol.
    pub const UPPER_BOUND: i32 = 100;
}

/// Connection configuration.
///
/// Every field has a default, so a JSON file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Station host name or address.
    pub host: String,
    /// First port of the inclusive scan range.
    pub port_start: u16,
    /// Last port of the inclusive scan range.
    pub port_end: u16,
    /// Timeout for ordinary calls.
    #[serde(with = "duration_secs")]
    pub default_timeout: Duration,
    /// Timeout for calls expected to block on a long station operation.
    #[serde(with = "duration_secs")]
    pub extended_timeout: Duration,
    /// Timeout for each connection probe during the port scan.
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
    /// How long to wait for a launched station to report readiness.
    #[serde(with = "duration_secs")]
    pub launch_timeout: Duration,
    /// Start the station without splash screen or main window.
    pub start_hidden: bool,
    /// Start the station in safe mode.
    pub safe_mode: bool,
    /// Extra arguments appended verbatim to the launch command line.
    pub launch_args: Vec<String>,
    /// Explicit station executable, bypassing discovery.
    pub executable: Option<PathBuf>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: ProtocolConfig::DEFAULT_HOST.to_string(),
            port_start: ProtocolConfig::DEFAULT_PORT,
            port_end: ProtocolConfig::DEFAULT_PORT,
            default_timeout: ProtocolConfig::DEFAULT_TIMEOUT,
            extended_timeout: ProtocolConfig::EXTENDED_TIMEOUT,
            connect_timeout: ProtocolConfig::CONNECT_PROBE_TIMEOUT,
            launch_timeout: ProtocolConfig::LAUNCH_TIMEOUT,
            start_hidden: true,
            safe_mode: false,
            launch_args: Vec::new(),
            executable: None,
        }
    }
}

impl LinkConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config from a JSON file. Missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| RobolinkError::io_with_path(e, path))?;
        let config: LinkConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Use a single port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port_start = port;
        self.port_end = port;
        self
    }

    /// Scan an inclusive port range.
    pub fn with_port_range(mut self, start: u16, end: u16) -> Self {
        self.port_start = start;
        self.port_end = end;
        self
    }

    /// Set the default call timeout.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set the extended call timeout.
    pub fn with_extended_timeout(mut self, timeout: Duration) -> Self {
        self.extended_timeout = timeout;
        self
    }

    /// Set the per-port connection probe timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the launch readiness timeout.
    pub fn with_launch_timeout(mut self, timeout: Duration) -> Self {
        self.launch_timeout = timeout;
        self
    }

    /// Show or hide the station window when launching it.
    pub fn with_start_hidden(mut self, hidden: bool) -> Self {
        self.start_hidden = hidden;
        self
    }

    /// Launch the station in safe mode.
    pub fn with_safe_mode(mut self, safe: bool) -> Self {
        self.safe_mode = safe;
        self
    }

    /// Add an extra launch argument.
    pub fn with_launch_arg(mut self, arg: impl Into<String>) -> Self {
        self.launch_args.push(arg.into());
        self
    }

    /// Set the station executable.
    pub fn with_executable(mut self, path: impl AsRef<Path>) -> Self {
        self.executable = Some(path.as_ref().to_path_buf());
        self
    }

    /// Ports to scan, in order.
    pub fn ports(&self) -> std::ops::RangeInclusive<u16> {
        self.port_start..=self.port_end
    }

    /// Whether the host refers to this machine, which allows auto-launch.
    pub fn is_local(&self) -> bool {
        if self.host.eq_ignore_ascii_case("localhost") {
            return true;
        }
        self.host
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
    }

    /// Check the config for values that can never work.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(RobolinkError::Config {
                message: "host must not be empty".to_string(),
            });
        }
        if self.port_end < self.port_start {
            return Err(RobolinkError::Config {
                message: format!(
                    "port range {}-{} is empty",
                    self.port_start, self.port_end
                ),
            });
        }
        if self.default_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(RobolinkError::Config {
                message: "timeouts must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Durations are written as fractional seconds in config files.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
