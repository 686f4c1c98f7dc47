//! Establishing and keeping the command connection.
//!
//! The manager scans the configured port range, launches a local station when
//! nothing answers, performs the handshake, and transparently replaces a
//! session that died between calls.

mod handshake;
mod launcher;
mod locate;
mod manager;

pub use handshake::{api_handshake, event_handshake, StationInfo};
pub use launcher::{wait_for_ready_line, LaunchPlan, LaunchedProcess, Launcher, ProcessLauncher};
pub use locate::{default_install_path, locate_executable};
pub use manager::ConnectionManager;
