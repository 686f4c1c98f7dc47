//! Starting a local station process.

use crate::config::{LinkConfig, ProtocolConfig};
use crate::error::{ConnectError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

/// Everything needed to start the station and recognise that it is ready.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchPlan {
    /// Executable to run.
    pub executable: PathBuf,
    /// Command line arguments.
    pub args: Vec<String>,
    /// Port the station is asked to listen on.
    pub port: u16,
    /// Case-insensitive substring of a stdout line that signals readiness.
    pub ready_marker: String,
    /// How long to wait for the marker.
    pub ready_timeout: Duration,
}

impl LaunchPlan {
    /// Build the plan for a config and a resolved executable.
    ///
    /// Arguments are `/PORT=<port>`, the hide flags when `start_hidden` is
    /// set, `/SAFE` in safe mode, then the configured extra arguments as-is.
    pub fn from_config(config: &LinkConfig, executable: PathBuf) -> Self {
        let mut args = vec![format!("/PORT={}", config.port_start)];
        if config.start_hidden {
            args.extend(["/NOSPLASH", "/NOSHOW", "/HIDDEN"].map(String::from));
        }
        if config.safe_mode {
            args.push("/SAFE".to_string());
        }
        args.extend(config.launch_args.iter().cloned());

        Self {
            executable,
            args,
            port: config.port_start,
            ready_marker: ProtocolConfig::READY_MARKER.to_string(),
            ready_timeout: config.launch_timeout,
        }
    }
}

/// A station process started by this client.
///
/// Dropping it does not stop the station; the process outlives the client.
#[derive(Debug, Default)]
pub struct LaunchedProcess {
    child: Option<Child>,
}

impl LaunchedProcess {
    pub fn new(child: Child) -> Self {
        Self { child: Some(child) }
    }

    /// A handle for a process this client does not own, such as one started
    /// by a custom launcher.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }
}

/// Seam for starting the station, so tests can substitute a fake.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Start the station and wait until it reports readiness.
    async fn launch(&self, plan: &LaunchPlan) -> Result<LaunchedProcess>;
}

/// Launches the station as a child process and watches its stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn launch(&self, plan: &LaunchPlan) -> Result<LaunchedProcess> {
        let mut cmd = Command::new(&plan.executable);
        cmd.args(&plan.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        info!(
            "Launching station {} {}",
            plan.executable.display(),
            plan.args.join(" ")
        );

        let mut child = cmd.spawn().map_err(|e| {
            error!("Failed to spawn station: {}", e);
            ConnectError::LaunchFailed {
                path: plan.executable.clone(),
                message: e.to_string(),
            }
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ConnectError::LaunchFailed {
                path: plan.executable.clone(),
                message: "stdout was not captured".to_string(),
            })?;

        // stdout is consumed here and closed once readiness is known.
        let ready = tokio::time::timeout(
            plan.ready_timeout,
            wait_for_ready_line(BufReader::new(stdout), &plan.ready_marker),
        )
        .await;

        match ready {
            Ok(Ok(true)) => {
                info!("Station ready (pid {:?})", child.id());
                Ok(LaunchedProcess::new(child))
            }
            Ok(Ok(false)) => {
                let _ = child.start_kill();
                Err(ConnectError::LaunchFailed {
                    path: plan.executable.clone(),
                    message: "output ended before the station reported readiness".to_string(),
                }
                .into())
            }
            Ok(Err(e)) => {
                let _ = child.start_kill();
                Err(ConnectError::LaunchFailed {
                    path: plan.executable.clone(),
                    message: format!("reading station output: {}", e),
                }
                .into())
            }
            Err(_) => {
                warn!(
                    "Station did not become ready within {:?}",
                    plan.ready_timeout
                );
                let _ = child.start_kill();
                Err(ConnectError::LaunchTimedOut(plan.ready_timeout).into())
            }
        }
    }
}

/// Read lines until one contains `marker`, ignoring case.
///
/// Returns `false` if the stream ends first.
pub async fn wait_for_ready_line<R>(reader: R, marker: &str) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    let marker = marker.to_lowercase();
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        debug!("station: {}", line);
        if line.to_lowercase().contains(&marker) {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_arguments() {
        let config = LinkConfig::new()
            .with_port(20510)
            .with_safe_mode(true)
            .with_launch_arg("-NEWINSTANCE");
        let plan = LaunchPlan::from_config(&config, PathBuf::from("/opt/station"));

        assert_eq!(
            plan.args,
            vec!["/PORT=20510", "/NOSPLASH", "/NOSHOW", "/HIDDEN", "/SAFE", "-NEWINSTANCE"]
        );
        assert_eq!(plan.port, 20510);
        assert_eq!(plan.ready_marker, "running");
    }

    #[test]
    fn test_plan_visible() {
        let config = LinkConfig::new().with_start_hidden(false);
        let plan = LaunchPlan::from_config(&config, PathBuf::from("station"));
        assert_eq!(plan.args, vec!["/PORT=20500"]);
    }

    #[tokio::test]
    async fn test_ready_line_is_case_insensitive() {
        let output: &[u8] = b"Loading libraries\nStation is RUNNING\nmore\n";
        assert!(wait_for_ready_line(output, "running").await.unwrap());
    }

    #[tokio::test]
    async fn test_ready_line_stream_end() {
        let output: &[u8] = b"Loading\nCrashed\n";
        assert!(!wait_for_ready_line(output, "running").await.unwrap());
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let plan = LaunchPlan::from_config(
            &LinkConfig::new(),
            PathBuf::from("/nonexistent/robolink/station"),
        );
        let err = ProcessLauncher.launch(&plan).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::RobolinkError::Connect(ConnectError::LaunchFailed { .. })
        ));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        fn script(dir: &TempDir, body: &str) -> PathBuf {
            let path = dir.path().join("station.sh");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_launch_waits_for_marker() {
            let dir = TempDir::new().unwrap();
            let exe = script(&dir, "echo starting\necho Running\nsleep 5");
            let plan = LaunchPlan::from_config(&LinkConfig::new(), exe);

            let process = ProcessLauncher.launch(&plan).await.unwrap();
            assert!(process.pid().is_some());
        }

        #[tokio::test]
        async fn test_launch_exits_early() {
            let dir = TempDir::new().unwrap();
            let exe = script(&dir, "echo starting\nexit 1");
            let plan = LaunchPlan::from_config(&LinkConfig::new(), exe);

            let err = ProcessLauncher.launch(&plan).await.unwrap_err();
            assert!(matches!(
                err,
                crate::error::RobolinkError::Connect(ConnectError::LaunchFailed { .. })
            ));
        }

        #[tokio::test]
        async fn test_launch_times_out() {
            let dir = TempDir::new().unwrap();
            let exe = script(&dir, "echo starting\nsleep 5");
            let config = LinkConfig::new().with_launch_timeout(Duration::from_millis(200));
            let plan = LaunchPlan::from_config(&config, exe);

            let err = ProcessLauncher.launch(&plan).await.unwrap_err();
            assert!(matches!(
                err,
                crate::error::RobolinkError::Connect(ConnectError::LaunchTimedOut(_))
            ));
        }
    }
}
