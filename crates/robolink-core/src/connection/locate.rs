//! Station executable discovery.
//!
//! Lookup order: explicit path from the config, the installed location the
//! platform reports, then the conventional install path.

use crate::error::{ConnectError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "RoboDK.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "RoboDK";

/// Resolve the station executable. An explicit path is never second-guessed.
pub fn locate_executable(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(ConnectError::ExecutableNotFound(path.to_path_buf()).into())
        };
    }

    if let Some(path) = installed_executable() {
        debug!("Found installed station at {}", path.display());
        return Ok(path);
    }

    let fallback = default_install_path();
    if fallback.is_file() {
        Ok(fallback)
    } else {
        Err(ConnectError::ExecutableNotFound(fallback).into())
    }
}

/// Conventional install location for this platform.
pub fn default_install_path() -> PathBuf {
    #[cfg(windows)]
    {
        PathBuf::from("C:/RoboDK/bin").join(EXECUTABLE_NAME)
    }
    #[cfg(target_os = "macos")]
    {
        PathBuf::from("/Applications/RoboDK.app/Contents/MacOS").join(EXECUTABLE_NAME)
    }
    #[cfg(not(any(windows, target_os = "macos")))]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/"))
            .join("RoboDK")
            .join("bin")
            .join(EXECUTABLE_NAME)
    }
}

#[cfg(windows)]
fn installed_executable() -> Option<PathBuf> {
    let output = std::process::Command::new("reg")
        .args(["query", r"HKLM\SOFTWARE\RoboDK", "/v", "INSTDIR"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let install_dir = parse_registry_install_dir(&String::from_utf8_lossy(&output.stdout))?;
    let path = install_dir.join("bin").join(EXECUTABLE_NAME);
    path.is_file().then_some(path)
}

#[cfg(not(windows))]
fn installed_executable() -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    search_path(&path)
}

#[cfg_attr(windows, allow(dead_code))]
fn search_path(path: &std::ffi::OsStr) -> Option<PathBuf> {
    std::env::split_paths(path)
        .map(|dir| dir.join(EXECUTABLE_NAME))
        .find(|candidate| candidate.is_file())
}

/// Extract the value of `INSTDIR` from `reg query` output.
///
/// The relevant line looks like `    INSTDIR    REG_SZ    C:\RoboDK`.
#[cfg_attr(not(windows), allow(dead_code))]
fn parse_registry_install_dir(output: &str) -> Option<PathBuf> {
    output.lines().find_map(|line| {
        let line = line.trim();
        let rest = line.strip_prefix("INSTDIR")?.trim_start();
        let value = rest.strip_prefix("REG_SZ")?.trim();
        (!value.is_empty()).then(|| PathBuf::from(value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RobolinkError;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_path_must_exist() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("station");

        let err = locate_executable(Some(&missing)).unwrap_err();
        assert!(matches!(
            err,
            RobolinkError::Connect(ConnectError::ExecutableNotFound(ref p)) if *p == missing
        ));

        std::fs::write(&missing, b"").unwrap();
        assert_eq!(locate_executable(Some(&missing)).unwrap(), missing);
    }

    #[test]
    fn test_search_path() {
        let empty = TempDir::new().unwrap();
        let with_exe = TempDir::new().unwrap();
        std::fs::write(with_exe.path().join(EXECUTABLE_NAME), b"").unwrap();

        let joined =
            std::env::join_paths([empty.path(), with_exe.path()]).unwrap();
        assert_eq!(
            search_path(&joined),
            Some(with_exe.path().join(EXECUTABLE_NAME))
        );

        let only_empty = std::env::join_paths([empty.path()]).unwrap();
        assert_eq!(search_path(&only_empty), None);
    }

    #[test]
    fn test_parse_registry_output() {
        let output = "\r\nHKEY_LOCAL_MACHINE\\SOFTWARE\\RoboDK\r\n    INSTDIR    REG_SZ    C:\\RoboDK\r\n\r\n";
        assert_eq!(
            parse_registry_install_dir(output),
            Some(PathBuf::from("C:\\RoboDK"))
        );
        assert_eq!(parse_registry_install_dir("ERROR: not found"), None);
        assert_eq!(parse_registry_install_dir("    INSTDIR    REG_SZ    "), None);
    }

    #[test]
    fn test_default_install_path_names_executable() {
        assert!(default_install_path().ends_with(EXECUTABLE_NAME));
    }
}
