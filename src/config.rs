//! Application configuration.
//!
//! Values come from an optional JSON file, then command-line flags (or their
//! environment variables) on top.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_DIR: &str = "mpv-remote";
const CONFIG_FILE: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("Failed to read config {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("Failed to parse config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
  #[error("Invalid config: {0}")]
  Invalid(String),
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
  /// MPV IPC endpoint (named pipe on Windows, Unix socket elsewhere).
  #[serde(default = "default_ipc_path")]
  pub ipc_path: String,

  /// Address the HTTP remote listens on.
  #[serde(default = "default_listen_addr")]
  pub listen_addr: String,

  /// Connection attempts before giving up.
  #[serde(default = "default_connect_retries")]
  pub connect_retries: u32,

  /// How long an HTTP request waits for MPV to answer.
  #[serde(default = "default_timeout_secs")]
  pub command_timeout_secs: u64,

  /// How long shutdown waits for outstanding commands.
  #[serde(default = "default_timeout_secs")]
  pub shutdown_timeout_secs: u64,
}

fn default_ipc_path() -> String {
  #[cfg(windows)]
  {
    r"\\.\pipe\mpv_socket".to_string()
  }
  #[cfg(not(windows))]
  {
    "/tmp/mpv-socket".to_string()
  }
}

fn default_listen_addr() -> String {
  "127.0.0.1:3333".to_string()
}

fn default_connect_retries() -> u32 {
  10
}

fn default_timeout_secs() -> u64 {
  5
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      ipc_path: default_ipc_path(),
      listen_addr: default_listen_addr(),
      connect_retries: default_connect_retries(),
      command_timeout_secs: default_timeout_secs(),
      shutdown_timeout_secs: default_timeout_secs(),
    }
  }
}

impl AppConfig {
  /// Default config file location, if the platform has a config directory.
  pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
  }

  /// Load configuration from a JSON file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Load `path` if given, else the default file if it exists, else defaults.
  pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
    if let Some(path) = path {
      return Self::load(path);
    }
    match Self::default_path() {
      Some(path) if path.exists() => {
        log::info!("Loading config from {}", path.display());
        Self::load(&path)
      }
      _ => Ok(Self::default()),
    }
  }

  /// Validate configuration values.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.ipc_path.trim().is_empty() {
      return Err(ConfigError::Invalid("IPC path cannot be empty".to_string()));
    }
    self.listen_addr()?;
    if self.connect_retries < 1 || self.connect_retries > 100 {
      return Err(ConfigError::Invalid(
        "Connect retries must be between 1 and 100".to_string(),
      ));
    }
    if !(1..=300).contains(&self.command_timeout_secs) {
      return Err(ConfigError::Invalid(
        "Command timeout must be between 1 and 300 seconds".to_string(),
      ));
    }
    if !(1..=300).contains(&self.shutdown_timeout_secs) {
      return Err(ConfigError::Invalid(
        "Shutdown timeout must be between 1 and 300 seconds".to_string(),
      ));
    }
    Ok(())
  }

  pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
    self
      .listen_addr
      .parse()
      .map_err(|e| ConfigError::Invalid(format!("Listen address {:?}: {}", self.listen_addr, e)))
  }

  pub fn command_timeout(&self) -> Duration {
    Duration::from_secs(self.command_timeout_secs)
  }

  pub fn shutdown_timeout(&self) -> Duration {
    Duration::from_secs(self.shutdown_timeout_secs)
  }
}

/// Command-line flags.
#[derive(Debug, Parser)]
#[command(name = "mpv-remote", version, about = "Control mpv from a browser")]
pub struct Cli {
  /// Path to a JSON config file.
  #[arg(long, env = "MPV_REMOTE_CONFIG")]
  pub config: Option<PathBuf>,

  /// MPV IPC endpoint (what mpv was given via --input-ipc-server).
  #[arg(long, env = "MPV_REMOTE_IPC_PATH")]
  pub ipc_path: Option<String>,

  /// HTTP listen address, e.g. 0.0.0.0:3333.
  #[arg(long, env = "MPV_REMOTE_LISTEN")]
  pub listen: Option<String>,
}

impl Cli {
  /// Build the effective configuration.
  pub fn resolve(&self) -> Result<AppConfig, ConfigError> {
    let mut config = AppConfig::load_or_default(self.config.as_deref())?;
    if let Some(ipc_path) = &self.ipc_path {
      config.ipc_path = ipc_path.clone();
    }
    if let Some(listen) = &self.listen {
      config.listen_addr = listen.clone();
    }
    config.validate()?;
    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn test_defaults_are_valid() {
    let config = AppConfig::default();
    config.validate().unwrap();
    assert_eq!(config.listen_addr().unwrap().port(), 3333);
    assert_eq!(config.command_timeout(), Duration::from_secs(5));
  }

  #[test]
  fn test_partial_file_fills_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"ipcPath": "/run/mpv.sock", "commandTimeoutSecs": 2}}"#).unwrap();

    let config = AppConfig::load(file.path()).unwrap();
    assert_eq!(config.ipc_path, "/run/mpv.sock");
    assert_eq!(config.command_timeout_secs, 2);
    assert_eq!(config.listen_addr, default_listen_addr());
    assert_eq!(config.connect_retries, 10);
  }

  #[test]
  fn test_bad_json_reports_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();

    let err = AppConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains(&file.path().display().to_string()));
  }

  #[test]
  fn test_missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = AppConfig::load_or_default(Some(dir.path().join("nope.json").as_path())).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
  }

  #[test]
  fn test_validate_rejects_bad_values() {
    let cases = [
      AppConfig {
        ipc_path: "  ".to_string(),
        ..AppConfig::default()
      },
      AppConfig {
        listen_addr: "localhost".to_string(),
        ..AppConfig::default()
      },
      AppConfig {
        connect_retries: 0,
        ..AppConfig::default()
      },
      AppConfig {
        command_timeout_secs: 0,
        ..AppConfig::default()
      },
      AppConfig {
        shutdown_timeout_secs: 301,
        ..AppConfig::default()
      },
    ];
    for config in cases {
      assert!(config.validate().is_err(), "{:?}", config);
    }
  }

  #[test]
  fn test_cli_overrides_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"ipcPath": "/from/file", "listenAddr": "0.0.0.0:8000"}}"#).unwrap();

    let path = file.path().display().to_string();
    let cli = Cli::parse_from([
      "mpv-remote",
      "--config",
      path.as_str(),
      "--listen",
      "127.0.0.1:9000",
    ]);
    let config = cli.resolve().unwrap();
    assert_eq!(config.ipc_path, "/from/file");
    assert_eq!(config.listen_addr, "127.0.0.1:9000");
  }
}
