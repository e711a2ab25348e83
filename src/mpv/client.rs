//! High-level MPV client with command methods.

use std::sync::Arc;
use std::time::Duration;

use async_channel::Receiver;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

use super::ipc::{IpcError, MpvIpc, ResponseHandle};
use super::protocol::{MpvCommand, MpvEvent};
use crate::config::AppConfig;

#[derive(Error, Debug)]
pub enum MpvError {
  #[error("Failed to connect to MPV at {path}: {source}")]
  Connect {
    path: String,
    #[source]
    source: IpcError,
  },
  #[error("IPC error: {0}")]
  Ipc(#[from] IpcError),
}

/// High-level MPV client.
#[derive(Clone)]
pub struct MpvClient {
  ipc: Arc<MpvIpc>,
  command_timeout: Duration,
  shutdown_timeout: Duration,
}

impl MpvClient {
  /// Connect to the MPV IPC endpoint named in the config, with retries.
  pub async fn connect(config: &AppConfig) -> Result<Self, MpvError> {
    let ipc = MpvIpc::connect(&config.ipc_path, config.connect_retries)
      .await
      .map_err(|source| MpvError::Connect {
        path: config.ipc_path.clone(),
        source,
      })?;

    log::info!("MPV client connected to {}", config.ipc_path);
    Ok(Self::with_ipc(ipc, config))
  }

  /// Build a client over an already-open stream.
  pub fn from_stream<S>(stream: S, config: &AppConfig) -> Self
  where
    S: AsyncRead + AsyncWrite + Send + 'static,
  {
    Self::with_ipc(MpvIpc::from_stream(stream), config)
  }

  fn with_ipc(ipc: MpvIpc, config: &AppConfig) -> Self {
    Self {
      ipc: Arc::new(ipc),
      command_timeout: config.command_timeout(),
      shutdown_timeout: config.shutdown_timeout(),
    }
  }

  /// Send a command; the response arrives through the returned handle.
  pub async fn send_command(&self, cmd: MpvCommand) -> Result<ResponseHandle, MpvError> {
    Ok(self.ipc.send_command(cmd).await?)
  }

  /// Send a command and wait for its raw response line.
  pub async fn execute(&self, cmd: MpvCommand) -> Result<String, MpvError> {
    let handle = self.send_command(cmd).await?;
    Ok(handle.recv_timeout(self.command_timeout).await?)
  }

  /// Toggle pause.
  pub async fn pause_toggle(&self) -> Result<ResponseHandle, MpvError> {
    self.send_command(MpvCommand::PAUSE_TOGGLE).await
  }

  pub async fn pause_on(&self) -> Result<ResponseHandle, MpvError> {
    self.send_command(MpvCommand::PAUSE_ON).await
  }

  pub async fn pause_off(&self) -> Result<ResponseHandle, MpvError> {
    self.send_command(MpvCommand::PAUSE_OFF).await
  }

  /// Show the on-screen controller permanently.
  pub async fn osc_on(&self) -> Result<ResponseHandle, MpvError> {
    self.send_command(MpvCommand::OSC_ON).await
  }

  /// Hide the on-screen controller.
  pub async fn osc_off(&self) -> Result<ResponseHandle, MpvError> {
    self.send_command(MpvCommand::OSC_OFF).await
  }

  pub async fn playlist_prev(&self) -> Result<ResponseHandle, MpvError> {
    self.send_command(MpvCommand::PLAYLIST_PREV).await
  }

  pub async fn playlist_next(&self) -> Result<ResponseHandle, MpvError> {
    self.send_command(MpvCommand::PLAYLIST_NEXT).await
  }

  pub async fn chapter_prev(&self) -> Result<ResponseHandle, MpvError> {
    self.send_command(MpvCommand::CHAPTER_PREV).await
  }

  pub async fn chapter_next(&self) -> Result<ResponseHandle, MpvError> {
    self.send_command(MpvCommand::CHAPTER_NEXT).await
  }

  /// Simulate a LEFT key press (seek back with the default bindings).
  pub async fn press_left(&self) -> Result<ResponseHandle, MpvError> {
    self.send_command(MpvCommand::PRESS_LEFT).await
  }

  /// Simulate a RIGHT key press.
  pub async fn press_right(&self) -> Result<ResponseHandle, MpvError> {
    self.send_command(MpvCommand::PRESS_RIGHT).await
  }

  /// Get event receiver for property changes and other events.
  pub fn events(&self) -> Receiver<MpvEvent> {
    self.ipc.events()
  }

  /// Check if connected.
  pub fn is_connected(&self) -> bool {
    self.ipc.is_connected()
  }

  /// Number of commands still waiting for a response.
  pub fn outstanding(&self) -> usize {
    self.ipc.outstanding()
  }

  /// Drain outstanding commands and close the connection.
  pub async fn close(&self) -> Result<(), MpvError> {
    log::info!(
      "Closing MPV client ({} command(s) outstanding)",
      self.outstanding()
    );
    self.ipc.close(self.shutdown_timeout).await?;
    Ok(())
  }
}
