use async_channel::Receiver;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub mod config;
pub mod http;
pub mod mpv;

pub use config::{AppConfig, Cli, ConfigError};
use crate::http::{HttpError, HttpServer};
use crate::mpv::{MpvClient, MpvError, MpvEvent};

#[derive(Error, Debug)]
pub enum AppError {
  #[error(transparent)]
  Config(#[from] ConfigError),
  #[error(transparent)]
  Mpv(#[from] MpvError),
  #[error(transparent)]
  Http(#[from] HttpError),
}

/// Install the logger. `RUST_LOG` overrides the default `info` level.
pub fn init_logging() {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Connect to MPV and serve the remote until Ctrl-C.
pub async fn run(cli: Cli) -> Result<(), AppError> {
  let config = cli.resolve()?;
  let listen_addr = config.listen_addr()?;

  let client = MpvClient::connect(&config).await?;
  let shutdown = CancellationToken::new();

  let events = tokio::spawn(log_events(client.events(), shutdown.clone()));

  let signal = shutdown.clone();
  tokio::spawn(async move {
    match tokio::signal::ctrl_c().await {
      Ok(()) => {
        log::info!("Shutdown requested");
        signal.cancel();
      }
      Err(e) => log::error!("Failed to listen for Ctrl-C: {}", e),
    }
  });

  let served = HttpServer::new(client.clone(), listen_addr)
    .run(shutdown.clone())
    .await;

  shutdown.cancel();
  if let Err(e) = events.await {
    log::error!("Event logger task failed: {}", e);
  }
  client.close().await?;
  served?;
  Ok(())
}

/// Drain MPV notifications into the log.
async fn log_events(events: Receiver<MpvEvent>, shutdown: CancellationToken) {
  loop {
    tokio::select! {
      _ = shutdown.cancelled() => break,
      event = events.recv() => match event {
        Ok(event) => log::info!("MPV event ( {} ): {}", event.name, event.line),
        Err(_) => break,
      },
    }
  }
}
