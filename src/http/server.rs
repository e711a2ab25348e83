//! HTTP server that binds the router to a TCP socket.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::error::HttpError;
use super::router::{build_router, AppState};
use crate::mpv::MpvClient;

/// Axum-based HTTP server for the remote.
pub struct HttpServer {
  addr: SocketAddr,
  state: AppState,
}

impl HttpServer {
  pub fn new(client: MpvClient, addr: SocketAddr) -> Self {
    Self {
      addr,
      state: AppState { client },
    }
  }

  /// Serve until `shutdown` is cancelled.
  ///
  /// In-flight requests are allowed to finish before this returns.
  pub async fn run(self, shutdown: CancellationToken) -> Result<(), HttpError> {
    let listener = TcpListener::bind(self.addr)
      .await
      .map_err(|e| HttpError::Bind {
        addr: self.addr.to_string(),
        source: e,
      })?;

    let local = listener.local_addr().unwrap_or(self.addr);
    log::info!("HTTP remote listening on http://{}", local);

    let router = build_router(self.state);
    axum::serve(listener, router)
      .with_graceful_shutdown(async move { shutdown.cancelled().await })
      .await
      .map_err(|e| HttpError::Serve(e.to_string()))?;

    log::info!("HTTP remote stopped");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::AppConfig;
  use std::time::Duration;

  fn make_client() -> MpvClient {
    let (client_end, _server_end) = tokio::io::duplex(1024);
    MpvClient::from_stream(client_end, &AppConfig::default())
  }

  #[tokio::test]
  async fn test_run_stops_on_cancel() {
    let server = HttpServer::new(make_client(), "127.0.0.1:0".parse().unwrap());
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(5), server.run(shutdown))
      .await
      .expect("server should stop")
      .unwrap();
  }

  #[tokio::test]
  async fn test_bind_conflict_is_reported() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = taken.local_addr().unwrap();

    let err = HttpServer::new(make_client(), addr)
      .run(CancellationToken::new())
      .await
      .unwrap_err();
    assert!(matches!(err, HttpError::Bind { .. }));
  }
}
