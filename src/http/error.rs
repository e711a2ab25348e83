//! HTTP server error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
  #[error("Failed to bind on {addr}: {source}")]
  Bind {
    addr: String,
    #[source]
    source: std::io::Error,
  },
  #[error("Server error: {0}")]
  Serve(String),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_bind_error_displays_address() {
    let err = HttpError::Bind {
      addr: "127.0.0.1:3333".into(),
      source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
    };
    let msg = err.to_string();
    assert!(msg.contains("127.0.0.1:3333"));
    assert!(msg.contains("in use"));
  }
}
