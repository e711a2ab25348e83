//! Line-delimited transport over the MPV IPC stream.
//!
//! The read and write halves are separate so the reader task can block on
//! `read_line` while commands are being written.

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

#[derive(Error, Debug)]
pub enum TransportError {
  #[error("Read failed: {0}")]
  Read(#[source] std::io::Error),
  #[error("Write failed: {0}")]
  Write(#[source] std::io::Error),
}

/// Read half: yields one line at a time.
pub struct LineReader<R> {
  reader: BufReader<R>,
  buf: String,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
  pub fn new(reader: R) -> Self {
    Self {
      reader: BufReader::new(reader),
      buf: String::new(),
    }
  }

  /// Read the next line without its terminator.
  ///
  /// Returns `Ok(None)` at end of stream.
  pub async fn read_line(&mut self) -> Result<Option<String>, TransportError> {
    self.buf.clear();
    let n = self
      .reader
      .read_line(&mut self.buf)
      .await
      .map_err(TransportError::Read)?;

    if n == 0 {
      return Ok(None);
    }

    let line = self.buf.trim_end_matches(['\n', '\r']);
    Ok(Some(line.to_string()))
  }
}

/// Write half: writes whole lines and flushes after each one.
pub struct LineWriter<W> {
  writer: W,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
  pub fn new(writer: W) -> Self {
    Self { writer }
  }

  /// Write `line` followed by `\n`, then flush.
  ///
  /// A failure leaves the stream in an unknown state; callers should treat
  /// the connection as unusable.
  pub async fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
    self
      .writer
      .write_all(line.as_bytes())
      .await
      .map_err(TransportError::Write)?;
    self
      .writer
      .write_all(b"\n")
      .await
      .map_err(TransportError::Write)?;
    self.writer.flush().await.map_err(TransportError::Write)?;
    Ok(())
  }

  /// Close the write half of the stream.
  pub async fn shutdown(&mut self) -> Result<(), TransportError> {
    self.writer.shutdown().await.map_err(TransportError::Write)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Cursor;

  #[tokio::test]
  async fn test_read_lines_until_eof() {
    let input = b"{\"event\":\"idle\"}\r\n{\"request_id\":1}\n".to_vec();
    let mut reader = LineReader::new(Cursor::new(input));

    assert_eq!(
      reader.read_line().await.unwrap(),
      Some("{\"event\":\"idle\"}".to_string())
    );
    assert_eq!(
      reader.read_line().await.unwrap(),
      Some("{\"request_id\":1}".to_string())
    );
    assert_eq!(reader.read_line().await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_read_final_line_without_terminator() {
    let mut reader = LineReader::new(Cursor::new(b"partial".to_vec()));
    assert_eq!(reader.read_line().await.unwrap(), Some("partial".to_string()));
    assert_eq!(reader.read_line().await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_write_appends_newline() {
    let mut writer = LineWriter::new(Vec::new());
    writer.write_line("{\"command\": [\"quit\"]}").await.unwrap();
    writer.write_line("second").await.unwrap();
    let output = String::from_utf8(writer.writer).unwrap();
    assert_eq!(output, "{\"command\": [\"quit\"]}\nsecond\n");
  }

  #[tokio::test]
  async fn test_write_to_closed_peer_fails() {
    let (client, server) = tokio::io::duplex(64);
    drop(server);
    let mut writer = LineWriter::new(client);
    let err = writer.write_line("{}").await.unwrap_err();
    assert!(matches!(err, TransportError::Write(_)));
  }
}
