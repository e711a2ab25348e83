//! Async IPC connection to MPV.
//!
//! One reader task owns the read half of the stream and routes each line to
//! the pending command it answers or to the event channel. Writers take turns
//! on the write half. The pending table, the request ID counter and the
//! outstanding count share a single lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use super::protocol::{MpvCommand, MpvEvent, MpvMessage};
use super::transport::{LineReader, LineWriter, TransportError};

/// Events buffered for consumers before new ones are dropped.
const EVENT_CAPACITY: usize = 256;

#[derive(Error, Debug)]
pub enum IpcError {
  #[error("Connection failed: {0}")]
  ConnectionFailed(#[source] std::io::Error),
  #[error(transparent)]
  Transport(#[from] TransportError),
  #[error("Command timeout")]
  Timeout,
  #[error("Disconnected")]
  Disconnected,
  #[error("Connection closed")]
  Closed,
}

/// Pending request waiting for its raw response line.
type PendingRequest = oneshot::Sender<String>;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Routing state shared between senders and the reader task.
struct IpcState {
  pending: HashMap<u32, PendingRequest>,
  next_id: u32,
  /// The reader is gone or a write was cut short; nothing new may be sent.
  disconnected: bool,
  /// `close()` has begun.
  closed: bool,
}

impl IpcState {
  /// Next ID from the counter that is not currently outstanding.
  fn allocate_id(&mut self) -> u32 {
    loop {
      let id = self.next_id;
      self.next_id = self.next_id.wrapping_add(1);
      if !self.pending.contains_key(&id) {
        return id;
      }
    }
  }

  /// Why a command cannot be sent right now, if it cannot.
  fn refusal(&self) -> Option<IpcError> {
    if self.closed {
      Some(IpcError::Closed)
    } else if self.disconnected {
      Some(IpcError::Disconnected)
    } else {
      None
    }
  }
}

struct Shared {
  state: Mutex<IpcState>,
  /// Mirrors `state.pending.len()`; only written with `state` locked.
  outstanding: watch::Sender<usize>,
}

impl Shared {
  fn new() -> Self {
    Self {
      state: Mutex::new(IpcState {
        pending: HashMap::new(),
        next_id: 1,
        disconnected: false,
        closed: false,
      }),
      outstanding: watch::Sender::new(0),
    }
  }

  fn register(&self) -> Result<(u32, oneshot::Receiver<String>), IpcError> {
    let mut state = self.state.lock();
    if let Some(err) = state.refusal() {
      return Err(err);
    }
    let request_id = state.allocate_id();
    let (tx, rx) = oneshot::channel();
    state.pending.insert(request_id, tx);
    self.outstanding.send_replace(state.pending.len());
    Ok((request_id, rx))
  }

  /// Error for a sender that found no writer.
  fn unavailable(&self) -> IpcError {
    self.state.lock().refusal().unwrap_or(IpcError::Closed)
  }

  /// Drop a pending entry without answering it.
  fn deregister(&self, request_id: u32) -> bool {
    let mut state = self.state.lock();
    let removed = state.pending.remove(&request_id).is_some();
    if removed {
      self.outstanding.send_replace(state.pending.len());
    }
    removed
  }

  /// Drop the entry of a command whose write did not complete and refuse
  /// further sends: part of its line may already be on the wire.
  fn poison(&self, request_id: u32) {
    let mut state = self.state.lock();
    state.disconnected = true;
    if state.pending.remove(&request_id).is_some() {
      self.outstanding.send_replace(state.pending.len());
    }
  }

  /// Deliver a response line to its pending request.
  fn resolve(&self, request_id: u32, line: String) -> bool {
    let mut state = self.state.lock();
    let Some(tx) = state.pending.remove(&request_id) else {
      return false;
    };
    self.outstanding.send_replace(state.pending.len());
    // The caller may have abandoned its handle.
    let _ = tx.send(line);
    true
  }

  /// Fail every pending request and refuse new ones. Handles see
  /// `Disconnected`.
  fn fail_all(&self) -> usize {
    let mut state = self.state.lock();
    state.disconnected = true;
    let pending = std::mem::take(&mut state.pending);
    self.outstanding.send_replace(0);
    pending.len()
  }
}

/// Poisons the connection unless the command's line was written in full.
///
/// Fires on a write error and when the send future is dropped mid-write.
struct Registration<'a> {
  shared: &'a Shared,
  request_id: u32,
  armed: bool,
}

impl Drop for Registration<'_> {
  fn drop(&mut self) {
    if self.armed {
      log::warn!(
        "MPV IPC write for request_id={} did not complete; refusing further commands",
        self.request_id
      );
      self.shared.poison(self.request_id);
    }
  }
}

/// Handle for the response to one command.
///
/// Dropping it abandons the command: the request stays outstanding until MPV
/// answers, the connection ends, or the connection is closed.
pub struct ResponseHandle {
  request_id: u32,
  rx: oneshot::Receiver<String>,
  shared: Arc<Shared>,
}

impl ResponseHandle {
  /// The request ID assigned to the command.
  pub fn id(&self) -> u32 {
    self.request_id
  }

  /// Wait for the raw response line.
  pub async fn recv(self) -> Result<String, IpcError> {
    self.rx.await.map_err(|_| IpcError::Disconnected)
  }

  /// Wait for the raw response line, giving up after `timeout`.
  ///
  /// On timeout the request is unregistered, so a late response is discarded.
  pub async fn recv_timeout(mut self, timeout: Duration) -> Result<String, IpcError> {
    match tokio::time::timeout(timeout, &mut self.rx).await {
      Ok(Ok(line)) => Ok(line),
      Ok(Err(_)) => Err(IpcError::Disconnected),
      Err(_) => {
        if self.shared.deregister(self.request_id) {
          log::error!(
            "MPV command timeout after {:?}, request_id={}",
            timeout,
            self.request_id
          );
          return Err(IpcError::Timeout);
        }
        // Resolved or failed between the deadline and the unregister.
        self.rx.try_recv().map_err(|_| IpcError::Disconnected)
      }
    }
  }
}

/// MPV IPC connection.
pub struct MpvIpc {
  shared: Arc<Shared>,
  writer: tokio::sync::Mutex<Option<LineWriter<BoxedWriter>>>,
  event_rx: Receiver<MpvEvent>,
  reader_handle: Mutex<Option<JoinHandle<()>>>,
}

impl MpvIpc {
  /// Connect to MPV IPC socket/pipe.
  pub async fn connect(path: &str, retry_count: u32) -> Result<Self, IpcError> {
    let mut last_error = None;

    for attempt in 0..retry_count.max(1) {
      if attempt > 0 {
        tokio::time::sleep(Duration::from_millis(100 * (attempt as u64 + 1))).await;
      }

      match Self::try_connect(path).await {
        Ok(ipc) => return Ok(ipc),
        Err(e) => {
          log::debug!("IPC connect attempt {} failed: {}", attempt + 1, e);
          last_error = Some(e);
        }
      }
    }

    Err(last_error.unwrap_or(IpcError::Disconnected))
  }

  #[cfg(windows)]
  async fn try_connect(path: &str) -> Result<Self, IpcError> {
    use tokio::net::windows::named_pipe::ClientOptions;

    let client = ClientOptions::new()
      .open(path)
      .map_err(IpcError::ConnectionFailed)?;

    Ok(Self::from_stream(client))
  }

  #[cfg(not(windows))]
  async fn try_connect(path: &str) -> Result<Self, IpcError> {
    use tokio::net::UnixStream;

    let stream = UnixStream::connect(path)
      .await
      .map_err(IpcError::ConnectionFailed)?;

    Ok(Self::from_stream(stream))
  }

  /// Multiplex commands over an already-open duplex stream.
  ///
  /// Must be called from within a Tokio runtime.
  pub fn from_stream<S>(stream: S) -> Self
  where
    S: AsyncRead + AsyncWrite + Send + 'static,
  {
    let (reader, writer) = tokio::io::split(stream);
    Self::new(reader, writer)
  }

  /// Multiplex commands over separate read and write halves.
  pub fn new<R, W>(reader: R, writer: W) -> Self
  where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
  {
    let shared = Arc::new(Shared::new());
    let (event_tx, event_rx) = async_channel::bounded(EVENT_CAPACITY);

    let reader_shared = shared.clone();
    let reader_handle = tokio::spawn(async move {
      Self::reader_loop(LineReader::new(reader), reader_shared, event_tx).await;
    });

    let writer: BoxedWriter = Box::new(writer);
    Self {
      shared,
      writer: tokio::sync::Mutex::new(Some(LineWriter::new(writer))),
      event_rx,
      reader_handle: Mutex::new(Some(reader_handle)),
    }
  }

  async fn reader_loop<R: AsyncRead + Unpin>(
    mut reader: LineReader<R>,
    shared: Arc<Shared>,
    event_tx: Sender<MpvEvent>,
  ) {
    log::info!("MPV IPC reader loop started");

    loop {
      match reader.read_line().await {
        Ok(None) => {
          log::info!("MPV IPC connection closed by peer");
          break;
        }
        Ok(Some(line)) => {
          if line.trim().is_empty() {
            continue;
          }
          Self::route(&shared, &event_tx, line);
        }
        Err(e) => {
          log::error!("MPV IPC read error: {}", e);
          break;
        }
      }
    }

    let orphaned = shared.fail_all();
    if orphaned > 0 {
      log::warn!(
        "MPV IPC reader stopped with {} command(s) unanswered",
        orphaned
      );
    }
  }

  fn route(shared: &Shared, event_tx: &Sender<MpvEvent>, line: String) {
    match MpvMessage::parse(&line) {
      MpvMessage::Response { request_id, line } => {
        log::debug!("MPV reader: received response for request_id={}", request_id);
        if !shared.resolve(request_id, line) {
          log::warn!(
            "MPV reader: discarding response for unknown request_id={}",
            request_id
          );
        }
      }
      MpvMessage::Event(event) => {
        log::debug!("MPV reader: received event {}", event.name);
        match event_tx.try_send(event) {
          Ok(()) => {}
          Err(TrySendError::Full(event)) => {
            log::debug!("MPV event queue full, dropping {}", event.name);
          }
          Err(TrySendError::Closed(_)) => {}
        }
      }
      MpvMessage::Malformed(reason) => {
        log::warn!("Skipping malformed MPV message ({}): {}", reason, line);
      }
    }
  }

  /// Send a command to MPV.
  ///
  /// Returns once the command has been written and flushed; the response is
  /// awaited through the returned handle. If the write fails or this future
  /// is dropped before it finishes, the connection is treated as unusable and
  /// later sends get `Disconnected`.
  pub async fn send_command(&self, cmd: MpvCommand) -> Result<ResponseHandle, IpcError> {
    let mut guard = self.writer.lock().await;
    // Out of the slot while writing, so an interrupted write leaves it empty.
    let Some(mut writer) = guard.take() else {
      return Err(self.shared.unavailable());
    };

    // Registered before writing so the response can never outrun it.
    let (request_id, rx) = match self.shared.register() {
      Ok(registered) => registered,
      Err(e) => {
        *guard = Some(writer);
        return Err(e);
      }
    };
    let mut registration = Registration {
      shared: &self.shared,
      request_id,
      armed: true,
    };

    let line = cmd.wire_line(request_id);
    log::debug!("Sending MPV command: {}", line);

    if let Err(e) = writer.write_line(&line).await {
      log::error!("MPV IPC write error: {}", e);
      return Err(e.into());
    }
    registration.armed = false;
    *guard = Some(writer);

    Ok(ResponseHandle {
      request_id,
      rx,
      shared: self.shared.clone(),
    })
  }

  /// Get the event receiver for property changes and other events.
  pub fn events(&self) -> Receiver<MpvEvent> {
    self.event_rx.clone()
  }

  /// Number of commands sent but not yet answered.
  pub fn outstanding(&self) -> usize {
    *self.shared.outstanding.borrow()
  }

  /// Whether commands can still be sent and answered.
  pub fn is_connected(&self) -> bool {
    self.shared.state.lock().refusal().is_none()
      && self
        .reader_handle
        .lock()
        .as_ref()
        .is_some_and(|handle| !handle.is_finished())
  }

  /// Close the connection.
  ///
  /// New commands are refused with `Closed` from the moment this is called.
  /// Waits up to `drain_timeout` for outstanding commands to be answered;
  /// whatever is still pending after that is failed with `Disconnected`.
  /// Calling it again is a no-op.
  pub async fn close(&self, drain_timeout: Duration) -> Result<(), IpcError> {
    {
      let mut state = self.shared.state.lock();
      if state.closed {
        return Ok(());
      }
      state.closed = true;
    }
    // Waits only for a write already in progress.
    let writer = self.writer.lock().await.take();

    let mut outstanding = self.shared.outstanding.subscribe();
    let drained = tokio::time::timeout(drain_timeout, outstanding.wait_for(|n| *n == 0))
      .await
      .is_ok();
    if !drained {
      let abandoned = self.shared.fail_all();
      log::warn!(
        "Closing MPV IPC with {} command(s) still outstanding",
        abandoned
      );
    }

    let result = match writer {
      Some(mut writer) => writer.shutdown().await,
      None => Ok(()),
    };
    if let Some(handle) = self.reader_handle.lock().take() {
      handle.abort();
    }

    log::info!("MPV IPC connection closed");
    result.map_err(IpcError::from)
  }
}

impl Drop for MpvIpc {
  fn drop(&mut self) {
    if let Some(handle) = self.reader_handle.get_mut().take() {
      handle.abort();
    }
  }
}
