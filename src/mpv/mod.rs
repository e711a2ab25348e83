//! MPV IPC module - controls an external MPV player via JSON IPC.
//!
//! Architecture:
//! - `transport.rs` - Line-delimited reads and flushed writes over the stream
//! - `protocol.rs` - Command templates and incoming message classification
//! - `ipc.rs` - Multiplexes concurrent commands over one connection (Named Pipes on Windows, Unix Sockets elsewhere)
//! - `client.rs` - High-level MPV client with command methods

mod client;
mod ipc;
mod protocol;
mod transport;

pub use client::{MpvClient, MpvError};
pub use ipc::{IpcError, MpvIpc, ResponseHandle};
pub use protocol::{MpvCommand, MpvEvent, MpvMessage, MpvResponse};
pub use transport::{LineReader, LineWriter, TransportError};
