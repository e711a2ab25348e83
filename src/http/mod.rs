//! HTTP remote for MPV.
//!
//! `GET /` serves the control page, `GET /api/{command}` sends one command
//! and redirects back, `GET /health` reports the IPC connection.

mod error;
pub mod router;
pub mod server;

pub use error::HttpError;
pub use router::{build_router, AppState};
pub use server::HttpServer;
