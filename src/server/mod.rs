//! HTTP relay server
//!
//! Uploads become the active source; every `/stream` response is one
//! listener attached to the relay for as long as the client stays connected.

pub mod config;
pub mod error;
pub mod handlers;
pub mod listener;
pub mod storage;

pub use config::{ServerConfig, DEFAULT_PORT, DEFAULT_UPLOAD_DIR, STREAM_CONTENT_TYPE};
pub use error::{AppError, AppResult};
pub use handlers::{router, AppState, UploadResponse};
pub use listener::RelayServer;
pub use storage::UploadStore;
