//! loopcast: a paced audio relay
//!
//! One uploaded file is read in fixed-size chunks on a fixed cadence and
//! fanned out to every connected listener, looping forever so late joiners
//! hear a continuous rebroadcast.
//!
//! # Layers
//!
//! - [`registry`]: concurrent set of subscribers with a single-slot,
//!   drop-on-full delivery policy and generation tagging
//! - [`source`]: the paced producer loop over a [`ByteSource`]
//! - [`session`]: forwarding a subscription into an outbound sink
//! - [`relay`]: the source slot and atomic source replacement
//! - [`server`]: HTTP upload/stream endpoints (axum)
//!
//! # Example
//!
//! ```no_run
//! use loopcast::{RelayServer, ServerConfig};
//!
//! # async fn run() -> loopcast::Result<()> {
//! let config = ServerConfig::default().public_url("http://127.0.0.1:8080");
//! let server = RelayServer::new(config)?;
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await
//! # }
//! ```

pub mod error;
pub mod registry;
pub mod relay;
pub mod server;
pub mod session;
pub mod source;
pub mod stats;

pub use error::{Error, Result};
pub use registry::{Chunk, Generation, Registry, SubscriberId, Subscription};
pub use relay::{Relay, RelayConfig};
pub use server::{RelayServer, ServerConfig};
pub use session::{pump, SessionEnd, SessionReport};
pub use source::{ByteSource, FileSource, MemorySource, PacedSource, PacingConfig, SourceExit};
pub use stats::RelayStats;
