//! Relay: registry plus the source slot
//!
//! ```text
//!   upload accepted
//!         │
//!         ▼
//!   Relay::replace(source)
//!         │ 1. validate size (no state touched on failure)
//!         │ 2. registry.advance_generation()   G -> G+1, listeners disconnected
//!         │ 3. cancel producer G               Active -> Retiring
//!         │ 4. spawn producer G+1              Active
//!         │ 5. await producer G (bounded)      Retiring -> gone
//!         ▼
//! ```

pub mod config;
pub mod controller;

pub use config::{RelayConfig, DEFAULT_MAX_SOURCE_SIZE};
pub use controller::{Relay, SourceInfo};
