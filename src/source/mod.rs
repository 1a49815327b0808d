//! Paced sources
//!
//! Turns a byte source into a stream of chunks at a fixed cadence and feeds
//! them to the registry.

pub mod byte_source;
pub mod config;
pub mod paced;

pub use byte_source::{ByteSource, FileSource, MemorySource};
pub use config::{PacingConfig, DEFAULT_TICK_PERIOD};
pub use paced::{PacedSource, SourceExit, SourceHandle};
