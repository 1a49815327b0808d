//! Chunk and identity types for broadcast routing
//!
//! A [`Chunk`] is what one pacing tick produces and what a subscriber's
//! delivery queue carries. It is tagged with the [`Generation`] of the source
//! that read it.

use bytes::Bytes;

/// Monotonically increasing identifier of the active byte source
///
/// Generation 0 is the initial state before any source was installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    /// The generation a fresh registry starts at
    pub const INITIAL: Generation = Generation(0);

    /// Create a generation from its raw value
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The generation that supersedes this one
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw value
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identity of one attached subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub(crate) const fn new(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// A block of source bytes delivered to one subscriber
///
/// Chunk boundaries carry no framing; consumers treat the sequence of
/// `data` as one raw byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Generation of the source that produced these bytes
    pub generation: Generation,
    /// Bytes read on one tick (never longer than the chunk size)
    pub data: Bytes,
}

impl Chunk {
    /// Number of payload bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the chunk carries no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
