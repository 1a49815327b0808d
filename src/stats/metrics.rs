//! Statistics for the relay
//!
//! Counters are plain relaxed atomics bumped on the broadcast path. Dropped
//! chunks are only ever counted here, never logged.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Live counters owned by a registry
#[derive(Debug, Default)]
pub struct BroadcastCounters {
    broadcasts: AtomicU64,
    stale_broadcasts: AtomicU64,
    chunks_delivered: AtomicU64,
    chunks_dropped: AtomicU64,
    bytes_delivered: AtomicU64,
    total_attached: AtomicU64,
    total_detached: AtomicU64,
}

impl BroadcastCounters {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_broadcast(&self, delivered: u64, dropped: u64, bytes: u64) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.chunks_delivered.fetch_add(delivered, Ordering::Relaxed);
        self.chunks_dropped.fetch_add(dropped, Ordering::Relaxed);
        self.bytes_delivered
            .fetch_add(delivered * bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_stale(&self) {
        self.stale_broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_attach(&self) {
        self.total_attached.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_detach(&self, count: u64) {
        self.total_detached.fetch_add(count, Ordering::Relaxed);
    }

    /// Number of chunks dropped for slow subscribers so far
    pub fn chunks_dropped(&self) -> u64 {
        self.chunks_dropped.load(Ordering::Relaxed)
    }

    /// Number of chunks enqueued to subscribers so far
    pub fn chunks_delivered(&self) -> u64 {
        self.chunks_delivered.load(Ordering::Relaxed)
    }

    /// Copy the counters into a snapshot
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            stale_broadcasts: self.stale_broadcasts.load(Ordering::Relaxed),
            chunks_delivered: self.chunks_delivered.load(Ordering::Relaxed),
            chunks_dropped: self.chunks_dropped.load(Ordering::Relaxed),
            bytes_delivered: self.bytes_delivered.load(Ordering::Relaxed),
            total_attached: self.total_attached.load(Ordering::Relaxed),
            total_detached: self.total_detached.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`BroadcastCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    /// Broadcast calls accepted for the current generation
    pub broadcasts: u64,
    /// Broadcast calls rejected because their generation was retired
    pub stale_broadcasts: u64,
    /// Chunks enqueued to subscribers
    pub chunks_delivered: u64,
    /// Chunks discarded because a subscriber's slot was occupied
    pub chunks_dropped: u64,
    /// Payload bytes enqueued to subscribers
    pub bytes_delivered: u64,
    /// Subscribers ever attached
    pub total_attached: u64,
    /// Subscribers ever detached (session end or disconnect)
    pub total_detached: u64,
}

/// Registry-level statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistryStats {
    /// Current generation
    pub generation: u64,
    /// Subscribers currently attached
    pub subscribers: usize,
    /// Cumulative counters
    #[serde(flatten)]
    pub counters: CounterSnapshot,
}

/// Statistics for the active source generation
#[derive(Debug, Clone)]
pub struct SourceStats {
    /// Generation of the source
    pub generation: u64,
    /// Human-readable description of the source
    pub label: String,
    /// Start time
    pub started_at: Instant,
}

impl SourceStats {
    pub fn new(generation: u64, label: String) -> Self {
        Self {
            generation,
            label,
            started_at: Instant::now(),
        }
    }

    /// Time since the generation started
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Relay-wide statistics, as reported by the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct RelayStats {
    /// Registry statistics
    pub registry: RegistryStats,
    /// Active source, if any
    pub source: Option<SourceReport>,
}

/// Serializable view of [`SourceStats`]
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub generation: u64,
    pub label: String,
    pub uptime_secs: u64,
}

impl From<&SourceStats> for SourceReport {
    fn from(stats: &SourceStats) -> Self {
        Self {
            generation: stats.generation,
            label: stats.label.clone(),
            uptime_secs: stats.uptime().as_secs(),
        }
    }
}
