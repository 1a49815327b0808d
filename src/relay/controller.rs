//! Source-replace controller
//!
//! Owns the single source slot. Installing a new source retires the current
//! generation: the registry advances its generation and disconnects every
//! listener in one critical section, the old producer is cancelled, and a
//! new producer starts broadcasting as the new generation.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::registry::{Generation, Registry, Subscription};
use crate::source::{ByteSource, FileSource, PacedSource, SourceExit, SourceHandle};
use crate::stats::{RelayStats, SourceReport, SourceStats};

use super::config::RelayConfig;

/// The producer currently installed in the slot
struct ActiveSource {
    handle: SourceHandle,
    stats: SourceStats,
}

/// Public view of the active source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    /// Generation the source broadcasts as
    pub generation: Generation,
    /// Description of the byte source
    pub label: String,
    /// Whether its loop is still running
    pub running: bool,
}

/// Paced relay: one registry, at most one active source
pub struct Relay {
    registry: Arc<Registry>,
    config: RelayConfig,
    slot: Mutex<Option<ActiveSource>>,
    // Readable without awaiting the slot, for stats.
    current: parking_lot::Mutex<Option<SourceStats>>,
}

impl Relay {
    /// Create a relay with no source installed
    pub fn new(config: RelayConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            registry: Arc::new(Registry::with_chunk_size(config.pacing.chunk_size)),
            config,
            slot: Mutex::new(None),
            current: parking_lot::Mutex::new(None),
        })
    }

    /// The registry listeners attach to
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Relay configuration
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Attach a listener to the current generation
    ///
    /// After [`shutdown`](Self::shutdown) the subscription is already closed.
    pub fn subscribe(&self) -> Subscription {
        self.registry.subscribe()
    }

    /// Check a source against the ingress limits without touching any state
    pub async fn validate_source<S: ByteSource>(&self, source: &S) -> Result<u64> {
        let size = source.size().await?;
        self.check_size(size)?;
        Ok(size)
    }

    /// Reject a declared size above the configured maximum
    pub fn check_size(&self, size: u64) -> Result<()> {
        if size > self.config.max_source_size {
            return Err(Error::SourceTooLarge {
                size,
                max: self.config.max_source_size,
            });
        }
        if size == 0 {
            return Err(Error::EmptySource);
        }
        Ok(())
    }

    /// Make `source` the active source
    ///
    /// Listeners attached to the previous source are disconnected; listeners
    /// attaching from now on only hear the new one. Validation failures
    /// return before anything changes. Fails with [`Error::RelayClosed`]
    /// after [`shutdown`](Self::shutdown).
    pub async fn replace<S: ByteSource>(&self, source: S) -> Result<Generation> {
        let size = self.validate_source(&source).await?;
        let label = source.label();

        let mut slot = self.slot.lock().await;
        if self.registry.is_closed() {
            return Err(Error::RelayClosed);
        }

        let (generation, disconnected) = self.registry.advance_generation();
        let producer = PacedSource::new(
            source,
            generation,
            Arc::clone(&self.registry),
            self.config.pacing.clone(),
        )?;

        // Retiring: cancelled, not yet confirmed stopped.
        let retiring = slot.take();
        if let Some(old) = &retiring {
            old.handle.cancel();
        }

        let handle = producer.spawn();

        let stats = SourceStats::new(generation.get(), label.clone());
        *self.current.lock() = Some(stats.clone());
        *slot = Some(ActiveSource { handle, stats });
        drop(slot);

        tracing::info!(
            generation = %generation,
            source = %label,
            size,
            disconnected,
            "Source installed"
        );

        if let Some(old) = retiring {
            let retired = old.handle.generation();
            let exit = old.handle.stop_timeout(self.config.retire_timeout).await;
            tracing::info!(
                generation = %retired,
                uptime_secs = old.stats.uptime().as_secs(),
                exit = ?exit,
                "Source retired"
            );
        }

        Ok(generation)
    }

    /// Make the file at `path` the active source
    pub async fn replace_file(&self, path: impl AsRef<Path>) -> Result<Generation> {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(Error::SourceNotFound(path.to_path_buf()));
        }
        self.replace(FileSource::new(path)).await
    }

    /// Describe the active source, if any
    pub async fn current(&self) -> Option<SourceInfo> {
        let slot = self.slot.lock().await;
        slot.as_ref().map(|active| SourceInfo {
            generation: active.handle.generation(),
            label: active.handle.label().to_string(),
            running: !active.handle.is_finished(),
        })
    }

    /// Stop the active source and disconnect every listener
    ///
    /// The relay stays closed: later subscriptions end immediately and
    /// [`replace`](Self::replace) is refused.
    pub async fn shutdown(&self) -> Option<SourceExit> {
        let (active, disconnected) = {
            let mut slot = self.slot.lock().await;
            let disconnected = self.registry.close();
            (slot.take(), disconnected)
        };
        self.current.lock().take();

        let exit = match active {
            Some(active) => Some(active.handle.stop_timeout(self.config.retire_timeout).await),
            None => None,
        };

        tracing::info!(disconnected, exit = ?exit, "Relay shut down");
        exit
    }

    /// Whether [`shutdown`](Self::shutdown) was called
    pub fn is_closed(&self) -> bool {
        self.registry.is_closed()
    }

    /// Snapshot of relay statistics
    pub fn stats(&self) -> RelayStats {
        RelayStats {
            registry: self.registry.stats(),
            source: self.current.lock().as_ref().map(SourceReport::from),
        }
    }
}
