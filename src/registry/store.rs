//! Subscriber registry implementation
//!
//! The central set of attached subscribers and the current generation, both
//! behind a single mutex. Add, remove, broadcast and generation changes all
//! serialize on it; the lock is never held across an await.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::stats::{BroadcastCounters, RegistryStats};

use super::chunk::{Generation, SubscriberId};
use super::subscriber::{Delivery, Subscriber, Subscription};

/// Default chunk size used to size subscriber scratch buffers
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Outcome of one broadcast call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// Chunk belonged to the current generation and was fanned out
    Delivered {
        /// Subscribers that received the chunk
        sent: usize,
        /// Subscribers whose slot was still occupied
        dropped: usize,
    },
    /// Chunk was tagged with a retired generation and reached nobody
    Stale {
        /// The generation that is current instead
        current: Generation,
    },
}

impl BroadcastOutcome {
    /// Whether the producer that issued this broadcast has been superseded
    pub fn is_stale(&self) -> bool {
        matches!(self, BroadcastOutcome::Stale { .. })
    }
}

struct Members {
    generation: Generation,
    subscribers: HashMap<SubscriberId, Subscriber>,
    closed: bool,
}

/// Registry of attached subscribers
///
/// Constructed once and shared by `Arc` between the paced source and the
/// session layer.
pub struct Registry {
    members: Mutex<Members>,
    next_id: AtomicU64,
    chunk_size: usize,
    counters: BroadcastCounters,
}

impl Registry {
    /// Create a registry sized for the default chunk size
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    /// Create a registry whose subscribers buffer `chunk_size` bytes
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            members: Mutex::new(Members {
                generation: Generation::INITIAL,
                subscribers: HashMap::new(),
                closed: false,
            }),
            next_id: AtomicU64::new(1),
            chunk_size,
            counters: BroadcastCounters::new(),
        }
    }

    /// Chunk size the scratch buffers are sized for
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Attach a new subscriber
    ///
    /// The returned [`Subscription`] removes the subscriber when dropped. On a
    /// closed registry the subscription is already disconnected.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = SubscriberId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (subscriber, rx) = Subscriber::new(self.chunk_size);

        let mut members = self.members.lock();
        let generation = members.generation;
        if members.closed {
            drop(members);
            // Dropping the sender closes the queue right away.
            drop(subscriber);
            tracing::debug!(subscriber = %id, "Subscriber refused, registry closed");
            return Subscription::new(id, generation, rx, Arc::clone(self));
        }
        members.subscribers.insert(id, subscriber);
        let count = members.subscribers.len();
        drop(members);
        self.counters.record_attach();

        tracing::info!(
            subscriber = %id,
            generation = %generation,
            subscribers = count,
            "Subscriber added"
        );

        Subscription::new(id, generation, rx, Arc::clone(self))
    }

    /// Remove a subscriber
    ///
    /// No-op if it is absent (already disconnected by a generation change).
    pub fn remove(&self, id: SubscriberId) {
        let (removed, count) = {
            let mut members = self.members.lock();
            let removed = members.subscribers.remove(&id);
            (removed, members.subscribers.len())
        };

        if removed.is_some() {
            self.counters.record_detach(1);
            tracing::info!(subscriber = %id, subscribers = count, "Subscriber removed");
        }
    }

    /// Fan a chunk out to every attached subscriber
    ///
    /// Chunks from a generation other than the current one are rejected. A
    /// subscriber whose single slot is still occupied misses this chunk; the
    /// broadcaster never waits on anyone.
    pub fn broadcast(&self, data: &[u8], generation: Generation) -> BroadcastOutcome {
        let mut members = self.members.lock();

        if members.closed || members.generation != generation {
            let current = members.generation;
            drop(members);
            self.counters.record_stale();
            return BroadcastOutcome::Stale { current };
        }

        let mut sent = 0;
        let mut dropped = 0;
        for subscriber in members.subscribers.values_mut() {
            match subscriber.offer(data, generation) {
                Delivery::Sent => sent += 1,
                Delivery::Dropped => dropped += 1,
                // Its subscription is being dropped and will remove it.
                Delivery::Closed => {}
            }
        }
        drop(members);

        self.counters
            .record_broadcast(sent as u64, dropped as u64, data.len() as u64);

        BroadcastOutcome::Delivered { sent, dropped }
    }

    /// Retire the current generation
    ///
    /// In one critical section: bump the generation and disconnect every
    /// attached subscriber (their queues close, so their sessions end).
    /// Subscribers attaching afterwards belong to the new generation.
    /// Returns the new generation and how many subscribers were disconnected.
    pub fn advance_generation(&self) -> (Generation, usize) {
        self.retire(false)
    }

    /// Retire the current generation and refuse all further subscribers
    ///
    /// Every later [`subscribe`](Self::subscribe) returns a subscription that
    /// is already disconnected, and every broadcast is stale. Returns how many
    /// subscribers were disconnected.
    pub fn close(&self) -> usize {
        self.retire(true).1
    }

    /// Whether [`close`](Self::close) was called
    pub fn is_closed(&self) -> bool {
        self.members.lock().closed
    }

    fn retire(&self, close: bool) -> (Generation, usize) {
        let (generation, disconnected) = {
            let mut members = self.members.lock();
            members.generation = members.generation.next();
            members.closed |= close;
            (
                members.generation,
                std::mem::take(&mut members.subscribers),
            )
        };

        let count = disconnected.len();
        // Dropping the senders outside the lock closes the queues.
        drop(disconnected);
        self.counters.record_detach(count as u64);

        tracing::info!(
            generation = %generation,
            disconnected = count,
            closed = close,
            "Generation advanced"
        );

        (generation, count)
    }

    /// Disconnect every subscriber without changing the generation
    pub fn disconnect_all(&self) -> usize {
        let disconnected = std::mem::take(&mut self.members.lock().subscribers);
        let count = disconnected.len();
        drop(disconnected);
        self.counters.record_detach(count as u64);
        count
    }

    /// Current generation
    pub fn generation(&self) -> Generation {
        self.members.lock().generation
    }

    /// Number of attached subscribers
    pub fn len(&self) -> usize {
        self.members.lock().subscribers.len()
    }

    /// Whether no subscriber is attached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a subscriber is currently attached
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.members.lock().subscribers.contains_key(&id)
    }

    /// Live counters
    pub fn counters(&self) -> &BroadcastCounters {
        &self.counters
    }

    /// Snapshot of registry statistics
    pub fn stats(&self) -> RegistryStats {
        let (generation, subscribers) = {
            let members = self.members.lock();
            (members.generation, members.subscribers.len())
        };

        RegistryStats {
            generation: generation.get(),
            subscribers,
            counters: self.counters.snapshot(),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
