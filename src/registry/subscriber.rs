//! Per-listener state
//!
//! A subscriber is split in two halves:
//!
//! - [`Subscriber`] lives inside the registry. It owns the sending side of a
//!   single-slot delivery queue and a scratch buffer the broadcaster copies
//!   into.
//! - [`Subscription`] is handed to the session. It owns the receiving side
//!   and deregisters the subscriber when dropped, so every exit path of a
//!   session (error, disconnect, panic, task abort) detaches it.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::Stream;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::chunk::{Chunk, Generation, SubscriberId};
use super::store::Registry;

/// Delivery queue capacity. Exactly one chunk may be in flight per subscriber.
pub(crate) const QUEUE_CAPACITY: usize = 1;

/// Result of offering a chunk to one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// Chunk copied and enqueued
    Sent,
    /// Previous chunk still unconsumed, this one discarded
    Dropped,
    /// Receiving half is gone
    Closed,
}

/// Registry-side half of a subscriber
pub(crate) struct Subscriber {
    tx: mpsc::Sender<Chunk>,
    scratch: BytesMut,
}

impl Subscriber {
    /// Create a subscriber and the receiver its session will drain
    pub(crate) fn new(chunk_size: usize) -> (Self, mpsc::Receiver<Chunk>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let subscriber = Self {
            tx,
            scratch: BytesMut::with_capacity(chunk_size),
        };
        (subscriber, rx)
    }

    /// Copy `data` into the scratch buffer and enqueue it without blocking
    ///
    /// The slot is reserved before the copy, so a full queue costs nothing
    /// and the copy always completes before the permit publishes it.
    pub(crate) fn offer(&mut self, data: &[u8], generation: Generation) -> Delivery {
        match self.tx.try_reserve() {
            Ok(permit) => {
                // Reclaims the previous allocation once the session released it.
                self.scratch.reserve(data.len());
                self.scratch.extend_from_slice(data);
                let data = self.scratch.split().freeze();
                permit.send(Chunk { generation, data });
                Delivery::Sent
            }
            Err(TrySendError::Full(())) => Delivery::Dropped,
            Err(TrySendError::Closed(())) => Delivery::Closed,
        }
    }
}

/// Session-side half of a subscriber
///
/// Dropping the subscription removes the subscriber from its registry.
pub struct Subscription {
    id: SubscriberId,
    generation: Generation,
    rx: mpsc::Receiver<Chunk>,
    registry: Arc<Registry>,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriberId,
        generation: Generation,
        rx: mpsc::Receiver<Chunk>,
        registry: Arc<Registry>,
    ) -> Self {
        Self {
            id,
            generation,
            rx,
            registry,
        }
    }

    /// Identity of this subscriber
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Generation that was current when the subscriber attached
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Wait for the next chunk
    ///
    /// Returns `None` once the registry disconnected this subscriber (source
    /// replacement or shutdown).
    pub async fn recv(&mut self) -> Option<Chunk> {
        self.rx.recv().await
    }

    /// Take a chunk if one is waiting, without blocking
    pub fn try_recv(&mut self) -> Option<Chunk> {
        self.rx.try_recv().ok()
    }

    /// Turn the subscription into a body stream of raw bytes
    ///
    /// The subscription lives inside the stream, so dropping the stream
    /// (e.g. the HTTP client went away) detaches the subscriber.
    pub fn into_stream(self) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
        futures::stream::unfold(self, |mut sub| async move {
            let chunk = sub.recv().await;
            chunk.map(|chunk| (Ok::<_, std::io::Error>(chunk.data), sub))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .finish()
    }
}
