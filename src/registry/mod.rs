//! Subscriber registry for paced fan-out
//!
//! The registry holds every attached listener and routes chunks from the
//! active paced source to them.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<Registry>
//!                     ┌─────────────────────────┐
//!                     │ Mutex<Members {         │
//!                     │   generation,           │
//!                     │   subscribers: HashMap< │
//!                     │     Id, Subscriber {    │
//!                     │       tx (slot of 1),   │
//!                     │       scratch,          │
//!                     │     }>                  │
//!                     │ }>                      │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!   [PacedSource]           [Subscription]          [Subscription]
//!   tick + read()           recv().await            recv().await
//!         │                       │                       │
//!         └──► registry.broadcast()──► write + flush ──► network
//! ```
//!
//! # Drop Policy
//!
//! Each subscriber has a delivery queue of exactly one slot. Broadcasting
//! reserves the slot without waiting; when the previous chunk is still
//! unconsumed the new one is discarded for that subscriber only. Slow
//! listeners miss chunks, everyone else stays real-time.
//!
//! # Generations
//!
//! Every chunk is tagged with the generation of the source that read it. The
//! registry only delivers chunks of its current generation, and advancing
//! the generation disconnects all subscribers in the same critical section.
//! A listener therefore never hears bytes of two different sources.

pub mod chunk;
pub mod store;
pub mod subscriber;

pub use chunk::{Chunk, Generation, SubscriberId};
pub use store::{BroadcastOutcome, Registry, DEFAULT_CHUNK_SIZE};
pub use subscriber::Subscription;
