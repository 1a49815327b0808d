//! Listener sessions
//!
//! A session attaches a subscriber, forwards its chunks to an outbound sink
//! and detaches when either side ends. HTTP listeners use
//! [`Subscription::into_stream`](crate::registry::Subscription::into_stream);
//! anything that is an `AsyncWrite` can use [`pump`].

pub mod pump;

pub use pump::{pump, SessionEnd, SessionReport};
