//! Session write loop
//!
//! Drains one subscription into an outbound sink, flushing after every
//! chunk. The subscription is dropped on every exit path, which detaches
//! the subscriber from its registry.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::registry::{Generation, SubscriberId, Subscription};

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The registry closed the queue (source replaced or relay shut down)
    Closed,
    /// The caller asked the session to stop
    Disconnected,
    /// Writing to the sink failed
    WriteFailed(std::io::ErrorKind),
    /// Flushing the sink failed
    FlushFailed(std::io::ErrorKind),
}

/// Summary of a finished session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Subscriber the session ran as
    pub subscriber: SubscriberId,
    /// Generation the subscriber attached to
    pub generation: Generation,
    /// Why the loop ended
    pub end: SessionEnd,
    /// Chunks written and flushed
    pub chunks: u64,
    /// Bytes written and flushed
    pub bytes: u64,
}

/// Forward chunks from `subscription` to `sink` until one side goes away
pub async fn pump<W>(
    mut subscription: Subscription,
    mut sink: W,
    shutdown: CancellationToken,
) -> SessionReport
where
    W: AsyncWrite + Unpin,
{
    let subscriber = subscription.id();
    let generation = subscription.generation();
    let mut chunks = 0u64;
    let mut bytes = 0u64;

    let end = loop {
        let chunk = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break SessionEnd::Disconnected,
            chunk = subscription.recv() => chunk,
        };

        let Some(chunk) = chunk else {
            break SessionEnd::Closed;
        };

        if let Err(e) = sink.write_all(&chunk.data).await {
            tracing::debug!(subscriber = %subscriber, error = %e, "Session write failed");
            break SessionEnd::WriteFailed(e.kind());
        }

        if let Err(e) = sink.flush().await {
            tracing::warn!(subscriber = %subscriber, error = %e, "Session sink cannot flush");
            break SessionEnd::FlushFailed(e.kind());
        }

        chunks += 1;
        bytes += chunk.len() as u64;
    };

    drop(subscription);

    tracing::debug!(
        subscriber = %subscriber,
        end = ?end,
        chunks,
        bytes,
        "Session ended"
    );

    SessionReport {
        subscriber,
        generation,
        end,
        chunks,
        bytes,
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    use tokio_test::io::Builder;

    use super::*;
    use crate::registry::Registry;

    #[tokio::test]
    async fn test_forwards_until_closed() {
        let registry = Arc::new(Registry::new());
        let sub = registry.subscribe();
        let generation = registry.generation();
        let sink = Builder::new().write(b"abc").write(b"def").build();

        let task = tokio::spawn(pump(sub, sink, CancellationToken::new()));

        registry.broadcast(b"abc", generation);
        tokio::task::yield_now().await;
        while registry.counters().chunks_delivered() < 2 {
            registry.broadcast(b"def", generation);
            tokio::task::yield_now().await;
        }
        registry.advance_generation();

        let report = task.await.unwrap();
        assert_eq!(report.end, SessionEnd::Closed);
        assert_eq!(report.chunks, 2);
        assert_eq!(report.bytes, 6);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_detaches() {
        let registry = Arc::new(Registry::new());
        let sub = registry.subscribe();
        let sink = Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();

        registry.broadcast(b"xyz", registry.generation());
        let report = pump(sub, sink, CancellationToken::new()).await;

        assert_eq!(report.end, SessionEnd::WriteFailed(io::ErrorKind::BrokenPipe));
        assert_eq!(report.chunks, 0);
        assert!(registry.is_empty());
    }

    /// Sink that accepts writes but cannot flush them
    struct Unflushable;

    impl AsyncWrite for Unflushable {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer reset")))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_flush_failure_detaches() {
        let registry = Arc::new(Registry::new());
        let sub = registry.subscribe();
        let id = sub.id();

        registry.broadcast(b"xyz", registry.generation());
        let report = pump(sub, Unflushable, CancellationToken::new()).await;

        assert_eq!(
            report.end,
            SessionEnd::FlushFailed(io::ErrorKind::ConnectionReset)
        );
        assert_eq!(report.chunks, 0);
        assert_eq!(report.bytes, 0);
        assert!(!registry.contains(id));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_explicit_disconnect() {
        let registry = Arc::new(Registry::new());
        let sub = registry.subscribe();
        let id = sub.id();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let report = pump(sub, Builder::new().build(), shutdown).await;

        assert_eq!(report.end, SessionEnd::Disconnected);
        assert_eq!(report.subscriber, id);
        assert!(!registry.contains(id));
    }

    #[tokio::test]
    async fn test_panicking_session_still_detaches() {
        let registry = Arc::new(Registry::new());
        let mut sub = registry.subscribe();

        let task = tokio::spawn(async move {
            let _chunk = sub.recv().await;
            panic!("session blew up");
        });
        registry.broadcast(b"boom", registry.generation());

        assert!(task.await.is_err());
        assert!(registry.is_empty());
    }
}
