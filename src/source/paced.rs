//! Cadence-driven reader
//!
//! A [`PacedSource`] reads one chunk per tick from its byte source and hands
//! it to [`Registry::broadcast`], tagged with its generation. At the end of
//! the source it rewinds and keeps going until it is cancelled, superseded
//! or hits an I/O error.

use std::io::{self, SeekFrom};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::Result;
use crate::registry::{Generation, Registry};

use super::byte_source::ByteSource;
use super::config::PacingConfig;

/// Why a paced source stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceExit {
    /// Cancelled through its handle
    Cancelled,
    /// The registry moved on to a newer generation
    Superseded,
    /// The source could not be opened
    OpenFailed(String),
    /// Reading or rewinding failed
    ReadFailed(String),
    /// The source yielded no bytes at all
    EmptySource,
    /// The task panicked or was aborted
    Aborted,
}

/// Producer for one source generation
pub struct PacedSource<S: ByteSource> {
    source: S,
    generation: Generation,
    registry: Arc<Registry>,
    config: PacingConfig,
    cancel: CancellationToken,
}

impl<S: ByteSource> PacedSource<S> {
    /// Create a paced source broadcasting into `registry` as `generation`
    ///
    /// Fails with [`Error::InvalidConfig`](crate::Error::InvalidConfig) when the
    /// pacing config does not validate.
    pub fn new(
        source: S,
        generation: Generation,
        registry: Arc<Registry>,
        config: PacingConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            source,
            generation,
            registry,
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Token that stops this source when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the loop on a new task
    pub fn spawn(self) -> SourceHandle {
        let generation = self.generation;
        let label = self.source.label();
        let cancel = self.cancel.clone();
        let span = tracing::info_span!("paced_source", generation = %generation);

        let task = tokio::spawn(self.run().instrument(span));

        SourceHandle {
            generation,
            label,
            cancel,
            task,
        }
    }

    /// Run the loop to completion
    pub async fn run(self) -> SourceExit {
        let label = self.source.label();

        let mut reader = match self.source.open().await {
            Ok(reader) => reader,
            Err(e) => {
                tracing::error!(source = %label, error = %e, "Failed to open source");
                return SourceExit::OpenFailed(e.to_string());
            }
        };

        tracing::info!(
            source = %label,
            chunk_size = self.config.chunk_size,
            tick_ms = self.config.tick_period.as_millis() as u64,
            "Paced source started"
        );

        let mut ticker = tokio::time::interval(self.config.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut buf = vec![0u8; self.config.chunk_size];
        let mut offset: u64 = 0;
        let mut passes: u64 = 0;

        let exit = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break SourceExit::Cancelled,
                _ = ticker.tick() => {}
            }

            // A short read must not carry the previous chunk's tail.
            buf.fill(0);

            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break SourceExit::Cancelled,
                read = read_looping(&mut reader, &mut buf, &mut offset) => read,
            };

            let n = match read {
                Ok(Read::Chunk(n)) => n,
                Ok(Read::Looped(n)) => {
                    passes += 1;
                    tracing::debug!(source = %label, passes, "Source looped");
                    n
                }
                Ok(Read::Empty) => {
                    tracing::warn!(source = %label, "Source has no bytes, stopping");
                    break SourceExit::EmptySource;
                }
                Err(e) => {
                    tracing::error!(source = %label, offset, error = %e, "Failed to read source");
                    break SourceExit::ReadFailed(e.to_string());
                }
            };

            // Only narrows the window after a cancel. The strict cut-off is
            // the generation check broadcast does under the registry lock.
            if self.cancel.is_cancelled() {
                break SourceExit::Cancelled;
            }

            if self.registry.broadcast(&buf[..n], self.generation).is_stale() {
                break SourceExit::Superseded;
            }
        };

        tracing::info!(source = %label, passes, exit = ?exit, "Paced source stopped");
        exit
    }
}

enum Read {
    /// Bytes read from the current pass
    Chunk(usize),
    /// End reached; rewound and read from the start
    Looped(usize),
    /// Nothing to read even from the start
    Empty,
}

async fn read_looping<R>(reader: &mut R, buf: &mut [u8], offset: &mut u64) -> io::Result<Read>
where
    R: tokio::io::AsyncRead + tokio::io::AsyncSeek + Unpin,
{
    let n = reader.read(buf).await?;
    if n > 0 {
        *offset += n as u64;
        return Ok(Read::Chunk(n));
    }
    if *offset == 0 {
        return Ok(Read::Empty);
    }

    reader.seek(SeekFrom::Start(0)).await?;
    *offset = 0;

    let n = reader.read(buf).await?;
    if n == 0 {
        return Ok(Read::Empty);
    }
    *offset = n as u64;
    Ok(Read::Looped(n))
}

/// Handle to a running paced source
pub struct SourceHandle {
    generation: Generation,
    label: String,
    cancel: CancellationToken,
    task: JoinHandle<SourceExit>,
}

impl SourceHandle {
    /// Generation the source broadcasts as
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Description of the underlying byte source
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Request cancellation without waiting
    ///
    /// The loop stops at its next await point. A chunk that already passed
    /// its last cancellation check can still be broadcast; advance the
    /// registry generation first when no byte may reach listeners after
    /// this call.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the loop already stopped on its own
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to stop
    pub async fn join(self) -> SourceExit {
        self.task.await.unwrap_or(SourceExit::Aborted)
    }

    /// Cancel and wait for the loop to stop
    pub async fn stop(self) -> SourceExit {
        self.cancel();
        self.join().await
    }

    /// Cancel and wait at most `timeout`, aborting the task after that
    pub async fn stop_timeout(mut self, timeout: Duration) -> SourceExit {
        self.cancel();
        match tokio::time::timeout(timeout, &mut self.task).await {
            Ok(result) => result.unwrap_or(SourceExit::Aborted),
            Err(_) => {
                tracing::warn!(generation = %self.generation, "Source did not stop in time, aborting");
                self.task.abort();
                SourceExit::Aborted
            }
        }
    }
}

impl std::fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceHandle")
            .field("generation", &self.generation)
            .field("label", &self.label)
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use bytes::Bytes;
    use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};

    use super::*;
    use crate::source::{FileSource, MemorySource};

    fn pacing(chunk_size: usize) -> PacingConfig {
        PacingConfig::default()
            .chunk_size(chunk_size)
            .tick_period(Duration::from_millis(10))
    }

    fn pattern(len: usize) -> Bytes {
        (0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>().into()
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_pass_reconstructs_source() {
        for (size, chunk) in [(1, 1), (10, 3), (64, 64), (100, 7), (5, 8), (1000, 128)] {
            let registry = Arc::new(Registry::with_chunk_size(chunk));
            let mut sub = registry.subscribe();
            let data = pattern(size);

            let source = MemorySource::new("pattern", data.clone());
            let handle =
                PacedSource::new(source, registry.generation(), registry.clone(), pacing(chunk))
                    .unwrap()
                    .spawn();

            let mut received = Vec::new();
            while received.len() < size {
                let chunk_data = sub.recv().await.unwrap().data;
                assert!(chunk_data.len() <= chunk);
                received.extend_from_slice(&chunk_data);
            }
            assert_eq!(received, data, "size={size} chunk={chunk}");

            // The next pass starts over from the first byte
            let next = sub.recv().await.unwrap().data;
            assert_eq!(next[..], data[..next.len()]);

            assert_eq!(handle.stop().await, SourceExit::Cancelled);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_further_broadcasts() {
        let registry = Arc::new(Registry::with_chunk_size(4));
        let mut sub = registry.subscribe();
        let source = MemorySource::new("mem", Bytes::from_static(b"abcdefgh"));
        let handle =
            PacedSource::new(source, registry.generation(), registry.clone(), pacing(4))
                .unwrap()
                .spawn();

        assert_eq!(&sub.recv().await.unwrap().data[..], b"abcd");
        assert_eq!(handle.stop().await, SourceExit::Cancelled);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(sub.try_recv().is_none());
        assert_eq!(registry.stats().counters.broadcasts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_by_new_generation() {
        let registry = Arc::new(Registry::with_chunk_size(4));
        let source = MemorySource::new("mem", Bytes::from_static(b"abcdefgh"));
        let handle =
            PacedSource::new(source, registry.generation(), registry.clone(), pacing(4))
                .unwrap()
                .spawn();

        tokio::time::sleep(Duration::from_millis(25)).await;
        registry.advance_generation();

        assert_eq!(handle.join().await, SourceExit::Superseded);
        assert_eq!(registry.stats().counters.stale_broadcasts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_source_stops() {
        let registry = Arc::new(Registry::new());
        let source = MemorySource::new("empty", Bytes::new());
        let handle =
            PacedSource::new(source, registry.generation(), registry.clone(), pacing(8))
                .unwrap()
                .spawn();

        assert_eq!(handle.join().await, SourceExit::EmptySource);
        assert_eq!(registry.stats().counters.broadcasts, 0);
    }

    #[tokio::test]
    async fn test_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(Registry::new());
        let source = FileSource::new(dir.path().join("missing.aac"));
        let exit = PacedSource::new(source, registry.generation(), registry, pacing(8))
            .unwrap()
            .run()
            .await;

        assert!(matches!(exit, SourceExit::OpenFailed(_)));
    }

    struct BrokenReader;

    impl AsyncRead for BrokenReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::other("device unplugged")))
        }
    }

    impl AsyncSeek for BrokenReader {
        fn start_seek(self: Pin<&mut Self>, _position: SeekFrom) -> io::Result<()> {
            Ok(())
        }

        fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
            Poll::Ready(Ok(0))
        }
    }

    struct BrokenSource;

    impl ByteSource for BrokenSource {
        type Reader = BrokenReader;

        async fn open(&self) -> io::Result<Self::Reader> {
            Ok(BrokenReader)
        }

        async fn size(&self) -> io::Result<u64> {
            Ok(1)
        }

        fn label(&self) -> String {
            "broken".to_string()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_failure_stops_only_this_generation() {
        let registry = Arc::new(Registry::new());
        let _sub = registry.subscribe();
        let handle =
            PacedSource::new(BrokenSource, registry.generation(), registry.clone(), pacing(8))
                .unwrap()
                .spawn();

        let exit = handle.join().await;
        assert_eq!(exit, SourceExit::ReadFailed("device unplugged".to_string()));

        // Registry is untouched and a replacement can still run
        assert_eq!(registry.len(), 1);
        let (next, _) = registry.advance_generation();
        let mut sub = registry.subscribe();
        let source = MemorySource::new("mem", Bytes::from_static(b"ok"));
        let handle = PacedSource::new(source, next, registry.clone(), pacing(8))
            .unwrap()
            .spawn();
        assert_eq!(&sub.recv().await.unwrap().data[..], b"ok");
        handle.stop().await;
    }

    /// Reader whose reads never complete
    struct StalledReader;

    impl AsyncRead for StalledReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Pending
        }
    }

    impl AsyncSeek for StalledReader {
        fn start_seek(self: Pin<&mut Self>, _position: SeekFrom) -> io::Result<()> {
            Ok(())
        }

        fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
            Poll::Ready(Ok(0))
        }
    }

    struct StalledSource;

    impl ByteSource for StalledSource {
        type Reader = StalledReader;

        async fn open(&self) -> io::Result<Self::Reader> {
            Ok(StalledReader)
        }

        async fn size(&self) -> io::Result<u64> {
            Ok(1)
        }

        fn label(&self) -> String {
            "stalled".to_string()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_read_pending() {
        let registry = Arc::new(Registry::new());
        let mut sub = registry.subscribe();
        let handle =
            PacedSource::new(StalledSource, registry.generation(), registry.clone(), pacing(8))
                .unwrap()
                .spawn();

        // Let the loop reach its first read and park there
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        handle.cancel();
        assert_eq!(handle.join().await, SourceExit::Cancelled);
        assert!(sub.try_recv().is_none());
        assert_eq!(registry.stats().counters.broadcasts, 0);
    }

    #[test]
    fn test_new_rejects_invalid_pacing() {
        let registry = Arc::new(Registry::new());
        let source = MemorySource::new("mem", Bytes::from_static(b"abc"));
        let zero_tick = PacingConfig::default().tick_period(Duration::ZERO);

        let result = PacedSource::new(source, registry.generation(), registry, zero_tick);
        assert!(matches!(result, Err(crate::Error::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_timeout_returns_exit() {
        let registry = Arc::new(Registry::new());
        let source = MemorySource::new("mem", Bytes::from_static(b"abc"));
        let handle =
            PacedSource::new(source, registry.generation(), registry.clone(), pacing(8))
                .unwrap()
                .spawn();
        assert_eq!(handle.generation(), registry.generation());
        assert_eq!(handle.label(), "mem");

        let exit = handle.stop_timeout(Duration::from_secs(1)).await;
        assert_eq!(exit, SourceExit::Cancelled);
    }
}
