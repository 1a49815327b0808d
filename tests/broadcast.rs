//! Registry and relay behaviour through the public API

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use loopcast::{Error, Generation, MemorySource, Registry, Relay, RelayConfig};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_membership_matches_adds_minus_removes() {
    let registry = Arc::new(Registry::with_chunk_size(16));

    let mut tasks = Vec::with_capacity(1000);
    for i in 0..1000u32 {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            match i % 3 {
                // Add and stay attached
                0 => Some(registry.subscribe()),
                // Add then remove
                1 => {
                    let sub = registry.subscribe();
                    tokio::task::yield_now().await;
                    drop(sub);
                    None
                }
                _ => {
                    registry.broadcast(&i.to_be_bytes(), Generation::INITIAL);
                    None
                }
            }
        }));
    }

    let mut kept = Vec::new();
    for task in tasks {
        if let Some(sub) = task.await.unwrap() {
            kept.push(sub);
        }
    }

    assert_eq!(kept.len(), 334);
    assert_eq!(registry.len(), kept.len());

    let counters = registry.counters().snapshot();
    assert_eq!(counters.total_attached, 667);
    assert_eq!(counters.total_detached, 333);

    drop(kept);
    assert!(registry.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn add_then_remove_restores_membership_under_churn() {
    let registry = Arc::new(Registry::with_chunk_size(16));
    let _anchors: Vec<_> = (0..10).map(|_| registry.subscribe()).collect();

    let churn = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            for _ in 0..500 {
                let sub = registry.subscribe();
                registry.broadcast(b"tick", Generation::INITIAL);
                drop(sub);
                tokio::task::yield_now().await;
            }
        })
    };

    for _ in 0..500 {
        let sub = registry.subscribe();
        assert!(registry.contains(sub.id()));
        let id = sub.id();
        drop(sub);
        assert!(!registry.contains(id));
        tokio::task::yield_now().await;
    }

    churn.await.unwrap();
    assert_eq!(registry.len(), 10);
}

fn relay() -> Relay {
    Relay::new(
        RelayConfig::default()
            .chunk_size(3)
            .tick_period(Duration::from_millis(10))
            .max_source_size(32),
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn listeners_never_hear_two_sources() {
    let relay = relay();

    let first = relay
        .replace(MemorySource::new("first", Bytes::from_static(b"aaaaaa")))
        .await
        .unwrap();
    let mut early = relay.subscribe();
    assert_eq!(&early.recv().await.unwrap().data[..], b"aaa");

    let second = relay
        .replace(MemorySource::new("second", Bytes::from_static(b"bbbbbb")))
        .await
        .unwrap();
    assert!(second > first);

    while let Some(chunk) = early.recv().await {
        assert_eq!(chunk.generation, first);
        assert_eq!(&chunk.data[..], b"aaa");
    }

    let mut late = relay.subscribe();
    assert_eq!(late.generation(), second);
    for _ in 0..10 {
        let chunk = late.recv().await.unwrap();
        assert_eq!(chunk.generation, second);
        assert_eq!(&chunk.data[..], b"bbb");
    }

    relay.shutdown().await;
    assert!(late.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn oversized_ingress_leaves_relay_untouched() {
    let relay = relay();
    relay
        .replace(MemorySource::new("ok", Bytes::from_static(b"abc")))
        .await
        .unwrap();
    let sub = relay.subscribe();
    let before = relay.stats();

    let err = relay
        .replace(MemorySource::new("huge", Bytes::from(vec![1u8; 33])))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::SourceTooLarge { size: 33, max: 32 }));
    let after = relay.stats();
    assert_eq!(after.registry.generation, before.registry.generation);
    assert_eq!(after.registry.subscribers, 1);
    assert!(relay.registry().contains(sub.id()));
}
