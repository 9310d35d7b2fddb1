use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::channel::oneshot;
use futures::future::{BoxFuture, join_all};
use futures::{FutureExt, StreamExt};
use reactive_cache::{CacheBuilder, CacheRegistry, SharedExecutor, UpdateSource};

fn tokio_executor() -> SharedExecutor {
    let handle = tokio::runtime::Handle::current();
    Arc::new(move |future: BoxFuture<'static, ()>| {
        handle.spawn(future);
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_flight_across_threads() {
    // given
    let calls = Arc::new(AtomicUsize::new(0));
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let release = release_rx.shared();

    let counter = calls.clone();
    let cache = CacheBuilder::new(UpdateSource::from_async_fn(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        let release = release.clone();
        async move {
            let _ = release.await;
            Ok::<_, anyhow::Error>(42u64)
        }
    }))
    .name("contended")
    .executor(tokio_executor())
    .registry(Arc::new(CacheRegistry::new()))
    .value_reachable()
    .build();

    // when
    let interest = (0..32)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move {
                let subscription = cache.subscribe().unwrap();
                let handle = cache.trigger_update().unwrap();
                (subscription, handle)
            })
        })
        .collect::<Vec<_>>();
    let interest = join_all(interest).await;

    // and
    release_tx.send(()).unwrap();

    // then
    for joined in interest {
        let (mut subscription, handle) = joined.unwrap();
        assert_eq!(handle.await.unwrap(), 42);
        assert_eq!(subscription.next().await, Some(42));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.source_invocations(), 1);
    assert_eq!(cache.peek_value().unwrap(), 42);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_handles_can_be_used_from_other_threads() {
    // given
    let cache = CacheBuilder::new(UpdateSource::from_fn(|| 0u32))
        .executor(tokio_executor())
        .registry(Arc::new(CacheRegistry::new()))
        .value_reachable()
        .build();
    let mut subscription = cache.subscribe().unwrap();
    assert_eq!(subscription.next().await, Some(0));

    // when
    let writers = (1..=8u32)
        .map(|value| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.manual_override(value).unwrap() })
        })
        .collect::<Vec<_>>();
    for writer in join_all(writers).await {
        writer.unwrap();
    }

    // then
    let mut received = Vec::new();
    while let Some(value) = subscription.try_next_value() {
        received.push(value);
    }
    received.sort();
    assert_eq!(received, (1..=8).collect::<Vec<_>>());
    assert_eq!(cache.version(), 9);
}

#[test]
fn test_default_executor_drives_async_sources() {
    // given
    let cache = CacheBuilder::new(UpdateSource::from_async_fn(|| async {
        async_std::task::sleep(Duration::from_millis(10)).await;
        Ok::<_, anyhow::Error>("fetched")
    }))
    .name("default executor")
    .registry(Arc::new(CacheRegistry::new()))
    .build();

    // when
    let mut subscription = cache.subscribe().unwrap();
    let value = async_std::task::block_on(subscription.next());

    // then
    assert_eq!(value, Some("fetched"));
    cache.complete().unwrap();
}
