#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;
use futures::channel::oneshot;
use parking_lot::Mutex;
use reactive_cache::test::{Driver, manual_executor};
use reactive_cache::{CacheBuilder, CacheRegistry, Produced, UpdateSource};

/// A builder spawning on a manual executor and registered in a private registry.
pub fn isolated<T>(source: UpdateSource<T>) -> (CacheBuilder<T>, Driver, Arc<CacheRegistry>) {
    let (executor, driver) = manual_executor();
    let registry = Arc::new(CacheRegistry::new());

    let builder = CacheBuilder::new(source)
        .executor(executor)
        .registry(registry.clone());

    (builder, driver, registry)
}

/// A factory source whose every invocation returns a future that the test resolves explicitly.
pub struct ControlledFetch<T> {
    pending: Arc<Mutex<VecDeque<oneshot::Sender<anyhow::Result<T>>>>>,
    calls: Arc<AtomicUsize>,
}

impl<T: Send + 'static> ControlledFetch<T> {
    pub fn new() -> Self {
        Self {
            pending: Default::default(),
            calls: Default::default(),
        }
    }

    pub fn source(&self) -> UpdateSource<T> {
        let pending = self.pending.clone();
        let calls = self.calls.clone();

        UpdateSource::factory(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = oneshot::channel();
            pending.lock().push_back(tx);

            Produced::future(async move { rx.await.unwrap_or_else(|canceled| Err(canceled.into())) })
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Resolves the oldest outstanding fetch.
    pub fn resolve(&self, value: T) {
        self.settle(Ok(value));
    }

    pub fn fail(&self, message: &'static str) {
        self.settle(Err(anyhow!(message)));
    }

    fn settle(&self, result: anyhow::Result<T>) {
        let sender = self
            .pending
            .lock()
            .pop_front()
            .expect("a fetch is outstanding");
        let _ = sender.send(result);
    }
}
