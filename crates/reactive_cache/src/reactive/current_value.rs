use std::sync::Arc;

use parking_lot::Mutex;

use super::core::Core;
use super::subscription::Subscription;

struct CurrentValueState<T> {
    subscription: Option<Subscription<T>>,
    latest: Option<T>,
}

/// A pull-based view of a cache, for consumers that poll a "current value" instead of observing a
/// stream (e.g. immediate-mode UIs).
///
/// The first [`CurrentValue::get`] subscribes to the cache, which starts the first update of an
/// empty cache. Until a value arrives `get` returns `None`; the empty state is never exposed as a
/// value. After the cache is completed the last value received stays readable.
pub struct CurrentValue<T> {
    core: Arc<Core<T>>,
    state: Mutex<CurrentValueState<T>>,
}

impl<T> CurrentValue<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(core: Arc<Core<T>>) -> Self {
        Self {
            core,
            state: Mutex::new(CurrentValueState {
                subscription: None,
                latest: None,
            }),
        }
    }

    pub fn get(&self) -> Option<T> {
        let mut state = self.state.lock();

        if state.subscription.is_none() && state.latest.is_none() {
            state.subscription = self.core.subscribe().ok();
        }

        if let Some(value) = state
            .subscription
            .as_mut()
            .and_then(Subscription::latest)
        {
            state.latest = Some(value);
        }

        state.latest.clone()
    }

    pub fn is_subscribed(&self) -> bool {
        self.state.lock().subscription.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::channel::oneshot;

    use crate::CacheBuilder;
    use crate::reactive::registry::CacheRegistry;
    use crate::reactive::source::UpdateSource;
    use crate::test::manual_executor;

    #[test]
    fn first_read_triggers_the_update() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let (executor, _driver) = manual_executor();
        let cache = CacheBuilder::new(UpdateSource::from_fn(move || counter.fetch_add(1, Ordering::SeqCst) + 10))
            .executor(executor)
            .registry(Arc::new(CacheRegistry::new()))
            .build();

        let current = cache.current_value();
        assert!(!current.is_subscribed());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(current.get(), Some(10));
        assert_eq!(current.get(), Some(10));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn follows_later_writes() {
        let (executor, _driver) = manual_executor();
        let cache = CacheBuilder::new(UpdateSource::plain(1))
            .executor(executor)
            .registry(Arc::new(CacheRegistry::new()))
            .build();
        let current = cache.current_value();

        assert_eq!(current.get(), Some(1));

        cache.manual_override(2).unwrap();
        cache.manual_override(3).unwrap();
        assert_eq!(current.get(), Some(3));
    }

    #[test]
    fn empty_until_the_source_resolves() {
        let (executor, mut driver) = manual_executor();
        let (tx, rx) = oneshot::channel::<&'static str>();
        let cache = CacheBuilder::new(UpdateSource::future(async move { Ok::<_, anyhow::Error>(rx.await?) }))
            .executor(executor)
            .registry(Arc::new(CacheRegistry::new()))
            .build();
        let current = cache.current_value();

        assert_eq!(current.get(), None);
        driver.run_until_stalled();
        assert_eq!(current.get(), None);

        tx.send("ready").unwrap();
        driver.run_until_stalled();
        assert_eq!(current.get(), Some("ready"));
    }

    #[test]
    fn keeps_last_value_after_completion() {
        let (executor, _driver) = manual_executor();
        let cache = CacheBuilder::new(UpdateSource::plain("kept"))
            .executor(executor)
            .registry(Arc::new(CacheRegistry::new()))
            .build();
        let current = cache.current_value();

        assert_eq!(current.get(), Some("kept"));
        cache.complete().unwrap();

        assert_eq!(current.get(), Some("kept"));
    }
}
