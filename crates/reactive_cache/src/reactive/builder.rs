use std::marker::PhantomData;
use std::panic::Location;
use std::sync::Arc;

use super::cache::{Immutable, Mutability, Mutable, MutableCache, Reachability, ReactiveCache, StreamOnly, ValueReachable};
use super::core::Core;
use super::registry::CacheRegistry;
use super::source::UpdateSource;
use crate::runtime::{AsyncStdExecutor, SharedExecutor};

/// Builds a [`ReactiveCache`].
///
/// Defaults: mutable (`manual_override`/`reset` available), stream-only (no `peek_value`), named
/// after the call site of [`CacheBuilder::build`], spawning on [`AsyncStdExecutor`] and registered
/// in [`CacheRegistry::global`].
///
/// ```
/// use reactive_cache::{CacheBuilder, UpdateSource};
///
/// let cache = CacheBuilder::new(UpdateSource::plain(42))
///     .name("answer")
///     .immutable()
///     .value_reachable()
///     .build();
///
/// let _subscription = cache.subscribe().unwrap();
/// assert_eq!(cache.peek_value().unwrap(), 42);
/// ```
#[must_use]
pub struct CacheBuilder<T, A = Mutable, V = StreamOnly> {
    source: UpdateSource<T>,
    name: Option<String>,
    executor: Option<SharedExecutor>,
    registry: Option<Arc<CacheRegistry>>,
    _capabilities: PhantomData<fn() -> (A, V)>,
}

impl<T> CacheBuilder<T> {
    pub fn new(source: UpdateSource<T>) -> Self {
        Self {
            source,
            name: None,
            executor: None,
            registry: None,
            _capabilities: PhantomData,
        }
    }
}

impl<T, A, V> CacheBuilder<T, A, V> {
    /// The name used by the registry and in log output.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn executor(mut self, executor: SharedExecutor) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn registry(mut self, registry: Arc<CacheRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Removes `manual_override` and `reset` from the built cache.
    pub fn immutable(self) -> CacheBuilder<T, Immutable, V> {
        self.with_capabilities()
    }

    pub fn mutable(self) -> CacheBuilder<T, Mutable, V> {
        self.with_capabilities()
    }

    /// Adds `peek_value` to the built cache.
    pub fn value_reachable(self) -> CacheBuilder<T, A, ValueReachable> {
        self.with_capabilities()
    }

    pub fn stream_only(self) -> CacheBuilder<T, A, StreamOnly> {
        self.with_capabilities()
    }

    fn with_capabilities<A2, V2>(self) -> CacheBuilder<T, A2, V2> {
        CacheBuilder {
            source: self.source,
            name: self.name,
            executor: self.executor,
            registry: self.registry,
            _capabilities: PhantomData,
        }
    }
}

impl<T, A, V> CacheBuilder<T, A, V>
where
    T: Clone + Send + Sync + 'static,
    A: Mutability,
    V: Reachability,
{
    #[track_caller]
    pub fn build(self) -> ReactiveCache<T, A, V> {
        let location = Location::caller();
        let name = self
            .name
            .unwrap_or_else(|| unnamed(location));
        let executor = self
            .executor
            .unwrap_or_else(AsyncStdExecutor::shared);
        let registry = self
            .registry
            .unwrap_or_else(CacheRegistry::global);

        ReactiveCache::from_core(Core::new(self.source, name, executor, registry))
    }
}

/// Builds a mutable, stream-only cache with the default settings.
#[track_caller]
pub fn reactive_cache<T>(source: UpdateSource<T>) -> MutableCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    CacheBuilder::new(source).build()
}

fn unnamed(location: &Location<'_>) -> String {
    format!("[UNNAMED] {}:{}:{}", location.file(), location.line(), location.column())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::manual_executor;

    #[test]
    fn explicit_name_is_used() {
        let registry = Arc::new(CacheRegistry::new());
        let (executor, _driver) = manual_executor();
        let cache = CacheBuilder::new(UpdateSource::plain(1))
            .name("named")
            .executor(executor)
            .registry(registry.clone())
            .build();

        assert_eq!(cache.name(), "named");
        assert_eq!(registry.list_active()[0].name, "named");
    }

    #[test]
    fn unnamed_caches_are_named_after_the_call_site() {
        let registry = Arc::new(CacheRegistry::new());
        let (executor, _driver) = manual_executor();
        let first_line = line!();
        let cache = CacheBuilder::new(UpdateSource::plain(1))
            .executor(executor)
            .registry(registry)
            .build();
        let last_line = line!();

        assert!(cache.name().starts_with("[UNNAMED] "));
        assert!(cache.name().contains(file!()));
        let line: u32 = cache
            .name()
            .rsplit(':')
            .nth(1)
            .unwrap()
            .parse()
            .unwrap();
        assert!((first_line..=last_line).contains(&line));
    }

    #[test]
    fn shorthand_registers_in_the_global_registry() {
        let cache = reactive_cache(UpdateSource::plain("global"));

        let registry = CacheRegistry::global();
        assert!(registry.contains(cache.id()));

        cache.complete().unwrap();
        assert!(!registry.contains(cache.id()));
    }
}
