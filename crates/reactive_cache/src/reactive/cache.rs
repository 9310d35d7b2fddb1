use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::sync::Arc;

use super::core::Core;
use super::current_value::CurrentValue;
use super::registry::{CacheId, CacheInfo};
use super::subscription::{Subscription, UpdateHandle};
use crate::error::CacheError;

mod sealed {
    pub trait Sealed {}
}

/// Whether a cache exposes [`ReactiveCache::manual_override`] and [`ReactiveCache::reset`].
pub trait Mutability: sealed::Sealed + Send + Sync + 'static {
    const ALLOW_MANUAL_UPDATE: bool;
}

/// Whether a cache exposes [`ReactiveCache::peek_value`].
pub trait Reachability: sealed::Sealed + Send + Sync + 'static {
    const VALUE_REACHABLE: bool;
}

#[derive(Debug, Clone, Copy)]
pub enum Mutable {}

#[derive(Debug, Clone, Copy)]
pub enum Immutable {}

#[derive(Debug, Clone, Copy)]
pub enum ValueReachable {}

#[derive(Debug, Clone, Copy)]
pub enum StreamOnly {}

impl sealed::Sealed for Mutable {}
impl sealed::Sealed for Immutable {}
impl sealed::Sealed for ValueReachable {}
impl sealed::Sealed for StreamOnly {}

impl Mutability for Mutable {
    const ALLOW_MANUAL_UPDATE: bool = true;
}

impl Mutability for Immutable {
    const ALLOW_MANUAL_UPDATE: bool = false;
}

impl Reachability for ValueReachable {
    const VALUE_REACHABLE: bool = true;
}

impl Reachability for StreamOnly {
    const VALUE_REACHABLE: bool = false;
}

/// A lazy, single-flight, recomputable cache.
///
/// Cloning a `ReactiveCache` creates a new handle to the **same** cache. The operations available
/// on a handle are fixed by its capability parameters, see [`crate::CacheBuilder`].
///
/// An immutable cache cannot be overridden or reset:
///
/// ```compile_fail
/// use reactive_cache::{CacheBuilder, UpdateSource};
///
/// let cache = CacheBuilder::new(UpdateSource::plain(1)).immutable().build();
/// cache.manual_override(2).unwrap();
/// ```
///
/// A stream-only cache cannot be peeked:
///
/// ```compile_fail
/// use reactive_cache::{CacheBuilder, UpdateSource};
///
/// let cache = CacheBuilder::new(UpdateSource::plain(1)).build();
/// let _ = cache.peek_value();
/// ```
pub struct ReactiveCache<T, A = Mutable, V = StreamOnly> {
    core: Arc<Core<T>>,
    _capabilities: PhantomData<fn() -> (A, V)>,
}

pub type MutableCache<T> = ReactiveCache<T, Mutable, StreamOnly>;
pub type ImmutableCache<T> = ReactiveCache<T, Immutable, StreamOnly>;
pub type ValueReachableCache<T> = ReactiveCache<T, Mutable, ValueReachable>;
pub type ValueReachableImmutableCache<T> = ReactiveCache<T, Immutable, ValueReachable>;

impl<T, A, V> Clone for ReactiveCache<T, A, V> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            _capabilities: PhantomData,
        }
    }
}

impl<T, A, V> ReactiveCache<T, A, V>
where
    T: Clone + Send + Sync + 'static,
    A: Mutability,
    V: Reachability,
{
    pub(crate) fn from_core(core: Arc<Core<T>>) -> Self {
        Self {
            core,
            _capabilities: PhantomData,
        }
    }

    /// Subscribes to the cache's values.
    ///
    /// If the cache is empty and no update is in flight, this starts the first update.
    pub fn subscribe(&self) -> Result<Subscription<T>, CacheError> {
        self.core.subscribe()
    }

    /// Starts an update, or joins the one already in flight.
    pub fn trigger_update(&self) -> Result<UpdateHandle<T>, CacheError> {
        self.core.trigger_update()
    }

    /// Ends every subscription once it has yielded the values already written, fails every pending
    /// [`UpdateHandle`] and deregisters the cache. Every later operation fails.
    pub fn complete(&self) -> Result<(), CacheError> {
        self.core.complete()
    }

    /// A pull-based view of the current value, subscribing on the first read.
    pub fn current_value(&self) -> CurrentValue<T> {
        CurrentValue::new(Arc::clone(&self.core))
    }

    /// An immutable handle to the same cache.
    pub fn as_immutable(&self) -> ReactiveCache<T, Immutable, V> {
        ReactiveCache::from_core(Arc::clone(&self.core))
    }

    pub fn id(&self) -> CacheId {
        self.core.id()
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    pub fn is_populated(&self) -> bool {
        self.core.is_populated()
    }

    pub fn is_updating(&self) -> bool {
        self.core.is_updating()
    }

    pub fn is_completed(&self) -> bool {
        self.core.is_completed()
    }

    /// Number of values written so far, including manual overrides.
    pub fn version(&self) -> u64 {
        self.core.version()
    }

    /// Number of times the update source was invoked or subscribed.
    ///
    /// Plain sources never count, they need no work.
    pub fn source_invocations(&self) -> u64 {
        self.core.source_invocations()
    }

    pub fn allows_manual_update(&self) -> bool {
        A::ALLOW_MANUAL_UPDATE
    }

    pub fn is_value_reachable(&self) -> bool {
        V::VALUE_REACHABLE
    }
}

impl<T, V> ReactiveCache<T, Mutable, V>
where
    T: Clone + Send + Sync + 'static,
    V: Reachability,
{
    /// Writes a value directly, bypassing the update source.
    ///
    /// An update in flight is not affected, when it finishes its value replaces this one.
    pub fn manual_override(&self, value: T) -> Result<(), CacheError> {
        self.core.manual_override(value)
    }

    /// Empties the cache, the next subscription or trigger starts a new update.
    ///
    /// An update in flight is not cancelled, when it finishes its value populates the cache again.
    pub fn reset(&self) -> Result<(), CacheError> {
        self.core.reset()
    }
}

impl<T, A> ReactiveCache<T, A, ValueReachable>
where
    T: Clone + Send + Sync + 'static,
    A: Mutability,
{
    /// Fails with [`CacheError::NotYetPopulated`] when the cache is empty.
    pub fn peek_value(&self) -> Result<T, CacheError> {
        self.core.peek()
    }

    pub fn try_peek(&self) -> Result<Option<T>, CacheError> {
        self.core.try_peek()
    }
}

impl<T, A, V> Debug for ReactiveCache<T, A, V>
where
    T: Clone + Send + Sync + 'static,
    A: Mutability,
    V: Reachability,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveCache")
            .field("name", &self.name())
            .field("value_type", &self.core.value_type())
            .field("allow_manual_update", &A::ALLOW_MANUAL_UPDATE)
            .field("value_reachable", &V::VALUE_REACHABLE)
            .field("populated", &self.is_populated())
            .field("updating", &self.is_updating())
            .field("completed", &self.is_completed())
            .field("version", &self.version())
            .finish()
    }
}
