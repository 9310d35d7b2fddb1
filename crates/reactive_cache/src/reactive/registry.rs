use std::fmt::{Debug, Formatter};
use std::pin::Pin;
use std::sync::{Arc, LazyLock, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use futures::channel::mpsc;
use parking_lot::Mutex;
use tracing::trace;

/// Read-only view of a live cache, independent of its value type.
pub trait CacheInfo: Send + Sync {
    fn name(&self) -> &str;
    fn is_populated(&self) -> bool;
    fn is_updating(&self) -> bool;
    fn is_completed(&self) -> bool;
    /// Number of values written into the cache.
    fn version(&self) -> u64;
    fn value_type(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheId(u64);

struct Slot {
    id: CacheId,
    name: String,
    cache: Weak<dyn CacheInfo>,
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    slots: Vec<Slot>,
    listeners: Vec<mpsc::UnboundedSender<()>>,
}

impl RegistryInner {
    fn notify(&mut self) {
        self.listeners
            .retain(|listener| listener.unbounded_send(()).is_ok());
    }
}

/// A registry of live caches.
///
/// Caches register themselves when built and deregister when completed or dropped. Entries are kept
/// in registration order. Every change is announced on the streams returned by
/// [`CacheRegistry::on_change`].
#[derive(Default)]
pub struct CacheRegistry {
    inner: Mutex<RegistryInner>,
}

static GLOBAL: LazyLock<Arc<CacheRegistry>> = LazyLock::new(|| Arc::new(CacheRegistry::new()));

/// A live cache, as listed by [`CacheRegistry::list_active`].
#[derive(Clone)]
pub struct RegistryEntry {
    pub id: CacheId,
    pub name: String,
    pub cache: Arc<dyn CacheInfo>,
}

impl Debug for RegistryEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("value_type", &self.cache.value_type())
            .field("populated", &self.cache.is_populated())
            .field("updating", &self.cache.is_updating())
            .finish()
    }
}

impl CacheRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// The process-wide registry used by caches that are not given one explicitly.
    pub fn global() -> Arc<CacheRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Registers a cache.
    ///
    /// The registry only holds a weak reference, it does not keep the cache alive.
    pub fn register(&self, name: impl Into<String>, cache: Weak<dyn CacheInfo>) -> CacheId {
        let id = self.allocate_id();
        self.insert(id, name.into(), cache);
        id
    }

    /// Reserves an id for a cache that is not constructed yet, see [`CacheRegistry::insert`].
    pub(crate) fn allocate_id(&self) -> CacheId {
        let mut inner = self.inner.lock();
        let id = CacheId(inner.next_id);
        inner.next_id += 1;
        id
    }

    /// Lists a cache under a previously allocated id and announces it.
    pub(crate) fn insert(&self, id: CacheId, name: String, cache: Weak<dyn CacheInfo>) {
        let mut inner = self.inner.lock();
        trace!(id = id.0, name = %name, "registering cache");
        inner.slots.push(Slot {
            id,
            name,
            cache,
        });
        inner.notify();
    }

    /// Returns `false` if the id was not registered (e.g. already deregistered).
    pub fn deregister(&self, id: CacheId) -> bool {
        let mut inner = self.inner.lock();
        let Some(index) = inner
            .slots
            .iter()
            .position(|slot| slot.id == id)
        else {
            return false;
        };

        let slot = inner.slots.remove(index);
        trace!(id = id.0, name = %slot.name, "deregistered cache");
        inner.notify();

        true
    }

    pub fn list_active(&self) -> Vec<RegistryEntry> {
        self.inner
            .lock()
            .slots
            .iter()
            .filter_map(|slot| {
                slot.cache
                    .upgrade()
                    .map(|cache| RegistryEntry {
                        id: slot.id,
                        name: slot.name.clone(),
                        cache,
                    })
            })
            .collect()
    }

    pub fn contains(&self, id: CacheId) -> bool {
        self.inner
            .lock()
            .slots
            .iter()
            .any(|slot| slot.id == id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A stream of payload-free change notifications.
    ///
    /// One notification is delivered immediately, then one per registration or deregistration;
    /// consumers are expected to re-enumerate with [`CacheRegistry::list_active`].
    pub fn on_change(&self) -> RegistryChanges {
        let (tx, rx) = mpsc::unbounded();
        let _ = tx.unbounded_send(());
        self.inner.lock().listeners.push(tx);

        RegistryChanges {
            receiver: rx,
        }
    }
}

impl Debug for CacheRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.list_active())
            .finish()
    }
}

/// See [`CacheRegistry::on_change`].
pub struct RegistryChanges {
    receiver: mpsc::UnboundedReceiver<()>,
}

impl RegistryChanges {
    /// Consumes every notification that is already pending, returns how many there were.
    pub fn drain_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(Some(())) = self.receiver.try_next() {
            count += 1;
        }
        count
    }
}

impl Stream for RegistryChanges {
    type Item = ();

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    struct FakeCache {
        name: &'static str,
        populated: AtomicBool,
    }

    impl FakeCache {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                populated: AtomicBool::new(false),
            })
        }
    }

    impl CacheInfo for FakeCache {
        fn name(&self) -> &str {
            self.name
        }

        fn is_populated(&self) -> bool {
            self.populated.load(Ordering::SeqCst)
        }

        fn is_updating(&self) -> bool {
            false
        }

        fn is_completed(&self) -> bool {
            false
        }

        fn version(&self) -> u64 {
            0
        }

        fn value_type(&self) -> &'static str {
            "fake"
        }
    }

    fn weak(cache: &Arc<FakeCache>) -> Weak<dyn CacheInfo> {
        let cache: Arc<dyn CacheInfo> = cache.clone();
        Arc::downgrade(&cache)
    }

    #[test]
    fn entries_are_listed_in_registration_order() {
        let registry = CacheRegistry::new();
        let first = FakeCache::new("first");
        let second = FakeCache::new("second");

        registry.register("first", weak(&first));
        registry.register("second", weak(&second));

        let names: Vec<_> = registry
            .list_active()
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn deregister_removes_only_the_given_entry() {
        let registry = CacheRegistry::new();
        let first = FakeCache::new("first");
        let second = FakeCache::new("second");

        let first_id = registry.register("first", weak(&first));
        let second_id = registry.register("second", weak(&second));

        assert!(registry.deregister(first_id));
        assert!(!registry.deregister(first_id));

        assert!(!registry.contains(first_id));
        assert!(registry.contains(second_id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn entries_expose_a_live_handle() {
        let registry = CacheRegistry::new();
        let cache = FakeCache::new("live");
        registry.register("live", weak(&cache));

        cache.populated.store(true, Ordering::SeqCst);

        let entries = registry.list_active();
        assert!(entries[0].cache.is_populated());
        assert_eq!(entries[0].cache.name(), "live");
    }

    #[test]
    fn dropped_caches_are_not_listed() {
        let registry = CacheRegistry::new();
        let cache = FakeCache::new("dropped");
        registry.register("dropped", weak(&cache));

        drop(cache);

        assert!(registry.list_active().is_empty());
    }

    #[test]
    fn change_notifications_follow_every_registry_change() {
        let registry = CacheRegistry::new();
        let mut changes = registry.on_change();

        // current-state notification
        assert_eq!(changes.drain_pending(), 1);

        let cache = FakeCache::new("cache");
        let id = registry.register("cache", weak(&cache));
        assert_eq!(changes.drain_pending(), 1);

        registry.deregister(id);
        assert_eq!(changes.drain_pending(), 1);

        // no change, no notification
        registry.deregister(id);
        assert_eq!(changes.drain_pending(), 0);
    }

    #[test]
    fn global_registry_is_shared() {
        assert!(Arc::ptr_eq(&CacheRegistry::global(), &CacheRegistry::global()));
    }
}
