//! Core reactive cache components.
//!
//! - `ReactiveCache<T, A, V>`: the cache handle, its operations depend on its capability parameters
//! - `CacheBuilder`: selects the capabilities, name, executor and registry of a cache
//! - `UpdateSource<T>`: how a cache obtains its values
//! - `CacheRegistry`: bookkeeping of live caches
//! - `Signal<T>`: a pull-based reactive cell, usable as an update source
//! - `CurrentValue<T>`: a pull-based view of a cache
//!
//! # Example
//!
//! ```rust
//! use futures::StreamExt;
//! use futures::executor::block_on;
//! use reactive_cache::{CacheBuilder, Signal, UpdateSource};
//!
//! let zoom = Signal::new(100u32);
//!
//! let cache = CacheBuilder::new(UpdateSource::pull_cell(zoom.clone()))
//!     .name("zoom")
//!     .value_reachable()
//!     .build();
//!
//! let mut subscription = cache.subscribe().unwrap();
//! assert_eq!(block_on(subscription.next()), Some(100));
//!
//! // explicit updates re-read the signal
//! zoom.set(150);
//! assert_eq!(block_on(cache.trigger_update().unwrap()).unwrap(), 150);
//! assert_eq!(cache.peek_value().unwrap(), 150);
//!
//! cache.complete().unwrap();
//! ```

mod builder;
mod cache;
mod core;
mod current_value;
mod registry;
mod signal;
mod source;
mod subscription;

pub use builder::{CacheBuilder, reactive_cache};
pub use cache::{
    Immutable, ImmutableCache, Mutability, Mutable, MutableCache, Reachability, ReactiveCache, StreamOnly,
    ValueReachable, ValueReachableCache, ValueReachableImmutableCache,
};
pub use current_value::CurrentValue;
pub use registry::{CacheId, CacheInfo, CacheRegistry, RegistryChanges, RegistryEntry};
pub use signal::{Signal, SignalChanges};
pub use source::{Produced, SourceFactory, SourceFuture, SourceKind, SourceStream, UpdateSource};
pub use subscription::{Subscription, UpdateHandle};
