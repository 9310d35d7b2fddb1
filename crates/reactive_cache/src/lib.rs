//! A lazy, single-flight, recomputable cache around an asynchronous value producer.
//!
//! A cache owns one value, produced on demand by an [`UpdateSource`], and shares it with any number
//! of observers through a push-based stream. Concurrent interest collapses into a single producer
//! invocation.
//!
//! # Key Features
//!
//! - Lazy: nothing is produced until the first subscription or explicit update
//! - Single-flight: every subscription or trigger arriving while an update is in flight joins it
//! - Recomputable: explicit updates, manual overrides and resets
//! - Capabilities (mutability, synchronous peeking) are part of the handle's type
//! - A registry of live caches with change notifications for diagnostics tooling
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use futures::StreamExt;
//! use futures::executor::block_on;
//! use reactive_cache::{CacheBuilder, UpdateSource};
//!
//! let fetches = Arc::new(AtomicUsize::new(0));
//! let counter = fetches.clone();
//!
//! // A factory is invoked anew for every update
//! let posts = CacheBuilder::new(UpdateSource::from_async_fn(move || {
//!     let fetch = counter.fetch_add(1, Ordering::SeqCst) + 1;
//!     async move { Ok::<_, anyhow::Error>(format!("posts, fetch #{}", fetch)) }
//! }))
//! .name("posts")
//! .build();
//!
//! // Both observers share one fetch
//! let mut first = posts.subscribe().unwrap();
//! let mut second = posts.subscribe().unwrap();
//!
//! assert_eq!(block_on(first.next()).unwrap(), "posts, fetch #1");
//! assert_eq!(block_on(second.next()).unwrap(), "posts, fetch #1");
//! assert_eq!(fetches.load(Ordering::SeqCst), 1);
//!
//! // Explicit refresh
//! let refreshed = block_on(posts.trigger_update().unwrap()).unwrap();
//! assert_eq!(refreshed, "posts, fetch #2");
//! assert_eq!(block_on(first.next()).unwrap(), "posts, fetch #2");
//!
//! posts.complete().unwrap();
//! assert_eq!(block_on(first.next()), None);
//! ```

pub mod error;
pub mod reactive;
pub mod runtime;


pub use error::{CacheError, ProducerError};
pub use reactive::{
    CacheBuilder, CacheId, CacheInfo, CacheRegistry, CurrentValue, Immutable, ImmutableCache, Mutable, MutableCache,
    Produced, ReactiveCache, RegistryChanges, RegistryEntry, Signal, SourceKind, StreamOnly, Subscription,
    UpdateHandle, UpdateSource, ValueReachable, ValueReachableCache, ValueReachableImmutableCache, reactive_cache,
};
pub use runtime::{AsyncStdExecutor, Executor, SharedExecutor};
