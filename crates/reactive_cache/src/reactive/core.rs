//! The cache state machine.
//!
//! # States
//!
//! - **Empty**: `cell` is `None`, no update in flight.
//! - **Populated**: `cell` holds a value, no update in flight.
//! - **Updating**: `updating` is set, `cell` is empty or holds a stale value.
//! - **Completed**: terminal, every operation fails.
//!
//! # Invariants
//!
//! 1. At most one update window is open at a time. `updating` is set while holding the state lock,
//!    before any user code (factories, signal reads) runs and before any suspension point, so every
//!    trigger that arrives while a window is open joins it instead of starting another.
//! 2. A window is closed exactly once, by the first value or failure reported for it. Waiters of the
//!    window are settled with that outcome.
//! 3. Observers only ever receive values, never the empty state or failures.
//! 4. Producer work is never cancelled. Spawned tasks hold weak references to the cache and stop
//!    delivering once it is completed or dropped.

use std::any::{Any, type_name};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use anyhow::anyhow;
use futures::channel::{mpsc, oneshot};
use futures::future::{BoxFuture, Shared};
use futures::{FutureExt, StreamExt, TryFutureExt};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, trace, warn};

use super::registry::{CacheId, CacheInfo, CacheRegistry};
use super::signal::{Signal, SignalChanges};
use super::source::{Produced, SourceFactory, SourceStream, UpdateSource};
use super::subscription::{Subscription, UpdateHandle};
use crate::error::{CacheError, ProducerError};
use crate::runtime::SharedExecutor;

type SharedOneShot<T> = Shared<BoxFuture<'static, Result<T, ProducerError>>>;

enum Source<T> {
    /// The stream itself lives in [`Feed::NotStarted`] until the first update takes it.
    Stream,
    OneShot(SharedOneShot<T>),
    PullCell(Signal<T>),
    Factory(SourceFactory<T>),
    Plain(T),
}

/// Progress of the long-lived feed of `Stream` and `PullCell` sources.
enum Feed<T> {
    NotStarted(Option<SourceStream<T>>),
    Running,
    Ended,
}

/// Who reported a value or failure.
#[derive(Debug, Clone, Copy)]
enum Origin {
    /// The long-lived feed, which serves whatever window is open.
    Feed,
    /// Work started for one specific window.
    Window(u64),
}

struct CacheState<T> {
    cell: Option<T>,
    updating: bool,
    window: u64,
    completed: bool,
    version: u64,
    invocations: u64,
    observers: Vec<mpsc::UnboundedSender<T>>,
    waiters: Vec<oneshot::Sender<Result<T, CacheError>>>,
    feed: Feed<T>,
}

impl<T: Clone> CacheState<T> {
    fn write(&mut self, value: T) {
        self.version += 1;
        self.observers
            .retain(|observer| observer.unbounded_send(value.clone()).is_ok());
        self.cell = Some(value);
    }

    fn begin(&mut self) -> u64 {
        self.updating = true;
        self.window += 1;
        self.window
    }

    /// Opens a window that invokes (or subscribes to) the source.
    fn begin_invocation(&mut self) -> u64 {
        self.invocations += 1;
        self.begin()
    }

    fn join(&mut self) -> oneshot::Receiver<Result<T, CacheError>> {
        let (tx, rx) = oneshot::channel();
        self.waiters.push(tx);
        rx
    }

    fn is_open(&self, origin: Origin) -> bool {
        self.updating
            && match origin {
                Origin::Feed => true,
                Origin::Window(window) => window == self.window,
            }
    }

    fn settle(&mut self, result: Result<T, CacheError>) {
        self.updating = false;
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(result.clone());
        }
    }
}

pub(crate) struct Core<T> {
    id: CacheId,
    name: String,
    source: Source<T>,
    state: Mutex<CacheState<T>>,
    closed: AtomicBool,
    executor: SharedExecutor,
    registry: Arc<CacheRegistry>,
}

impl<T> Core<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        source: UpdateSource<T>,
        name: String,
        executor: SharedExecutor,
        registry: Arc<CacheRegistry>,
    ) -> Arc<Self> {
        let (source, feed) = match source {
            UpdateSource::Stream(stream) => (Source::Stream, Feed::NotStarted(Some(stream))),
            UpdateSource::OneShot(future) => (
                Source::OneShot(future.map_err(Arc::new).boxed().shared()),
                Feed::NotStarted(None),
            ),
            UpdateSource::PullCell(signal) => (Source::PullCell(signal), Feed::NotStarted(None)),
            UpdateSource::Factory(factory) => (Source::Factory(factory), Feed::NotStarted(None)),
            UpdateSource::Plain(value) => (Source::Plain(value), Feed::NotStarted(None)),
        };

        let id = registry.allocate_id();
        let core = Arc::new(Self {
            id,
            name,
            source,
            state: Mutex::new(CacheState {
                cell: None,
                updating: false,
                window: 0,
                completed: false,
                version: 0,
                invocations: 0,
                observers: Vec::new(),
                waiters: Vec::new(),
                feed,
            }),
            closed: AtomicBool::new(false),
            executor,
            registry,
        });

        // only announce the cache once it can be listed
        let weak: Weak<Core<T>> = Arc::downgrade(&core);
        let info: Weak<dyn CacheInfo> = weak;
        core.registry.insert(id, core.name.clone(), info);
        debug!(name = %core.name, value_type = type_name::<T>(), "created cache");

        core
    }

    pub(crate) fn id(&self) -> CacheId {
        self.id
    }

    pub(crate) fn subscribe(self: &Arc<Self>) -> Result<Subscription<T>, CacheError> {
        let mut state = self.state.lock();
        self.ensure_active(&state)?;

        let (tx, rx) = mpsc::unbounded();
        if let Some(value) = &state.cell {
            let _ = tx.unbounded_send(value.clone());
        }
        state.observers.push(tx);
        let subscription = Subscription::new(rx, Some(Arc::clone(self)));

        if state.cell.is_none() && !state.updating {
            trace!(name = %self.name, "first interest in an empty cache, starting update");
            // the observer receives the outcome, nobody awaits the handle
            let _ = self.start_update(state);
        }

        Ok(subscription)
    }

    pub(crate) fn trigger_update(self: &Arc<Self>) -> Result<UpdateHandle<T>, CacheError> {
        let state = self.state.lock();
        self.ensure_active(&state)?;

        Ok(self.start_update(state))
    }

    pub(crate) fn manual_override(&self, value: T) -> Result<(), CacheError> {
        let mut state = self.state.lock();
        self.ensure_active(&state)?;

        debug!(name = %self.name, in_flight = state.updating, "manual override");
        state.write(value);
        Ok(())
    }

    pub(crate) fn reset(&self) -> Result<(), CacheError> {
        let mut state = self.state.lock();
        self.ensure_active(&state)?;

        // an update in flight is not cancelled, its value still lands
        debug!(name = %self.name, in_flight = state.updating, "reset");
        state.cell = None;
        Ok(())
    }

    pub(crate) fn peek(&self) -> Result<T, CacheError> {
        let state = self.state.lock();
        self.ensure_active(&state)?;

        state
            .cell
            .clone()
            .ok_or_else(|| CacheError::NotYetPopulated {
                name: self.name.clone(),
            })
    }

    pub(crate) fn try_peek(&self) -> Result<Option<T>, CacheError> {
        let state = self.state.lock();
        self.ensure_active(&state)?;

        Ok(state.cell.clone())
    }

    pub(crate) fn complete(&self) -> Result<(), CacheError> {
        {
            let mut state = self.state.lock();
            self.ensure_active(&state)?;

            state.completed = true;
            self.closed.store(true, Ordering::Release);
            state.observers.clear();
            state.settle(Err(CacheError::Completed {
                name: self.name.clone(),
            }));
        }

        self.registry.deregister(self.id);
        debug!(name = %self.name, "completed cache");
        Ok(())
    }

    pub(crate) fn source_invocations(&self) -> u64 {
        self.state.lock().invocations
    }

    fn ensure_active(&self, state: &CacheState<T>) -> Result<(), CacheError> {
        match state.completed {
            true => Err(CacheError::Completed {
                name: self.name.clone(),
            }),
            false => Ok(()),
        }
    }

    /// Opens a new update window, or joins the open one.
    ///
    /// Consumes the state guard, user code is only ever called after it is released.
    fn start_update(self: &Arc<Self>, mut state: MutexGuard<'_, CacheState<T>>) -> UpdateHandle<T> {
        if state.updating {
            trace!(name = %self.name, window = state.window, "update in flight, joining");
            return self.waiting(state.join());
        }

        match &self.source {
            Source::Plain(value) => {
                state.write(value.clone());
                UpdateHandle::ready(Ok(value.clone()))
            }
            Source::OneShot(future) => {
                let window = state.begin_invocation();
                let handle = self.waiting(state.join());
                drop(state);

                debug!(name = %self.name, window, "awaiting one-shot source");
                self.spawn_future(future.clone().boxed(), window);
                handle
            }
            Source::Stream => match std::mem::replace(&mut state.feed, Feed::Running) {
                Feed::NotStarted(Some(stream)) => {
                    let window = state.begin_invocation();
                    let handle = self.waiting(state.join());
                    drop(state);

                    debug!(name = %self.name, window, "subscribing to stream source");
                    self.spawn_pump(stream, Origin::Feed);
                    handle
                }
                Feed::Running => {
                    let window = state.begin();
                    trace!(name = %self.name, window, "waiting for the next stream emission");
                    self.waiting(state.join())
                }
                Feed::NotStarted(None) | Feed::Ended => {
                    state.feed = Feed::Ended;
                    match &state.cell {
                        Some(value) => UpdateHandle::ready(Ok(value.clone())),
                        None => UpdateHandle::ready(Err(CacheError::SourceExhausted {
                            name: self.name.clone(),
                        })),
                    }
                }
            },
            Source::PullCell(signal) => {
                let window = state.begin_invocation();
                let handle = self.waiting(state.join());
                // subscribe before reading, so no change can slip in between
                let changes = match matches!(state.feed, Feed::NotStarted(_)) {
                    true => {
                        state.feed = Feed::Running;
                        Some(signal.changes())
                    }
                    false => None,
                };
                drop(state);

                trace!(name = %self.name, window, "reading pull cell");
                self.deliver(Ok(signal.get()), Origin::Window(window));
                if let Some(changes) = changes {
                    self.spawn_follower(signal.clone(), changes);
                }
                handle
            }
            Source::Factory(factory) => {
                let window = state.begin_invocation();
                let handle = self.waiting(state.join());
                drop(state);

                debug!(name = %self.name, window, "invoking factory source");
                match catch_unwind(AssertUnwindSafe(|| factory())) {
                    Ok(Produced::Value(value)) => self.deliver(Ok(value), Origin::Window(window)),
                    Ok(Produced::Future(future)) => self.spawn_future(future.map_err(Arc::new).boxed(), window),
                    Ok(Produced::Stream(stream)) => self.spawn_pump(stream, Origin::Window(window)),
                    Err(payload) => {
                        let error = anyhow!("factory panicked: {}", panic_message(payload.as_ref()));
                        self.deliver(Err(Arc::new(error)), Origin::Window(window));
                    }
                }
                handle
            }
        }
    }

    fn waiting(self: &Arc<Self>, receiver: oneshot::Receiver<Result<T, CacheError>>) -> UpdateHandle<T> {
        UpdateHandle::waiting(receiver, Some(Arc::clone(self)))
    }

    fn spawn_future(self: &Arc<Self>, future: BoxFuture<'static, Result<T, ProducerError>>, window: u64) {
        let core = Arc::downgrade(self);
        self.executor.spawn(
            async move {
                let result = future.await;
                if let Some(core) = core.upgrade() {
                    core.deliver(result, Origin::Window(window));
                }
            }
            .boxed(),
        );
    }

    fn spawn_pump(self: &Arc<Self>, mut stream: SourceStream<T>, origin: Origin) {
        let core = Arc::downgrade(self);
        self.executor.spawn(
            async move {
                while let Some(item) = stream.next().await {
                    let Some(core) = core.upgrade() else {
                        return;
                    };
                    if core.closed.load(Ordering::Acquire) {
                        return;
                    }

                    let failed = item.is_err();
                    core.deliver(item.map_err(Arc::new), origin);
                    if failed {
                        break;
                    }
                }

                if let Some(core) = core.upgrade() {
                    core.end_feed(origin);
                }
            }
            .boxed(),
        );
    }

    fn spawn_follower(self: &Arc<Self>, signal: Signal<T>, mut changes: SignalChanges) {
        let core = Arc::downgrade(self);
        self.executor.spawn(
            async move {
                while changes.next().await.is_some() {
                    // coalesce writes that happened while this task was not running
                    changes.drain_pending();

                    let Some(core) = core.upgrade() else {
                        return;
                    };
                    if core.closed.load(Ordering::Acquire) {
                        return;
                    }
                    core.deliver(Ok(signal.get()), Origin::Feed);
                }
            }
            .boxed(),
        );
    }

    fn deliver(&self, result: Result<T, ProducerError>, origin: Origin) {
        let mut state = self.state.lock();
        if state.completed {
            trace!(name = %self.name, ?origin, "cache completed, dropping producer result");
            return;
        }

        let settles = state.is_open(origin);
        match result {
            Ok(value) => {
                trace!(name = %self.name, ?origin, settles, "writing value");
                state.write(value.clone());
                if settles {
                    state.settle(Ok(value));
                }
            }
            Err(error) => {
                warn!(name = %self.name, ?origin, "update source failed: {:#}", error);
                if settles {
                    state.settle(Err(CacheError::ProducerFailure(error)));
                }
            }
        }
    }

    fn end_feed(&self, origin: Origin) {
        let mut state = self.state.lock();
        if let Origin::Feed = origin {
            state.feed = Feed::Ended;
        }

        if !state.completed && state.is_open(origin) {
            debug!(name = %self.name, ?origin, "source stream ended without a value for the open update");
            state.settle(Err(CacheError::SourceExhausted {
                name: self.name.clone(),
            }));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}

impl<T> CacheInfo for Core<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn is_populated(&self) -> bool {
        self.state.lock().cell.is_some()
    }

    fn is_updating(&self) -> bool {
        self.state.lock().updating
    }

    fn is_completed(&self) -> bool {
        self.state.lock().completed
    }

    fn version(&self) -> u64 {
        self.state.lock().version
    }

    fn value_type(&self) -> &'static str {
        type_name::<T>()
    }
}

impl<T> Drop for Core<T> {
    fn drop(&mut self) {
        if self.registry.deregister(self.id) {
            trace!(name = %self.name, "dropped cache without completing it");
        }
    }
}
