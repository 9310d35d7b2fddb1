use std::fmt::{Debug, Formatter};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use futures::channel::mpsc;
use parking_lot::Mutex;

struct SignalInner<T> {
    value: T,
    version: u64,
    listeners: Vec<mpsc::UnboundedSender<()>>,
}

/// A thread-safe, pull-based reactive cell.
///
/// The current value is read on demand with [`Signal::get`], writers notify every stream returned by
/// [`Signal::changes`]. Cloning a `Signal` creates a new handle to the **same** value.
pub struct Signal<T> {
    inner: Arc<Mutex<SignalInner<T>>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Debug> Debug for Signal<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Signal")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

impl<T: Clone> Signal<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SignalInner {
                value,
                version: 0,
                listeners: Vec::new(),
            })),
        }
    }

    pub fn get(&self) -> T {
        self.inner.lock().value.clone()
    }

    /// Access the current value by reference without cloning.
    ///
    /// The closure must not access the same signal.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.lock().value)
    }

    pub fn set(&self, value: T) {
        self.update(move |current| *current = value);
    }

    /// Mutates the value in place and notifies listeners.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut inner = self.inner.lock();
        f(&mut inner.value);
        inner.version += 1;
        inner
            .listeners
            .retain(|listener| listener.unbounded_send(()).is_ok());
    }

    /// Incremented once per write.
    pub fn version(&self) -> u64 {
        self.inner.lock().version
    }

    /// A stream yielding one notification per write made after this call.
    ///
    /// The notification carries no payload, listeners re-read the signal.
    pub fn changes(&self) -> SignalChanges {
        let (tx, rx) = mpsc::unbounded();
        self.inner.lock().listeners.push(tx);
        SignalChanges {
            receiver: rx,
        }
    }

    pub fn listener_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner
            .listeners
            .retain(|listener| !listener.is_closed());
        inner.listeners.len()
    }
}

/// Change notifications of a [`Signal`]; dropping it unsubscribes.
pub struct SignalChanges {
    receiver: mpsc::UnboundedReceiver<()>,
}

impl SignalChanges {
    /// Consumes every notification that is already pending, returns how many there were.
    pub fn drain_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(Some(())) = self.receiver.try_next() {
            count += 1;
        }
        count
    }
}

impl Stream for SignalChanges {
    type Item = ();

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}
