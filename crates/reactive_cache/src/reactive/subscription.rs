use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use futures::channel::{mpsc, oneshot};
use futures::stream::FusedStream;

use super::core::Core;
use crate::error::CacheError;

/// An observer of a cache's values.
///
/// Yields the current value first (if the cache is populated), then every value written later. Ends
/// once the cache is completed and the values written before completion have been yielded. Dropping
/// it unsubscribes, it does not cancel an update in flight.
///
/// A subscription keeps its cache alive, the cache's other handles may be dropped while it is observed.
pub struct Subscription<T> {
    receiver: mpsc::UnboundedReceiver<T>,
    terminated: bool,
    _cache: Option<Arc<Core<T>>>,
}

impl<T> Subscription<T> {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<T>, cache: Option<Arc<Core<T>>>) -> Self {
        Self {
            receiver,
            terminated: false,
            _cache: cache,
        }
    }

    /// The oldest value that is already available, without waiting.
    pub fn try_next_value(&mut self) -> Option<T> {
        if self.terminated {
            return None;
        }
        match self.receiver.try_next() {
            Ok(Some(value)) => Some(value),
            Ok(None) => {
                self.terminated = true;
                None
            }
            Err(_) => None,
        }
    }

    /// The newest value that is already available, discarding older pending ones.
    pub fn latest(&mut self) -> Option<T> {
        let mut latest = None;
        while let Some(value) = self.try_next_value() {
            latest = Some(value);
        }
        latest
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.terminated {
            return Poll::Ready(None);
        }

        match Pin::new(&mut this.receiver).poll_next(cx) {
            Poll::Ready(None) => {
                this.terminated = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl<T> FusedStream for Subscription<T> {
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl<T> Debug for Subscription<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("terminated", &self.terminated)
            .finish()
    }
}

enum HandleState<T> {
    Ready(Option<Result<T, CacheError>>),
    Waiting(oneshot::Receiver<Result<T, CacheError>>),
}

/// Resolves when the update it started (or joined) ends.
///
/// Yields the value that ended the update, or [`CacheError::ProducerFailure`] when the source
/// failed. Dropping the handle does not cancel the update. A waiting handle keeps its cache alive.
#[must_use = "an update handle does nothing unless awaited, the update itself runs regardless"]
pub struct UpdateHandle<T> {
    state: HandleState<T>,
    _cache: Option<Arc<Core<T>>>,
}

impl<T> UpdateHandle<T> {
    pub(crate) fn ready(result: Result<T, CacheError>) -> Self {
        Self {
            state: HandleState::Ready(Some(result)),
            _cache: None,
        }
    }

    pub(crate) fn waiting(receiver: oneshot::Receiver<Result<T, CacheError>>, cache: Option<Arc<Core<T>>>) -> Self {
        Self {
            state: HandleState::Waiting(receiver),
            _cache: cache,
        }
    }
}

// never pin-projected
impl<T> Unpin for UpdateHandle<T> {}

impl<T> Future for UpdateHandle<T> {
    type Output = Result<T, CacheError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            HandleState::Ready(result) => match result.take() {
                Some(result) => Poll::Ready(result),
                None => panic!("UpdateHandle polled after completion"),
            },
            HandleState::Waiting(receiver) => match Pin::new(receiver).poll(cx) {
                Poll::Ready(Ok(result)) => Poll::Ready(result),
                Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(CacheError::Abandoned)),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

impl<T> Debug for UpdateHandle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.state {
            HandleState::Ready(_) => f.write_str("UpdateHandle::Ready"),
            HandleState::Waiting(_) => f.write_str("UpdateHandle::Waiting"),
        }
    }
}
