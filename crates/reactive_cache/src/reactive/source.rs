use std::fmt::{Debug, Formatter};
use std::future::Future;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt};

use super::signal::Signal;

pub type SourceStream<T> = BoxStream<'static, anyhow::Result<T>>;
pub type SourceFuture<T> = BoxFuture<'static, anyhow::Result<T>>;
pub type SourceFactory<T> = Box<dyn Fn() -> Produced<T> + Send + Sync>;

/// Describes how a cache obtains its next value.
///
/// The variant is chosen once, when the cache is built.
pub enum UpdateSource<T> {
    /// An already-active stream. It is subscribed by the first update and then feeds the cache for
    /// its whole lifetime; an `Err` item ends it.
    Stream(SourceStream<T>),
    /// A single eventual value. The resolution is memoized, later updates observe the same result.
    OneShot(SourceFuture<T>),
    /// A pull-based cell, read on every update and followed on every change.
    PullCell(Signal<T>),
    /// Invoked anew for every update.
    Factory(SourceFactory<T>),
    /// An already-known value.
    Plain(T),
}

/// What a [`UpdateSource::Factory`] returns for one update.
pub enum Produced<T> {
    Value(T),
    Stream(SourceStream<T>),
    Future(SourceFuture<T>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Stream,
    OneShot,
    PullCell,
    Factory,
    Plain,
}

impl<T> UpdateSource<T> {
    pub fn stream(stream: impl Stream<Item = anyhow::Result<T>> + Send + 'static) -> Self {
        Self::Stream(stream.boxed())
    }

    pub fn future(future: impl Future<Output = anyhow::Result<T>> + Send + 'static) -> Self {
        Self::OneShot(future.boxed())
    }

    pub fn pull_cell(signal: Signal<T>) -> Self {
        Self::PullCell(signal)
    }

    /// Invoked anew for every update. A panicking factory fails that update with
    /// [`crate::CacheError::ProducerFailure`], the cache stays usable.
    pub fn factory(factory: impl Fn() -> Produced<T> + Send + Sync + 'static) -> Self {
        Self::Factory(Box::new(factory))
    }

    /// A factory whose every invocation returns a plain value.
    pub fn from_fn(f: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self::factory(move || Produced::Value(f()))
    }

    /// A factory whose every invocation starts a new future.
    pub fn from_async_fn<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self::factory(move || Produced::Future(f().boxed()))
    }

    pub fn plain(value: T) -> Self {
        Self::Plain(value)
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Stream(_) => SourceKind::Stream,
            Self::OneShot(_) => SourceKind::OneShot,
            Self::PullCell(_) => SourceKind::PullCell,
            Self::Factory(_) => SourceKind::Factory,
            Self::Plain(_) => SourceKind::Plain,
        }
    }
}

impl<T> Debug for UpdateSource<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "UpdateSource::{:?}", self.kind())
    }
}

impl<T> Produced<T> {
    pub fn value(value: T) -> Self {
        Self::Value(value)
    }

    pub fn stream(stream: impl Stream<Item = anyhow::Result<T>> + Send + 'static) -> Self {
        Self::Stream(stream.boxed())
    }

    pub fn future(future: impl Future<Output = anyhow::Result<T>> + Send + 'static) -> Self {
        Self::Future(future.boxed())
    }
}

impl<T> Debug for Produced<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(_) => f.write_str("Produced::Value"),
            Self::Stream(_) => f.write_str("Produced::Stream"),
            Self::Future(_) => f.write_str("Produced::Future"),
        }
    }
}
