use std::sync::Arc;

use futures::future::BoxFuture;

/// Spawns the fire-and-forget work of update sources (awaiting futures, pumping streams).
///
/// A spawned future must be driven to completion even when nothing awaits its result.
pub trait Executor: Send + Sync + 'static {
    fn spawn(&self, future: BoxFuture<'static, ()>);
}

pub type SharedExecutor = Arc<dyn Executor>;

/// Spawns onto the global async-std executor.
#[derive(Debug, Default, Clone, Copy)]
pub struct AsyncStdExecutor;

impl AsyncStdExecutor {
    pub fn new() -> Self {
        Self
    }

    pub fn shared() -> SharedExecutor {
        Arc::new(Self)
    }
}

impl Executor for AsyncStdExecutor {
    fn spawn(&self, future: BoxFuture<'static, ()>) {
        let _ = async_std::task::spawn(future);
    }
}

impl<F> Executor for F
where
    F: Fn(BoxFuture<'static, ()>) + Send + Sync + 'static,
{
    fn spawn(&self, future: BoxFuture<'static, ()>) {
        self(future)
    }
}
