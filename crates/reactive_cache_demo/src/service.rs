use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_std::task;
use reactive_cache::{CacheBuilder, CacheError, UpdateSource, ValueReachableCache};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: u32,
    pub title: String,
}

/// A slow, occasionally failing, remote data source.
pub struct Backend {
    delay: Duration,
    fail_first: bool,
    fetches: AtomicUsize,
}

impl Backend {
    pub fn new(delay: Duration, fail_first: bool) -> Self {
        Self {
            delay,
            fail_first,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub async fn fetch_posts(&self) -> anyhow::Result<Vec<Post>> {
        let fetch = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Fetching posts. fetch: {}", fetch);

        task::sleep(self.delay).await;

        if self.fail_first && fetch == 1 {
            bail!("Simulated network failure. fetch: {}", fetch);
        }

        let posts = (1..=3)
            .map(|id| Post {
                id,
                title: format!("Post {} (fetch #{})", id, fetch),
            })
            .collect::<Vec<_>>();
        debug!("Fetched posts. fetch: {}, count: {}", fetch, posts.len());

        Ok(posts)
    }
}

/// Shares the posts of a [`Backend`] between any number of consumers.
pub struct DataService {
    posts: ValueReachableCache<Vec<Post>>,
}

impl DataService {
    pub fn new(backend: Arc<Backend>) -> Self {
        let posts = CacheBuilder::new(UpdateSource::from_async_fn(move || {
            let backend = backend.clone();
            async move { backend.fetch_posts().await }
        }))
        .name("DataService.posts")
        .value_reachable()
        .build();

        Self {
            posts,
        }
    }

    pub fn posts(&self) -> &ValueReachableCache<Vec<Post>> {
        &self.posts
    }

    /// Fetches the posts again, or joins the fetch in flight.
    pub async fn refresh(&self) -> Result<Vec<Post>, CacheError> {
        self.posts.trigger_update()?.await
    }

    pub fn shutdown(&self) -> Result<(), CacheError> {
        self.posts.complete()
    }
}
