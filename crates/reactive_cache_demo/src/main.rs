use std::sync::Arc;
use std::time::Duration;

use async_std::task;
use clap::Parser;
use futures::StreamExt;
use reactive_cache::{CacheInfo, CacheRegistry};
use tracing::{info, warn};

use crate::opts::Opts;
use crate::service::{Backend, DataService, Post};

mod logging;
mod opts;
mod service;

fn main() -> anyhow::Result<()> {
    let args = argfile::expand_args(argfile::parse_fromfile, argfile::PREFIX)?;

    let opts = Opts::parse_from(args);

    logging::configure_tracing(opts.trace.clone(), opts.verbose.clone())?;

    task::block_on(run(opts))
}

async fn run(opts: Opts) -> anyhow::Result<()> {
    let backend = Arc::new(Backend::new(Duration::from_millis(opts.delay_ms), opts.fail_first));
    let service = DataService::new(backend.clone());

    // every observer subscribes before the first fetch ends, they all share it
    let mut observers = Vec::with_capacity(opts.observers);
    for observer in 1..=opts.observers {
        let mut subscription = service.posts().subscribe()?;
        observers.push(task::spawn(async move {
            let mut received = 0_usize;
            while let Some(posts) = subscription.next().await {
                received += 1;
                info!("Observer received posts. observer: {}, posts: {}", observer, summary(&posts));
            }
            (observer, received)
        }));
    }

    if let Err(error) = service.refresh().await {
        warn!("Initial fetch failed, retrying. error: {}", error);
        service.refresh().await?;
    }

    for refresh in 1..=opts.refreshes {
        let posts = service.refresh().await?;
        info!("Refreshed posts. refresh: {}, posts: {}", refresh, summary(&posts));
    }

    println!("fetches: {}", backend.fetches());
    println!("active caches:");
    for entry in CacheRegistry::global().list_active() {
        println!(
            "  {}, populated: {}, version: {}",
            entry.name,
            entry.cache.is_populated(),
            entry.cache.version()
        );
    }

    service.shutdown()?;

    for observer in observers {
        let (observer, received) = observer.await;
        println!("observer {} received {} value(s)", observer, received);
    }

    Ok(())
}

fn summary(posts: &[Post]) -> String {
    posts
        .iter()
        .map(|post| post.title.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
