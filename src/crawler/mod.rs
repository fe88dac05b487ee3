//! Crawler module for breadth-first graph discovery
//!
//! This module contains the core crawling logic, including:
//! - Request pacing with exponential backoff
//! - Paginated relation fetching
//! - The BFS frontier and visited set
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod frontier;
pub mod limiter;

pub use coordinator::{Coordinator, RunOutcome};
pub use fetcher::Fetcher;
pub use frontier::Frontier;
pub use limiter::{call_with_retry, RateLimiter, RetryPolicy};

use crate::api::SocialApi;
use crate::config::Config;
use crate::state::Checkpoint;
use crate::storage::open_storage;
use crate::CrawlError;
use std::future::Future;
use std::path::Path;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the graph database
/// 2. Restore the frontier from the checkpoint, or seed it
/// 3. Run the coordinator until the frontier empties or `shutdown` fires
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `api` - The remote API to crawl
/// * `fresh` - Ignore existing checkpoint files and start from the seeds
/// * `shutdown` - Completes when the crawl should stop
///
/// # Returns
///
/// * `Ok(RunOutcome)` - How the crawl ended
/// * `Err(CrawlError)` - Crawl failed
pub async fn crawl<A, F>(
    config: &Config,
    api: A,
    fresh: bool,
    shutdown: F,
) -> Result<RunOutcome, CrawlError>
where
    A: SocialApi,
    F: Future<Output = ()>,
{
    let storage = open_storage(Path::new(&config.output.database_path))?;

    let seeds = config.crawler.seed_refs();
    let frontier = if fresh {
        tracing::info!("Ignoring existing checkpoint, starting from {} seeds", seeds.len());
        Frontier::new(seeds)
    } else {
        Checkpoint::from_config(&config.output).load(&seeds)?
    };

    let mut coordinator = Coordinator::new(config, api, storage, frontier)?;
    let outcome = coordinator.run(shutdown).await?;

    tracing::info!(
        "Collected {} entities so far ({} API requests this run)",
        coordinator.known_len(),
        coordinator.total_requests()
    );

    Ok(outcome)
}
