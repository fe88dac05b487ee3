//! Paginated API fetcher
//!
//! This module handles all remote reads for the crawler, including:
//! - Single entity lookups
//! - Walking paginated relation lists until a short page
//! - Decoding raw records field by field
//! - Counting logical requests for telemetry

use crate::api::{extract_record, SocialApi};
use crate::crawler::limiter::{call_with_retry, RateLimiter, RetryPolicy};
use crate::graph::{EntityRecord, EntityRef, RelationKind};
use std::sync::atomic::{AtomicU64, Ordering};

/// Reads entities and relation lists through the rate limiter
///
/// Calls never fail outward: every failure is retried by
/// [`call_with_retry`] until it succeeds.
pub struct Fetcher<A> {
    api: A,
    limiter: RateLimiter,
    policy: RetryPolicy,
    requests: AtomicU64,
}

impl<A: SocialApi> Fetcher<A> {
    pub fn new(api: A, limiter: RateLimiter, policy: RetryPolicy) -> Self {
        Self {
            api,
            limiter,
            policy,
            requests: AtomicU64::new(0),
        }
    }

    /// Fetches a single entity
    pub async fn fetch_entity(&self, entity: &EntityRef) -> EntityRecord {
        tracing::debug!("Fetching entity {}", entity);

        let raw = call_with_retry(&self.limiter, &self.policy, true, || {
            self.api.get_entity(entity)
        })
        .await;
        self.requests.fetch_add(1, Ordering::Relaxed);

        extract_record(&raw)
    }

    /// Fetches every page of an entity's relation list
    ///
    /// Pages are requested at offsets `0, page_size, 2 * page_size, ...`
    /// until one returns fewer than `page_size` records. The first page skips
    /// the rate limiter wait; later pages always wait.
    ///
    /// # Arguments
    ///
    /// * `entity` - The entity whose relations are listed
    /// * `kind` - Which relation list to read
    /// * `page_size` - Records requested per page
    ///
    /// # Returns
    ///
    /// All records in API order
    pub async fn fetch_entity_list(
        &self,
        entity: &EntityRef,
        kind: RelationKind,
        page_size: usize,
    ) -> Vec<EntityRecord> {
        let mut records = Vec::new();
        let mut page = 0usize;

        loop {
            let offset = page * page_size;
            let must_wait = page > 0;

            let rows = call_with_retry(&self.limiter, &self.policy, must_wait, || {
                self.api.get_relations(entity, kind, offset, page_size)
            })
            .await;
            self.requests.fetch_add(1, Ordering::Relaxed);

            tracing::debug!(
                "Fetched {} {} page {} ({} records)",
                entity,
                kind,
                page,
                rows.len()
            );

            let count = rows.len();
            records.extend(rows.iter().map(extract_record));

            if count < page_size {
                break;
            }
            page += 1;
        }

        records
    }

    /// Logical requests issued so far, not counting retries
    pub fn total_requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}
