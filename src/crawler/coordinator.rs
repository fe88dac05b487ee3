//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the breadth-first loop that coordinates:
//! - Popping identities from the frontier
//! - Resolving entities and relation lists (store first, then API)
//! - Persisting stubs and edges before the frontier advances
//! - Handling shutdown and checkpointing

use crate::api::SocialApi;
use crate::config::Config;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::frontier::Frontier;
use crate::crawler::limiter::{RateLimiter, RetryPolicy};
use crate::graph::{Entity, EntityRecord, EntityRef, Relation, RelationKind};
use crate::output::{CrawlCounters, ProgressReporter};
use crate::state::{Checkpoint, EntryState};
use crate::storage::{SqliteStorage, Storage};
use crate::CrawlError;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;

/// How a call to [`Coordinator::run`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The frontier ran dry
    Exhausted,
    /// The shutdown future fired
    Interrupted,
}

/// Everything learned about one entry before it is written
#[derive(Debug, Default)]
struct Resolution {
    /// Numeric identity, absent when the record carried none
    id: Option<i64>,
    /// Entity fetched from the API, absent when it was already stored
    fetched: Option<Entity>,
    relations: Vec<Relation>,
    stubs: Vec<Entity>,
    /// Targets not yet visited, in discovery order
    enqueue: Vec<i64>,
}

/// Main crawler coordinator structure
pub struct Coordinator<A> {
    storage: SqliteStorage,
    fetcher: Fetcher<A>,
    frontier: Frontier,
    known: HashSet<i64>,
    checkpoint: Checkpoint,
    reporter: ProgressReporter,
    page_size: usize,
    checkpoint_every: u64,
    processed: u64,
}

impl<A: SocialApi> Coordinator<A> {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `api` - The remote API to discover the graph from
    /// * `storage` - The opened graph database
    /// * `frontier` - The restored or freshly seeded frontier
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(CrawlError)` - Failed to load the known entity set
    pub fn new(
        config: &Config,
        api: A,
        storage: SqliteStorage,
        frontier: Frontier,
    ) -> Result<Self, CrawlError> {
        let known = storage.all_entity_ids()?;
        tracing::info!(
            "Loaded {} known entities, {} queued, {} visited",
            known.len(),
            frontier.len(),
            frontier.visited_len()
        );

        let limiter = RateLimiter::new(config.crawler.min_interval());
        let fetcher = Fetcher::new(api, limiter, RetryPolicy::from_config(config));

        Ok(Self {
            storage,
            fetcher,
            frontier,
            known,
            checkpoint: Checkpoint::from_config(&config.output),
            reporter: ProgressReporter::new(config.crawler.population_estimate),
            page_size: config.crawler.page_size,
            checkpoint_every: config.crawler.checkpoint_every,
            processed: 0,
        })
    }

    /// Runs the crawl loop until the frontier is empty or `shutdown` fires
    ///
    /// Shutdown is honoured only while an entry is being resolved; the entry
    /// goes back to the head of the frontier. Persisting is never interrupted.
    /// The checkpoint is written when the loop ends, and every
    /// `checkpoint-every` entries along the way. Storage failures return at
    /// once without writing the checkpoint.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<RunOutcome, CrawlError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let outcome = loop {
            let Some(entry) = self.frontier.pop() else {
                tracing::info!("Frontier is empty, crawl complete");
                break RunOutcome::Exhausted;
            };

            tracing::debug!("Processing {}", entry);
            let mut state = EntryState::Dequeued.advance(EntryState::ResolvingEntity)?;

            let resolved = tokio::select! {
                biased;
                _ = &mut shutdown => None,
                resolution = self.resolve(&entry, &mut state) => Some(resolution),
            };

            let Some(resolution) = resolved else {
                state.advance(EntryState::Dequeued)?;
                tracing::info!("Shutdown requested, returning {} to the frontier", entry);
                self.frontier.push_front(entry);
                break RunOutcome::Interrupted;
            };

            self.persist(entry, resolution?, state)?;
            self.processed += 1;

            let report = self.reporter.observe(self.counters()?);
            tracing::info!("{}", report);

            if self.checkpoint_every > 0 && self.processed % self.checkpoint_every == 0 {
                self.checkpoint.save(&self.frontier)?;
            }
        };

        self.checkpoint.save(&self.frontier)?;
        tracing::info!(
            "Checkpoint written: {} queued, {} visited",
            self.frontier.len(),
            self.frontier.visited_len()
        );

        Ok(outcome)
    }

    /// Resolves the entity and both relation lists for one entry
    async fn resolve(
        &self,
        entry: &EntityRef,
        state: &mut EntryState,
    ) -> Result<Resolution, CrawlError> {
        let (entity, fetched) = match self.storage.get_entity(entry)? {
            Some(entity) => (entity, false),
            None => match self.fetcher.fetch_entity(entry).await.into_entity(Utc::now()) {
                Some(entity) => (entity, true),
                None => {
                    tracing::warn!("Record for {} has no usable identity, skipping", entry);
                    return Ok(Resolution::default());
                }
            },
        };
        let id = entity.id;

        *state = state.advance(EntryState::ResolvingRelations)?;

        let mut relations = Vec::new();
        let mut rows: HashMap<i64, EntityRecord> = HashMap::new();
        let mut fetched_targets = Vec::new();
        let mut stored_targets = BTreeSet::new();

        for kind in RelationKind::ALL {
            let stored = self.storage.list_relations_of(id, kind)?;
            if stored.is_empty() {
                let records = self
                    .fetcher
                    .fetch_entity_list(&EntityRef::Id(id), kind, self.page_size)
                    .await;

                for record in records {
                    let Some(target) = record.id else {
                        tracing::debug!("Dropping {} relation of {} without identity", kind, id);
                        continue;
                    };
                    if target == id {
                        continue;
                    }
                    relations.push(match kind {
                        RelationKind::Mutual => Relation::mutual(id, target),
                        RelationKind::Directed => Relation::directed(id, target),
                    });
                    fetched_targets.push(target);
                    rows.entry(target).or_insert(record);
                }
            } else {
                stored_targets.extend(stored);
            }

            if kind == RelationKind::Mutual {
                stored_targets.extend(self.storage.list_incoming_relations(id, kind)?);
            }
        }

        // A stored target may still be unvisited when the checkpoint lags the store
        let mut seen = HashSet::new();
        let targets: Vec<i64> = fetched_targets
            .into_iter()
            .chain(stored_targets)
            .filter(|target| *target != id && seen.insert(*target))
            .collect();

        let now = Utc::now();
        let stubs = targets
            .iter()
            .filter(|target| !self.known.contains(*target))
            .filter_map(|target| rows.remove(target))
            .filter_map(|record| record.into_entity(now))
            .collect();
        let enqueue = targets
            .into_iter()
            .filter(|target| !self.frontier.is_visited(&EntityRef::Id(*target)))
            .collect();

        Ok(Resolution {
            id: Some(id),
            fetched: fetched.then_some(entity),
            relations,
            stubs,
            enqueue,
        })
    }

    /// Writes a resolution and advances the frontier
    fn persist(
        &mut self,
        entry: EntityRef,
        resolution: Resolution,
        state: EntryState,
    ) -> Result<(), CrawlError> {
        let state = state.advance(EntryState::Persisting)?;

        if let Some(entity) = &resolution.fetched {
            self.storage.put_entity_if_absent(entity)?;
        }
        let stubs = self.storage.put_entities_if_absent(&resolution.stubs)?;
        let edges = self.storage.put_relations_if_absent(&resolution.relations)?;

        if let Some(id) = resolution.id {
            self.known.insert(id);
            self.frontier.mark_visited(EntityRef::Id(id));
        }
        self.known.extend(resolution.stubs.iter().map(|stub| stub.id));

        tracing::debug!(
            "Persisted {}: {} new stubs, {} new edges, {} enqueued",
            entry,
            stubs,
            edges,
            resolution.enqueue.len()
        );

        self.frontier.mark_visited(entry);
        self.frontier
            .extend(resolution.enqueue.into_iter().map(EntityRef::Id));

        state.advance(EntryState::Visited)?;
        Ok(())
    }

    fn counters(&self) -> Result<CrawlCounters, CrawlError> {
        Ok(CrawlCounters {
            visited: self.frontier.visited_len() as u64,
            queue_len: self.frontier.len() as u64,
            stored_entities: self.storage.count_entities()?,
            total_requests: self.fetcher.total_requests(),
        })
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Logical API requests issued by this coordinator
    pub fn total_requests(&self) -> u64 {
        self.fetcher.total_requests()
    }

    /// Number of entities stored so far
    pub fn known_len(&self) -> usize {
        self.known.len()
    }
}
