//! Integration tests for the crawler
//!
//! Most tests drive the coordinator against an in-process fake graph so the
//! order and number of API calls can be checked exactly. One test runs the
//! whole crawl over HTTP against a wiremock server.

use async_trait::async_trait;
use douban_ripple::api::{ApiError, ApiResult, HttpApi, RawRecord, SocialApi};
use douban_ripple::config::{ApiConfig, Config, CrawlerConfig, OutputConfig};
use douban_ripple::crawler::{crawl, Coordinator, Frontier, RunOutcome};
use douban_ripple::graph::{EntityRef, RelationKind};
use douban_ripple::state::Checkpoint;
use douban_ripple::storage::{SqliteStorage, Storage};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::Notify;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// One API call observed by the fake graph
#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Entity(EntityRef),
    Relations(i64, RelationKind, usize),
}

/// In-memory social graph served through the API trait
#[derive(Clone, Default)]
struct FakeGraph {
    mutual: HashMap<i64, Vec<i64>>,
    directed: HashMap<i64, Vec<i64>>,
    names: HashMap<String, i64>,
    calls: Arc<Mutex<Vec<Call>>>,
    /// Signalled once when this many calls have been made
    notify_after: Option<(usize, Arc<Notify>)>,
    /// Number of leading calls answered with a transient failure
    failures: Arc<Mutex<usize>>,
    /// Every call from this one on fails transiently
    fail_from: Option<usize>,
}

impl FakeGraph {
    fn new() -> Self {
        Self::default()
    }

    fn friends(mut self, id: i64, friends: &[i64]) -> Self {
        self.mutual.insert(id, friends.to_vec());
        self
    }

    fn follows(mut self, id: i64, follows: &[i64]) -> Self {
        self.directed.insert(id, follows.to_vec());
        self
    }

    fn name(mut self, name: &str, id: i64) -> Self {
        self.names.insert(name.to_string(), id);
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn relation_calls(&self, kind: RelationKind) -> Vec<i64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Relations(id, k, 0) if k == kind => Some(id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) -> ApiResult<()> {
        let count = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call);
            calls.len()
        };
        if let Some((after, notify)) = &self.notify_after {
            if count == *after {
                notify.notify_one();
            }
        }

        if self.fail_from.is_some_and(|from| count >= from) {
            return Err(ApiError::Transient("connection refused".to_string()));
        }

        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(ApiError::Transient("connection reset".to_string()));
        }
        Ok(())
    }

    fn resolve(&self, entity: &EntityRef) -> Option<i64> {
        match entity {
            EntityRef::Id(id) => Some(*id),
            EntityRef::Name(name) => self.names.get(name).copied(),
        }
    }
}

fn person(id: i64) -> RawRecord {
    RawRecord::new(json!({
        "id": {"$t": format!("http://api.douban.com/people/{}", id)},
        "db:uid": {"$t": format!("user{}", id)},
        "title": {"$t": format!("User {}", id)},
        "link": [
            {"@rel": "self", "@href": format!("http://api.douban.com/people/{}", id)}
        ]
    }))
}

#[async_trait]
impl SocialApi for FakeGraph {
    async fn get_entity(&self, entity: &EntityRef) -> ApiResult<RawRecord> {
        self.record(Call::Entity(entity.clone()))?;
        let id = self
            .resolve(entity)
            .ok_or_else(|| ApiError::Malformed(format!("unknown person {}", entity)))?;
        Ok(person(id))
    }

    async fn get_relations(
        &self,
        entity: &EntityRef,
        kind: RelationKind,
        offset: usize,
        page_size: usize,
    ) -> ApiResult<Vec<RawRecord>> {
        let id = self.resolve(entity).unwrap_or_default();
        self.record(Call::Relations(id, kind, offset))?;

        let table = match kind {
            RelationKind::Mutual => &self.mutual,
            RelationKind::Directed => &self.directed,
        };
        Ok(table
            .get(&id)
            .map(|ids| {
                ids.iter()
                    .skip(offset)
                    .take(page_size)
                    .copied()
                    .map(person)
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Creates a test configuration writing everything under `dir`
fn create_test_config(dir: &Path, seeds: &[&str], base_url: &str) -> Config {
    Config {
        api: ApiConfig {
            base_url: base_url.to_string(),
            api_key: Some("test-key".to_string()),
            api_key_file: None,
            call_timeout_secs: 10,
        },
        crawler: CrawlerConfig {
            seeds: seeds.iter().map(|s| s.to_string()).collect(),
            page_size: 2,
            min_interval_ms: 0,
            retry_base_secs: 1,
            ban_backoff_secs: 1,
            population_estimate: 1000,
            checkpoint_every: 0,
        },
        output: OutputConfig {
            database_path: dir.join("graph.db").display().to_string(),
            queue_path: dir.join("queue.json").display().to_string(),
            visited_path: dir.join("visited.json").display().to_string(),
        },
    }
}

fn open(config: &Config) -> SqliteStorage {
    SqliteStorage::new(Path::new(&config.output.database_path)).unwrap()
}

async fn run_to_completion(config: &Config, api: FakeGraph) -> RunOutcome {
    crawl(config, api, false, std::future::pending()).await.unwrap()
}

/// Crawls until the `calls`-th API call, which fails like every call after it
async fn run_until_call(config: &Config, graph: &FakeGraph, calls: usize) {
    let notify = Arc::new(Notify::new());
    let api = FakeGraph {
        calls: Arc::new(Mutex::new(Vec::new())),
        notify_after: Some((calls, notify.clone())),
        fail_from: Some(calls),
        ..graph.clone()
    };

    let outcome = crawl(config, api, false, async move { notify.notified().await })
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Interrupted);
}

/// Crawls `graph` from seed 1 in a fresh directory
async fn reference_crawl(graph: &FakeGraph) -> (TempDir, Config) {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), &["1"], "http://localhost");
    let api = FakeGraph {
        calls: Arc::new(Mutex::new(Vec::new())),
        ..graph.clone()
    };
    run_to_completion(&config, api).await;
    (dir, config)
}

fn visited_ids(config: &Config) -> HashSet<EntityRef> {
    Checkpoint::from_config(&config.output)
        .load(&[])
        .unwrap()
        .visited()
        .clone()
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_small_graph() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), &["1"], "http://localhost");

    // 1 <-> 2 friends, 2 follows 3
    let api = FakeGraph::new()
        .friends(1, &[2])
        .friends(2, &[1])
        .follows(2, &[3]);

    let outcome = run_to_completion(&config, api).await;
    assert_eq!(outcome, RunOutcome::Exhausted);

    let storage = open(&config);
    assert_eq!(storage.all_entity_ids().unwrap(), HashSet::from([1, 2, 3]));
    assert_eq!(storage.count_relations(RelationKind::Mutual).unwrap(), 1);
    assert_eq!(
        storage.list_relations_of(1, RelationKind::Mutual).unwrap(),
        HashSet::from([2])
    );
    assert_eq!(storage.count_relations(RelationKind::Directed).unwrap(), 1);
    assert_eq!(
        storage.list_relations_of(2, RelationKind::Directed).unwrap(),
        HashSet::from([3])
    );

    let frontier = Checkpoint::from_config(&config.output).load(&[]).unwrap();
    assert!(frontier.is_empty());
    for id in [1, 2, 3] {
        assert!(frontier.is_visited(&EntityRef::Id(id)));
    }
    assert_eq!(frontier.visited_len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_bfs_order() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), &["1"], "http://localhost");

    // S=1 has neighbours A=2 and B=3; A has neighbour C=4
    let api = FakeGraph::new()
        .friends(1, &[2, 3])
        .friends(2, &[4]);

    run_to_completion(&config, api.clone()).await;

    assert_eq!(api.relation_calls(RelationKind::Mutual), vec![1, 2, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_stored_entities_are_not_refetched() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), &["1"], "http://localhost");
    let api = FakeGraph::new().friends(1, &[2, 3]);

    run_to_completion(&config, api.clone()).await;

    // Only the seed is fetched; neighbours were stored as stubs
    let entity_calls: Vec<Call> = api
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Entity(_)))
        .collect();
    assert_eq!(entity_calls, vec![Call::Entity(EntityRef::Id(1))]);
}

#[tokio::test(start_paused = true)]
async fn test_textual_seed_resolves_to_id() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), &["ahbei", "7"], "http://localhost");
    let api = FakeGraph::new().name("ahbei", 7).friends(7, &[8]);

    run_to_completion(&config, api.clone()).await;

    let frontier = Checkpoint::from_config(&config.output).load(&[]).unwrap();
    assert!(frontier.is_visited(&EntityRef::Name("ahbei".to_string())));
    assert!(frontier.is_visited(&EntityRef::Id(7)));

    // The numeric seed was skipped as already visited
    assert_eq!(api.relation_calls(RelationKind::Mutual), vec![7, 8]);
}

#[tokio::test(start_paused = true)]
async fn test_resume_does_not_duplicate_edges() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), &["1"], "http://localhost");

    let graph = FakeGraph::new()
        .friends(1, &[2, 3])
        .friends(2, &[1, 4])
        .follows(3, &[4, 1])
        .follows(4, &[2]);

    // First run: stop after the first few calls
    let notify = Arc::new(Notify::new());
    let mut interrupted = graph.clone();
    interrupted.calls = Arc::new(Mutex::new(Vec::new()));
    interrupted.notify_after = Some((4, notify.clone()));

    let outcome = crawl(&config, interrupted, false, async move {
        notify.notified().await
    })
    .await
    .unwrap();
    assert_eq!(outcome, RunOutcome::Interrupted);

    // Second run resumes from the checkpoint
    let resumed = graph.clone();
    let outcome = run_to_completion(&config, resumed).await;
    assert_eq!(outcome, RunOutcome::Exhausted);

    // A single uninterrupted crawl gives the reference result
    let reference_dir = TempDir::new().unwrap();
    let reference_config = create_test_config(reference_dir.path(), &["1"], "http://localhost");
    let reference = FakeGraph {
        calls: Arc::new(Mutex::new(Vec::new())),
        ..graph
    };
    run_to_completion(&reference_config, reference).await;

    let storage = open(&config);
    let expected = open(&reference_config);
    assert_eq!(
        storage.all_entity_ids().unwrap(),
        expected.all_entity_ids().unwrap()
    );
    for kind in RelationKind::ALL {
        assert_eq!(
            storage.count_relations(kind).unwrap(),
            expected.count_relations(kind).unwrap(),
            "{} relation count differs after resume",
            kind
        );
    }
    assert_eq!(storage.count_relations(RelationKind::Mutual).unwrap(), 3);
    assert_eq!(storage.count_relations(RelationKind::Directed).unwrap(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_lost_checkpoint_still_reaches_stored_stubs() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), &["1"], "http://localhost");
    let graph = FakeGraph::new()
        .friends(1, &[2, 3])
        .follows(1, &[3])
        .friends(2, &[4]);

    // Entry 1 takes four calls; the fifth is the first one for entry 2
    run_until_call(&config, &graph, 5).await;
    assert_eq!(open(&config).all_entity_ids().unwrap(), HashSet::from([1, 2, 3]));

    // The process dies before any checkpoint reaches disk
    let checkpoint = Checkpoint::from_config(&config.output);
    std::fs::remove_file(checkpoint.queue_path()).unwrap();
    std::fs::remove_file(checkpoint.visited_path()).unwrap();

    let rerun = FakeGraph {
        calls: Arc::new(Mutex::new(Vec::new())),
        ..graph.clone()
    };
    let outcome = run_to_completion(&config, rerun.clone()).await;
    assert_eq!(outcome, RunOutcome::Exhausted);

    let expected: HashSet<EntityRef> = [1, 2, 3, 4].into_iter().map(EntityRef::Id).collect();
    assert_eq!(visited_ids(&config), expected);
    assert_eq!(
        open(&config).all_entity_ids().unwrap(),
        HashSet::from([1, 2, 3, 4])
    );
    assert_eq!(rerun.relation_calls(RelationKind::Mutual), vec![2, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_stale_checkpoint_does_not_refetch_or_duplicate() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), &["1"], "http://localhost");
    let graph = FakeGraph::new()
        .friends(1, &[2, 3])
        .follows(1, &[3])
        .friends(2, &[4])
        .follows(3, &[4]);

    // Checkpoint taken before entry 1 was resolved: queue [1], nothing visited
    run_until_call(&config, &graph, 1).await;
    let checkpoint = Checkpoint::from_config(&config.output);
    let stale_queue = std::fs::read(checkpoint.queue_path()).unwrap();
    let stale_visited = std::fs::read(checkpoint.visited_path()).unwrap();
    assert_eq!(checkpoint.load(&[]).unwrap().visited_len(), 0);

    // Entry 1 is persisted, then the newer checkpoint is lost
    run_until_call(&config, &graph, 5).await;
    std::fs::write(checkpoint.queue_path(), stale_queue).unwrap();
    std::fs::write(checkpoint.visited_path(), stale_visited).unwrap();

    let rerun = FakeGraph {
        calls: Arc::new(Mutex::new(Vec::new())),
        ..graph.clone()
    };
    let outcome = run_to_completion(&config, rerun.clone()).await;
    assert_eq!(outcome, RunOutcome::Exhausted);

    // Entry 1 is rebuilt from the store alone
    assert!(!rerun
        .calls()
        .iter()
        .any(|call| matches!(call, Call::Relations(1, ..) | Call::Entity(EntityRef::Id(1)))));

    let (_reference_dir, reference_config) = reference_crawl(&graph).await;
    let storage = open(&config);
    let expected = open(&reference_config);
    for kind in RelationKind::ALL {
        assert_eq!(
            storage.count_relations(kind).unwrap(),
            expected.count_relations(kind).unwrap(),
            "{} relation count differs after a stale resume",
            kind
        );
    }
    assert_eq!(
        storage.all_entity_ids().unwrap(),
        expected.all_entity_ids().unwrap()
    );
    assert_eq!(visited_ids(&config), visited_ids(&reference_config));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_requeues_entry_in_flight() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), &["1"], "http://localhost");

    let notify = Arc::new(Notify::new());
    let mut api = FakeGraph::new().friends(1, &[2]);
    api.notify_after = Some((1, notify.clone()));
    // Keep the first entity lookup retrying so shutdown wins the race
    api.failures = Arc::new(Mutex::new(usize::MAX));

    let storage = open(&config);
    let frontier = Frontier::new(vec![EntityRef::Id(1)]);
    let mut coordinator = Coordinator::new(&config, api, storage, frontier).unwrap();

    let outcome = coordinator
        .run(async move { notify.notified().await })
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::Interrupted);
    assert_eq!(coordinator.frontier().len(), 1);
    assert!(!coordinator.frontier().is_visited(&EntityRef::Id(1)));
    assert_eq!(coordinator.storage().count_entities().unwrap(), 0);

    let restored = Checkpoint::from_config(&config.output).load(&[]).unwrap();
    assert_eq!(restored.queue().front(), Some(&EntityRef::Id(1)));
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), &["1"], "http://localhost");

    let mut api = FakeGraph::new().friends(1, &[2]);
    api.failures = Arc::new(Mutex::new(3));

    let storage = open(&config);
    let mut coordinator =
        Coordinator::new(&config, api.clone(), storage, Frontier::new(vec![EntityRef::Id(1)]))
            .unwrap();
    coordinator.run(std::future::pending()).await.unwrap();

    assert_eq!(coordinator.known_len(), 2);
    // Three failed attempts are not counted as requests
    assert_eq!(
        coordinator.total_requests() + 3,
        api.calls().len() as u64
    );
}

#[tokio::test]
async fn test_crawl_over_http() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), &["1"], &mock_server.uri());

    let feed = |ids: &[i64]| {
        let entries: Vec<_> = ids.iter().map(|id| person(*id).0).collect();
        json!({ "entry": entries })
    };

    Mock::given(method("GET"))
        .and(path("/people/1"))
        .and(query_param("apikey", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(person(1).0))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/people/1/friends"))
        .respond_with(ResponseTemplate::new(200).set_body_json(feed(&[2])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/people/2/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(feed(&[3])))
        .mount(&mock_server)
        .await;

    // Every other list is empty
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock_server)
        .await;

    let api = HttpApi::new(&mock_server.uri(), "test-key").unwrap();
    let outcome = crawl(&config, api, false, std::future::pending())
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Exhausted);

    let storage = open(&config);
    assert_eq!(storage.all_entity_ids().unwrap(), HashSet::from([1, 2, 3]));
    assert_eq!(
        storage.list_relations_of(1, RelationKind::Mutual).unwrap(),
        HashSet::from([2])
    );
    assert_eq!(
        storage.list_relations_of(2, RelationKind::Directed).unwrap(),
        HashSet::from([3])
    );

    let stub = storage.get_entity(&EntityRef::Id(3)).unwrap().unwrap();
    assert_eq!(stub.uid_text.as_deref(), Some("user3"));
}
