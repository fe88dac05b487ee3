//! Crawl progress reporting
//!
//! Each observation compares the engine's counters with the previous
//! observation and derives rates over the elapsed window. Rates and the ETA
//! are `None` whenever the window or the rate is zero.

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Raw counters read from the engine after each entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlCounters {
    pub visited: u64,
    pub queue_len: u64,
    pub stored_entities: u64,
    pub total_requests: u64,
}

/// One progress line
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub visited: u64,
    pub queue_len: u64,
    pub queue_delta: i64,
    pub stored_entities: u64,
    pub stored_delta: i64,
    pub total_requests: u64,
    pub new_requests: u64,
    /// Requests per second over the window
    pub request_rate: Option<f64>,
    /// Visits per second over the window
    pub visit_rate: Option<f64>,
    /// Time to visit the remaining population at the current visit rate
    pub eta: Option<Duration>,
}

/// Tracks the previous observation for delta and rate computation
#[derive(Debug)]
pub struct ProgressReporter {
    population_estimate: u64,
    last: CrawlCounters,
    last_at: Instant,
}

impl ProgressReporter {
    pub fn new(population_estimate: u64) -> Self {
        Self::starting_at(population_estimate, CrawlCounters::default(), Instant::now())
    }

    /// Creates a reporter whose first window starts from `counters` at `at`
    pub fn starting_at(population_estimate: u64, counters: CrawlCounters, at: Instant) -> Self {
        Self {
            population_estimate,
            last: counters,
            last_at: at,
        }
    }

    /// Records `counters` as of now and reports against the previous observation
    pub fn observe(&mut self, counters: CrawlCounters) -> ProgressReport {
        self.observe_at(counters, Instant::now())
    }

    pub fn observe_at(&mut self, counters: CrawlCounters, now: Instant) -> ProgressReport {
        let window = now.saturating_duration_since(self.last_at).as_secs_f64();

        let new_requests = counters
            .total_requests
            .saturating_sub(self.last.total_requests);
        let new_visits = counters.visited.saturating_sub(self.last.visited);

        let request_rate = rate(new_requests, window);
        let visit_rate = rate(new_visits, window);

        let remaining = self.population_estimate.saturating_sub(counters.visited);
        let eta = match visit_rate {
            _ if remaining == 0 => Some(Duration::ZERO),
            Some(r) if r > 0.0 => Duration::try_from_secs_f64(remaining as f64 / r).ok(),
            _ => None,
        };

        let report = ProgressReport {
            visited: counters.visited,
            queue_len: counters.queue_len,
            queue_delta: delta(counters.queue_len, self.last.queue_len),
            stored_entities: counters.stored_entities,
            stored_delta: delta(counters.stored_entities, self.last.stored_entities),
            total_requests: counters.total_requests,
            new_requests,
            request_rate,
            visit_rate,
            eta,
        };

        self.last = counters;
        self.last_at = now;
        report
    }
}

fn rate(count: u64, window_secs: f64) -> Option<f64> {
    if window_secs > 0.0 {
        Some(count as f64 / window_secs)
    } else {
        None
    }
}

fn delta(current: u64, previous: u64) -> i64 {
    current as i64 - previous as i64
}

struct OptRate(Option<f64>);

impl fmt::Display for OptRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(r) => write!(f, "{:.2}", r),
            None => write!(f, "unknown"),
        }
    }
}

struct OptEta(Option<Duration>);

impl fmt::Display for OptEta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(eta) = self.0 else {
            return write!(f, "unknown");
        };
        let secs = eta.as_secs();
        let (days, hours, mins) = (secs / 86_400, secs / 3_600 % 24, secs / 60 % 60);
        if days > 0 {
            write!(f, "{}d {}h {}m", days, hours, mins)
        } else if hours > 0 {
            write!(f, "{}h {}m", hours, mins)
        } else {
            write!(f, "{}m {}s", mins, secs % 60)
        }
    }
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VISITED:{} QUEUE:{}({:+}) DB:{}({:+}) API:{}(+{}) req/s:{} visits/s:{} ETA:{}",
            self.visited,
            self.queue_len,
            self.queue_delta,
            self.stored_entities,
            self.stored_delta,
            self.total_requests,
            self.new_requests,
            OptRate(self.request_rate),
            OptRate(self.visit_rate),
            OptEta(self.eta)
        )
    }
}
