//! Output module for progress reporting and crawl statistics
//!
//! This module handles:
//! - Per-entry progress lines with rates and ETA
//! - Offline statistics over the stored graph

pub mod stats;
mod telemetry;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};
pub use telemetry::{CrawlCounters, ProgressReport, ProgressReporter};
