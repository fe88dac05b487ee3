//! Statistics generation from the crawl database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer and the frontier checkpoint.

use crate::crawler::Frontier;
use crate::graph::RelationKind;
use crate::storage::Storage;
use crate::CrawlError;

/// Crawl statistics summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlStatistics {
    /// Number of stored entities, including stubs not yet visited
    pub total_entities: u64,

    /// Stored mutual relations
    pub mutual_relations: u64,

    /// Stored directed relations
    pub directed_relations: u64,

    /// Entries waiting in the checkpointed frontier
    pub queued: Option<usize>,

    /// Identities in the checkpointed visited set
    pub visited: Option<usize>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `frontier` - The checkpointed frontier, if one was loaded
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(CrawlError)` - Failed to query statistics
pub fn load_statistics(
    storage: &dyn Storage,
    frontier: Option<&Frontier>,
) -> Result<CrawlStatistics, CrawlError> {
    Ok(CrawlStatistics {
        total_entities: storage.count_entities()?,
        mutual_relations: storage.count_relations(RelationKind::Mutual)?,
        directed_relations: storage.count_relations(RelationKind::Directed)?,
        queued: frontier.map(Frontier::len),
        visited: frontier.map(Frontier::visited_len),
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Graph:");
    println!("  Entities stored: {}", stats.total_entities);
    println!("  Mutual relations: {}", stats.mutual_relations);
    println!("  Directed relations: {}", stats.directed_relations);
    println!();

    println!("Frontier:");
    match (stats.queued, stats.visited) {
        (Some(queued), Some(visited)) => {
            println!("  Queued: {}", queued);
            println!("  Visited: {}", visited);

            let coverage = if stats.total_entities > 0 {
                (visited as f64 / stats.total_entities as f64) * 100.0
            } else {
                0.0
            };
            println!(
                "\nCoverage: {:.1}% ({} visited / {} stored entities)",
                coverage, visited, stats.total_entities
            );
        }
        _ => println!("  No checkpoint found"),
    }
}
