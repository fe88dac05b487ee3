//! Breadth-first crawl frontier
//!
//! The queue is FIFO and does not deduplicate on enqueue. Entries that are
//! already visited are discarded when they reach the head of the queue, so
//! membership is checked once per dequeue rather than once per discovered edge.

use crate::graph::EntityRef;
use std::collections::{HashSet, VecDeque};

/// FIFO queue of identities to visit plus the set already visited
#[derive(Debug, Default, Clone)]
pub struct Frontier {
    queue: VecDeque<EntityRef>,
    visited: HashSet<EntityRef>,
}

impl Frontier {
    /// Creates a frontier holding `seeds` with nothing visited
    pub fn new(seeds: impl IntoIterator<Item = EntityRef>) -> Self {
        Self {
            queue: seeds.into_iter().collect(),
            visited: HashSet::new(),
        }
    }

    /// Restores a frontier from checkpointed parts
    pub fn from_parts(queue: VecDeque<EntityRef>, visited: HashSet<EntityRef>) -> Self {
        Self { queue, visited }
    }

    /// Removes and returns the next unvisited identity
    ///
    /// Visited entries found at the head are dropped silently.
    pub fn pop(&mut self) -> Option<EntityRef> {
        while let Some(entry) = self.queue.pop_front() {
            if self.visited.contains(&entry) {
                tracing::trace!("Skipping already visited {}", entry);
                continue;
            }
            return Some(entry);
        }
        None
    }

    /// Puts an entry back at the head of the queue
    pub fn push_front(&mut self, entry: EntityRef) {
        self.queue.push_front(entry);
    }

    /// Appends identities to the tail of the queue
    pub fn extend(&mut self, entries: impl IntoIterator<Item = EntityRef>) {
        self.queue.extend(entries);
    }

    pub fn mark_visited(&mut self, entry: EntityRef) {
        self.visited.insert(entry);
    }

    pub fn is_visited(&self, entry: &EntityRef) -> bool {
        self.visited.contains(entry)
    }

    /// Number of queued entries, including ones that will be skipped as visited
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    pub fn queue(&self) -> &VecDeque<EntityRef> {
        &self.queue
    }

    pub fn visited(&self) -> &HashSet<EntityRef> {
        &self.visited
    }
}
