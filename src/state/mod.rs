//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `EntryState`: Tracks one frontier entry through resolution and persistence
//! - `Checkpoint`: Persists the frontier and visited set between runs

mod checkpoint;
mod entry_state;

// Re-export main types
pub use checkpoint::Checkpoint;
pub use entry_state::EntryState;
