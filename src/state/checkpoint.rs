//! Crawl checkpoint persistence
//!
//! The frontier queue and the visited set are stored as two independent JSON
//! files. Each is replaced atomically (write to a temp file in the same
//! directory, then rename), so a crash mid-write leaves the previous
//! checkpoint intact.
//!
//! The pair is not replaced atomically: the queue is written first, so a crash
//! between the two renames leaves a newer queue next to an older visited set.
//! Entries visited since the previous save then count as unvisited and are
//! resolved again from the store. Nothing stored is lost, and no edge is
//! written twice.

use crate::config::OutputConfig;
use crate::crawler::Frontier;
use crate::graph::EntityRef;
use crate::CrawlError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Location of the two checkpoint files
#[derive(Debug, Clone)]
pub struct Checkpoint {
    queue_path: PathBuf,
    visited_path: PathBuf,
}

impl Checkpoint {
    pub fn new(queue_path: impl Into<PathBuf>, visited_path: impl Into<PathBuf>) -> Self {
        Self {
            queue_path: queue_path.into(),
            visited_path: visited_path.into(),
        }
    }

    pub fn from_config(output: &OutputConfig) -> Self {
        Self::new(&output.queue_path, &output.visited_path)
    }

    /// Loads the frontier from disk
    ///
    /// A missing queue file means the crawl starts from `seeds`; a missing
    /// visited file means nothing has been visited yet.
    ///
    /// # Arguments
    ///
    /// * `seeds` - Identities to start from when no queue checkpoint exists
    ///
    /// # Returns
    ///
    /// * `Ok(Frontier)` - The restored (or fresh) frontier
    /// * `Err(CrawlError)` - A checkpoint file exists but could not be read
    pub fn load(&self, seeds: &[EntityRef]) -> Result<Frontier, CrawlError> {
        let queue: VecDeque<EntityRef> = match read_json(&self.queue_path)? {
            Some(queue) => queue,
            None => {
                tracing::info!(
                    "No frontier checkpoint at {}, starting from {} seeds",
                    self.queue_path.display(),
                    seeds.len()
                );
                seeds.iter().cloned().collect()
            }
        };

        let visited: HashSet<EntityRef> = read_json(&self.visited_path)?.unwrap_or_default();

        Ok(Frontier::from_parts(queue, visited))
    }

    /// Writes the frontier to disk
    pub fn save(&self, frontier: &Frontier) -> Result<(), CrawlError> {
        write_json_atomic(&self.queue_path, frontier.queue())?;
        write_json_atomic(&self.visited_path, frontier.visited())?;
        tracing::debug!(
            "Checkpoint saved: {} queued, {} visited",
            frontier.len(),
            frontier.visited_len()
        );
        Ok(())
    }

    pub fn queue_path(&self) -> &Path {
        &self.queue_path
    }

    pub fn visited_path(&self) -> &Path {
        &self.visited_path
    }
}

fn checkpoint_error(path: &Path, source: std::io::Error) -> CrawlError {
    CrawlError::Checkpoint {
        path: path.to_path_buf(),
        source,
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, CrawlError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(checkpoint_error(path, e)),
    };
    let value = serde_json::from_reader(BufReader::new(file))?;
    Ok(Some(value))
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), CrawlError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| checkpoint_error(path, e))?;
    {
        let mut writer = BufWriter::new(&mut tmp);
        serde_json::to_writer(&mut writer, value)?;
        writer.flush().map_err(|e| checkpoint_error(path, e))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| checkpoint_error(path, e))?;
    tmp.persist(path)
        .map_err(|e| checkpoint_error(path, e.error))?;
    Ok(())
}
