//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::graph::{Entity, EntityRef, Relation, RelationKind};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Corrupt row for entity {id}: {message}")]
    CorruptRow { id: i64, message: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Entities and relations are insert-if-absent: nothing stored is ever
/// updated or removed, so every write may be repeated safely.
pub trait Storage {
    // ===== Entities =====

    /// Looks up an entity by numeric identity or textual identity
    ///
    /// A numeric reference also matches an entity whose textual identity is
    /// the same digits.
    fn get_entity(&self, entity: &EntityRef) -> StorageResult<Option<Entity>>;

    /// Inserts an entity unless one with the same identity exists
    ///
    /// # Returns
    ///
    /// `true` if the entity was inserted, `false` if it was already stored
    fn put_entity_if_absent(&mut self, entity: &Entity) -> StorageResult<bool>;

    /// Inserts each absent entity in a single transaction
    ///
    /// # Returns
    ///
    /// The number of entities inserted
    fn put_entities_if_absent(&mut self, entities: &[Entity]) -> StorageResult<usize>;

    /// Counts stored entities
    fn count_entities(&self) -> StorageResult<u64>;

    /// Returns every stored entity identity
    fn all_entity_ids(&self) -> StorageResult<HashSet<i64>>;

    // ===== Relations =====

    /// Inserts each relation unless it is already stored
    ///
    /// Mutual relations are checked in both directions, directed relations
    /// in their exact direction only. Each edge is checked individually; the
    /// inserts share one transaction.
    ///
    /// # Returns
    ///
    /// The number of relations inserted
    fn put_relations_if_absent(&mut self, relations: &[Relation]) -> StorageResult<usize>;

    /// Returns the targets of stored edges leaving `id`
    ///
    /// For mutual relations this is the side stored as `identity_a`. An empty
    /// set means either no edges exist or none have been fetched yet.
    fn list_relations_of(&self, id: i64, kind: RelationKind) -> StorageResult<HashSet<i64>>;

    /// Returns the sources of stored edges arriving at `id`
    ///
    /// For directed relations these are the followers of `id`.
    fn list_incoming_relations(
        &self,
        id: i64,
        kind: RelationKind,
    ) -> StorageResult<HashSet<i64>>;

    /// Counts stored relations of one kind
    fn count_relations(&self, kind: RelationKind) -> StorageResult<u64>;
}
