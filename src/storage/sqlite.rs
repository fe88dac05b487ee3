//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::graph::{Entity, EntityRef, Relation, RelationKind};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::CrawlError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::collections::HashSet;
use std::path::Path;

const ENTITY_COLUMNS: &str = "identity, textual_identity, location, display_name, icon_url, \
     homepage_url, description, first_seen";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(CrawlError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, CrawlError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        // Initialize schema
        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, CrawlError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn query_ids(&self, sql: &str, id: i64) -> StorageResult<HashSet<i64>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let ids = stmt
            .query_map(params![id], |row| row.get(0))?
            .collect::<Result<HashSet<i64>, _>>()?;
        Ok(ids)
    }
}

/// Raw column values of an `entities` row
struct EntityRow {
    id: i64,
    uid_text: Option<String>,
    location: Option<String>,
    display_name: Option<String>,
    icon_url: Option<String>,
    homepage_url: Option<String>,
    description: Option<String>,
    first_seen: String,
}

impl EntityRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            uid_text: row.get(1)?,
            location: row.get(2)?,
            display_name: row.get(3)?,
            icon_url: row.get(4)?,
            homepage_url: row.get(5)?,
            description: row.get(6)?,
            first_seen: row.get(7)?,
        })
    }

    fn into_entity(self) -> StorageResult<Entity> {
        let first_seen = self
            .first_seen
            .parse::<DateTime<Utc>>()
            .map_err(|e| StorageError::CorruptRow {
                id: self.id,
                message: format!("bad first_seen '{}': {}", self.first_seen, e),
            })?;

        Ok(Entity {
            id: self.id,
            uid_text: self.uid_text,
            location: self.location,
            display_name: self.display_name,
            icon_url: self.icon_url,
            homepage_url: self.homepage_url,
            description: self.description,
            first_seen,
        })
    }
}

fn insert_entity(tx: &Transaction<'_>, entity: &Entity) -> StorageResult<bool> {
    let changed = tx.execute(
        &format!(
            "INSERT OR IGNORE INTO entities ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            ENTITY_COLUMNS
        ),
        params![
            entity.id,
            entity.uid_text,
            entity.location,
            entity.display_name,
            entity.icon_url,
            entity.homepage_url,
            entity.description,
            entity.first_seen.to_rfc3339(),
        ],
    )?;
    Ok(changed > 0)
}

fn relation_exists(tx: &Transaction<'_>, relation: &Relation) -> StorageResult<bool> {
    let count: i64 = match relation.kind {
        RelationKind::Mutual => tx.query_row(
            "SELECT COUNT(*) FROM mutual_relations
             WHERE (identity_a = ?1 AND identity_b = ?2) OR (identity_a = ?2 AND identity_b = ?1)",
            params![relation.from, relation.to],
            |row| row.get(0),
        )?,
        RelationKind::Directed => tx.query_row(
            "SELECT COUNT(*) FROM directed_relations WHERE from_identity = ?1 AND to_identity = ?2",
            params![relation.from, relation.to],
            |row| row.get(0),
        )?,
    };
    Ok(count > 0)
}

fn insert_relation(tx: &Transaction<'_>, relation: &Relation) -> StorageResult<()> {
    let sql = match relation.kind {
        RelationKind::Mutual => "INSERT INTO mutual_relations (identity_a, identity_b) VALUES (?1, ?2)",
        RelationKind::Directed => {
            "INSERT INTO directed_relations (from_identity, to_identity) VALUES (?1, ?2)"
        }
    };
    tx.execute(sql, params![relation.from, relation.to])?;
    Ok(())
}

impl Storage for SqliteStorage {
    // ===== Entities =====

    fn get_entity(&self, entity: &EntityRef) -> StorageResult<Option<Entity>> {
        let row = match entity {
            EntityRef::Id(id) => self
                .conn
                .query_row(
                    &format!(
                        "SELECT {} FROM entities WHERE identity = ?1 OR textual_identity = ?2
                         ORDER BY identity = ?1 DESC LIMIT 1",
                        ENTITY_COLUMNS
                    ),
                    params![id, id.to_string()],
                    EntityRow::from_row,
                )
                .optional()?,
            EntityRef::Name(name) => self
                .conn
                .query_row(
                    &format!(
                        "SELECT {} FROM entities WHERE textual_identity = ?1 LIMIT 1",
                        ENTITY_COLUMNS
                    ),
                    params![name],
                    EntityRow::from_row,
                )
                .optional()?,
        };

        row.map(EntityRow::into_entity).transpose()
    }

    fn put_entity_if_absent(&mut self, entity: &Entity) -> StorageResult<bool> {
        let tx = self.conn.transaction()?;
        let inserted = insert_entity(&tx, entity)?;
        tx.commit()?;
        Ok(inserted)
    }

    fn put_entities_if_absent(&mut self, entities: &[Entity]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        for entity in entities {
            if insert_entity(&tx, entity)? {
                inserted += 1;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn count_entities(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn all_entity_ids(&self) -> StorageResult<HashSet<i64>> {
        let mut stmt = self.conn.prepare("SELECT identity FROM entities")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<HashSet<i64>, _>>()?;
        Ok(ids)
    }

    // ===== Relations =====

    fn put_relations_if_absent(&mut self, relations: &[Relation]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        for relation in relations {
            if !relation_exists(&tx, relation)? {
                insert_relation(&tx, relation)?;
                inserted += 1;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn list_relations_of(&self, id: i64, kind: RelationKind) -> StorageResult<HashSet<i64>> {
        match kind {
            RelationKind::Mutual => self.query_ids(
                "SELECT identity_b FROM mutual_relations WHERE identity_a = ?1",
                id,
            ),
            RelationKind::Directed => self.query_ids(
                "SELECT to_identity FROM directed_relations WHERE from_identity = ?1",
                id,
            ),
        }
    }

    fn list_incoming_relations(
        &self,
        id: i64,
        kind: RelationKind,
    ) -> StorageResult<HashSet<i64>> {
        match kind {
            RelationKind::Mutual => self.query_ids(
                "SELECT identity_a FROM mutual_relations WHERE identity_b = ?1",
                id,
            ),
            RelationKind::Directed => self.query_ids(
                "SELECT from_identity FROM directed_relations WHERE to_identity = ?1",
                id,
            ),
        }
    }

    fn count_relations(&self, kind: RelationKind) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", kind.table()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
