//! Social graph data model
//!
//! This module defines the nodes and edges the crawler discovers:
//! - `Entity`: a stored person record (write-once)
//! - `EntityRecord`: the same record as decoded from the API, every field optional
//! - `EntityRef`: an identity awaiting processing (numeric id or textual uid)
//! - `Relation` / `RelationKind`: mutual (friend) and directed (follow) edges

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A discovered person in the social graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    /// Numeric identity (primary key)
    pub id: i64,

    /// Textual identity, usable in API paths before the numeric id is known
    pub uid_text: Option<String>,

    /// Free-text location
    pub location: Option<String>,

    /// Display name (nickname)
    pub display_name: Option<String>,

    /// Avatar URL
    pub icon_url: Option<String>,

    /// Personal homepage URL
    pub homepage_url: Option<String>,

    /// Self description
    pub description: Option<String>,

    /// When this entity was first stored
    pub first_seen: DateTime<Utc>,
}

/// An entity record as decoded from an API response
///
/// Any field may be missing from a malformed record; such fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityRecord {
    pub id: Option<i64>,
    pub uid_text: Option<String>,
    pub location: Option<String>,
    pub display_name: Option<String>,
    pub icon_url: Option<String>,
    pub homepage_url: Option<String>,
    pub description: Option<String>,
}

impl EntityRecord {
    /// Converts the record into a storable entity
    ///
    /// Returns `None` if the record carries no numeric identity.
    pub fn into_entity(self, first_seen: DateTime<Utc>) -> Option<Entity> {
        Some(Entity {
            id: self.id?,
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

/// Identity of an entity awaiting processing
///
/// Serialized untagged, so a checkpoint holds plain numbers and strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityRef {
    /// Numeric identity
    Id(i64),
    /// Textual identity, resolved to a numeric id on first lookup
    Name(String),
}

impl EntityRef {
    /// Parses a seed value: all-digit strings become numeric ids
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed.parse::<i64>() {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Name(trimmed.to_string()),
        }
    }

    /// Returns the numeric id if known
    pub fn id(&self) -> Option<i64> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Name(_) => None,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Name(name) => write!(f, "{}", name),
        }
    }
}

/// Kind of relation between two entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// Symmetric friendship, stored once regardless of direction
    Mutual,
    /// Asymmetric "A follows B"
    Directed,
}

impl RelationKind {
    /// Both kinds, in the order the crawler resolves them
    pub const ALL: [RelationKind; 2] = [RelationKind::Mutual, RelationKind::Directed];

    /// Name of the relation list in the remote API
    pub fn api_path(&self) -> &'static str {
        match self {
            Self::Mutual => "friends",
            Self::Directed => "contacts",
        }
    }

    /// Name of the table storing this kind of relation
    pub fn table(&self) -> &'static str {
        match self {
            Self::Mutual => "mutual_relations",
            Self::Directed => "directed_relations",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mutual => write!(f, "mutual"),
            Self::Directed => write!(f, "directed"),
        }
    }
}

/// An edge between two entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Relation {
    pub kind: RelationKind,
    pub from: i64,
    pub to: i64,
}

impl Relation {
    pub fn mutual(a: i64, b: i64) -> Self {
        Self {
            kind: RelationKind::Mutual,
            from: a,
            to: b,
        }
    }

    pub fn directed(from: i64, to: i64) -> Self {
        Self {
            kind: RelationKind::Directed,
            from,
            to,
        }
    }
}
