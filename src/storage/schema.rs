//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Douban-Ripple database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Discovered people
CREATE TABLE IF NOT EXISTS entities (
    identity INTEGER PRIMARY KEY,
    textual_identity TEXT,
    location TEXT,
    display_name TEXT,
    icon_url TEXT,
    homepage_url TEXT,
    description TEXT,
    first_seen TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entities_textual ON entities(textual_identity);

-- Symmetric friendships, stored once per pair
CREATE TABLE IF NOT EXISTS mutual_relations (
    identity_a INTEGER NOT NULL,
    identity_b INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_mutual_a ON mutual_relations(identity_a);
CREATE INDEX IF NOT EXISTS idx_mutual_b ON mutual_relations(identity_b);

-- "from follows to"
CREATE TABLE IF NOT EXISTS directed_relations (
    from_identity INTEGER NOT NULL,
    to_identity INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_directed_from ON directed_relations(from_identity);
CREATE INDEX IF NOT EXISTS idx_directed_to ON directed_relations(to_identity);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
