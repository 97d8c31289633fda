//! Database schema for the SQLite sink

/// SQL schema for the links table
pub const SCHEMA_SQL: &str = r#"
-- One row per link or page-visit marker
CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date INTEGER NOT NULL,
    source_host TEXT NOT NULL,
    secure INTEGER NOT NULL,
    source TEXT NOT NULL,
    link TEXT NOT NULL,
    fragment TEXT NOT NULL,
    tag TEXT NOT NULL,
    extras TEXT NOT NULL,
    data_origin TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_links_source_host ON links(source_host);
"#;

/// Current schema version, stored in `PRAGMA user_version`
pub const SCHEMA_VERSION: u32 = 1;

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
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

/// Reads the schema version of an existing database
pub fn get_schema_version(conn: &rusqlite::Connection) -> Result<u32, rusqlite::Error> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}
