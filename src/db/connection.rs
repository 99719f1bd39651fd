use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

/// Schema revision recorded in `PRAGMA user_version` once seeding has run.
const SCHEMA_VERSION: i64 = 1;

/// Open (or create) the catalog database at `path`, run lazy migrations, and
/// return a live connection.
pub fn open_catalog(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context("failed to create data directory")?;
        }
    }

    let conn = Connection::open(path).context("failed to open SQLite database")?;
    ensure_schema(&conn)?;
    info!(path = %path.display(), "opened catalog database");
    Ok(conn)
}

/// Fresh database that lives only as long as the connection. Tests and
/// throwaway sessions use this.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// Create every table and index if missing. The function also toggles
/// `PRAGMA foreign_keys = ON` so cascade and restrict rules behave the same
/// during tests and production runs.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("failed to enable foreign keys")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS birds (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL CHECK (length(name) <= 100),
            species INTEGER NOT NULL CHECK (species BETWEEN 0 AND 6),
            info TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )
    .context("failed to create birds table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS bird_details (
            bird_id INTEGER PRIMARY KEY,
            info TEXT NOT NULL,
            description TEXT,
            average_length REAL CHECK (average_length IS NULL OR average_length BETWEEN 0 AND 100),
            average_weight REAL CHECK (average_weight IS NULL OR average_weight BETWEEN 0 AND 10000),
            diet TEXT,
            behavior TEXT,
            is_endangered INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(bird_id) REFERENCES birds(id) ON DELETE CASCADE
        )",
        [],
    )
    .context("failed to create bird_details table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS locations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            latitude REAL NOT NULL CHECK (latitude BETWEEN -90 AND 90),
            longitude REAL NOT NULL CHECK (longitude BETWEEN -180 AND 180),
            country TEXT,
            region TEXT,
            description TEXT,
            UNIQUE (latitude, longitude)
        )",
        [],
    )
    .context("failed to create locations table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS observations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bird_id INTEGER NOT NULL,
            location_id INTEGER NOT NULL,
            observation_date TEXT NOT NULL,
            count INTEGER NOT NULL DEFAULT 1 CHECK (count >= 1),
            notes TEXT,
            observer_name TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(bird_id) REFERENCES birds(id) ON DELETE CASCADE,
            FOREIGN KEY(location_id) REFERENCES locations(id) ON DELETE RESTRICT
        )",
        [],
    )
    .context("failed to create observations table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS bird_habitats (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bird_id INTEGER NOT NULL,
            location_id INTEGER NOT NULL,
            season TEXT,
            is_primary_habitat INTEGER NOT NULL DEFAULT 0,
            UNIQUE (bird_id, location_id, season),
            FOREIGN KEY(bird_id) REFERENCES birds(id) ON DELETE CASCADE,
            FOREIGN KEY(location_id) REFERENCES locations(id) ON DELETE CASCADE
        )",
        [],
    )
    .context("failed to create bird_habitats table")?;

    seed_once(conn)
}

/// Insert the starter locations the first time a database is created. The
/// `user_version` marker keeps deleted seed rows from reappearing on restart.
fn seed_once(conn: &Connection) -> Result<()> {
    let version: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .context("failed to read schema version")?;
    if version >= SCHEMA_VERSION {
        return Ok(());
    }

    conn.execute(
        "INSERT OR IGNORE INTO locations (id, name, latitude, longitude, country, region)
         VALUES (1, 'Central Park', 40.7829, -73.9654, 'USA', 'New York'),
                (2, 'Yellowstone National Park', 44.4280, -110.5885, 'USA', 'Wyoming')",
        [],
    )
    .context("failed to seed locations")?;

    conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))
        .context("failed to record schema version")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_seeds_two_locations_once() {
        let conn = open_in_memory().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM locations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);

        conn.execute("DELETE FROM locations WHERE id = 1", []).unwrap();
        ensure_schema(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM locations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn open_catalog_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("birds.sqlite");
        open_catalog(&path).unwrap();
        assert!(path.exists());
    }
}
