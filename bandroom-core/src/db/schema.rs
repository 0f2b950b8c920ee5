//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.
//!
//! Foreign keys are deliberately NOT declared in the DDL: referential
//! integrity is enforced by the validation layer on writes, and parent rows
//! stay deletable even while children reference them (orphaning is accepted
//! domain behavior). The one store-level integrity rule is the unique index
//! on (band_id, instrument_id), which backs the application-level duplicate
//! check.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Initial schema
    r#"
    -- ============================================
    -- Reference data
    -- ============================================

    CREATE TABLE IF NOT EXISTS artists (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        name       TEXT NOT NULL UNIQUE,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS genres (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        name       TEXT NOT NULL UNIQUE,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS instruments (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        name       TEXT NOT NULL UNIQUE,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS users (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        uuid        TEXT NOT NULL UNIQUE,
        name        TEXT NOT NULL,
        email       TEXT NOT NULL UNIQUE,
        description TEXT,
        created_at  DATETIME NOT NULL,
        updated_at  DATETIME NOT NULL
    );

    -- ============================================
    -- Scheduling
    -- ============================================

    CREATE TABLE IF NOT EXISTS sessions (
        id                INTEGER PRIMARY KEY AUTOINCREMENT,
        started_at        DATE NOT NULL,
        showcased_at      DATETIME NOT NULL,
        showcase_location TEXT,
        created_at        DATETIME NOT NULL,
        updated_at        DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_sessions_showcase_location
        ON sessions(showcase_location);

    CREATE TABLE IF NOT EXISTS bands (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id     INTEGER NOT NULL,
        artist_id      INTEGER,
        genre_id       INTEGER,
        name           TEXT,
        image_url      TEXT,
        day_of_week    TEXT,
        starts_at      TIME,
        ends_at        TIME,
        price          REAL,
        duration_weeks INTEGER,
        created_at     DATETIME NOT NULL,
        updated_at     DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_bands_session ON bands(session_id);
    CREATE INDEX IF NOT EXISTS idx_bands_artist ON bands(artist_id);
    CREATE INDEX IF NOT EXISTS idx_bands_genre ON bands(genre_id);
    CREATE INDEX IF NOT EXISTS idx_bands_name ON bands(name);

    CREATE TABLE IF NOT EXISTS band_instruments (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        band_id       INTEGER NOT NULL,
        instrument_id INTEGER NOT NULL,
        user_id       INTEGER,
        created_at    DATETIME NOT NULL,
        updated_at    DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_band_instruments_band ON band_instruments(band_id);
    CREATE INDEX IF NOT EXISTS idx_band_instruments_instrument ON band_instruments(instrument_id);
    CREATE INDEX IF NOT EXISTS idx_band_instruments_user ON band_instruments(user_id);
    "#,
    // Version 2: Default line-up flag + store-level duplicate guard
    r#"
    ALTER TABLE instruments ADD COLUMN is_band_default INTEGER NOT NULL DEFAULT 0;

    -- Source of truth for the (band_id, instrument_id) pair; the validation
    -- layer checks first to produce a friendlier error.
    CREATE UNIQUE INDEX IF NOT EXISTS idx_band_instruments_pair
        ON band_instruments(band_id, instrument_id);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
