//! Database repository layer
//!
//! Query and write operations for all entity types. Writes that carry
//! foreign keys run through the validation rules in [`crate::db::validate`]
//! inside the same transaction as the write itself.

use crate::db::validate::{self, Attempt};
use crate::error::{Error, Result, ValidationError};
use crate::types::*;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::Mutex;
use uuid::Uuid;

/// Pagination/search arguments for list operations.
///
/// `search`, when non-empty, is used verbatim as a SQL LIKE pattern against
/// the entity's name-like column (callers supply their own wildcards).
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub limit: i64,
    pub offset: i64,
    pub search: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
            search: None,
        }
    }
}

impl ListQuery {
    /// Convenience constructor for a search-only query
    pub fn search(pattern: impl Into<String>) -> Self {
        Self {
            search: Some(pattern.into()),
            ..Default::default()
        }
    }
}

/// A page of rows plus the total count of rows matching the query
/// (the count ignores limit/offset).
#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub rows: Vec<T>,
    pub total_count: i64,
}

/// A band joined with its session dates and artist/genre names.
///
/// Pre-joined to avoid N+1 lookups when rendering a band page.
#[derive(Debug, Clone)]
pub struct BandDetail {
    pub band: Band,
    pub session_started_at: NaiveDate,
    pub session_showcased_at: DateTime<Utc>,
    pub artist_name: Option<String>,
    pub genre_name: Option<String>,
}

/// An instrument slot joined with instrument and participant names
#[derive(Debug, Clone)]
pub struct BandInstrumentDetail {
    pub assignment: BandInstrument,
    pub instrument_name: String,
    pub user_name: Option<String>,
}

/// Database handle owning the SQLite connection.
///
/// Constructed explicitly and passed to callers; there is no ambient global
/// connection. All validation checks and the writes they guard share the
/// single connection, so a check and its write always observe one snapshot.
pub struct Database {
    conn: Mutex<Connection>,
    accumulate_errors: bool,
}

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_default()
}

fn parse_time(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M:%S").unwrap_or_default()
}

/// Store-enforced constraint failures (unique name/uuid/email, NOT NULL)
/// surface as recoverable validation errors; everything else stays an
/// infrastructure error.
fn map_constraint(err: rusqlite::Error) -> Error {
    match &err {
        rusqlite::Error::SqliteFailure(e, msg)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            let detail = msg
                .clone()
                .unwrap_or_else(|| "constraint violation".to_string());
            ValidationError::Constraint(detail).into()
        }
        _ => Error::Database(err),
    }
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            accumulate_errors: false,
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
            accumulate_errors: false,
        })
    }

    /// Switch the validation engine from first-failure to collect-all mode
    pub fn accumulate_errors(mut self, accumulate: bool) -> Self {
        self.accumulate_errors = accumulate;
        self
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    // ============================================
    // Generic listing
    // ============================================

    fn list_rows<T>(
        conn: &Connection,
        table: Table,
        query: &ListQuery,
        map: fn(&Row) -> rusqlite::Result<T>,
    ) -> Result<Paged<T>> {
        let pattern = query
            .search
            .as_deref()
            .filter(|s| !s.is_empty())
            .and_then(|s| table.search_column().map(|col| (col, s)));

        let where_clause = match pattern {
            Some((col, _)) => format!(" WHERE {} LIKE ?1", col),
            None => String::new(),
        };
        let count_sql = format!("SELECT COUNT(*) FROM {}{}", table.as_str(), where_clause);
        let rows_sql = format!(
            "SELECT * FROM {}{} ORDER BY id LIMIT {} OFFSET {}",
            table.as_str(),
            where_clause,
            query.limit,
            query.offset
        );

        if let Some((_, like)) = pattern {
            let total_count: i64 = conn.query_row(&count_sql, params![like], |r| r.get(0))?;
            let mut stmt = conn.prepare(&rows_sql)?;
            let rows = stmt
                .query_map(params![like], map)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(Paged { rows, total_count })
        } else {
            let total_count: i64 = conn.query_row(&count_sql, [], |r| r.get(0))?;
            let mut stmt = conn.prepare(&rows_sql)?;
            let rows = stmt
                .query_map([], map)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(Paged { rows, total_count })
        }
    }

    /// Column-projected listing: rows come back as JSON objects holding only
    /// the requested columns (all columns when `columns` is empty).
    ///
    /// Column names are checked against the table's column list before any
    /// SQL is built.
    pub fn select_columns(
        &self,
        table: Table,
        columns: &[String],
        query: &ListQuery,
    ) -> Result<Paged<serde_json::Value>> {
        let cols: Vec<&str> = if columns.is_empty() {
            table.columns().to_vec()
        } else {
            for col in columns {
                if !table.columns().contains(&col.as_str()) {
                    return Err(Error::InvalidQuery(format!(
                        "unknown column {} on {}",
                        col, table
                    )));
                }
            }
            columns.iter().map(|c| c.as_str()).collect()
        };

        let conn = self.conn.lock().unwrap();

        let pattern = query
            .search
            .as_deref()
            .filter(|s| !s.is_empty())
            .and_then(|s| table.search_column().map(|col| (col, s)));

        let where_clause = match pattern {
            Some((col, _)) => format!(" WHERE {} LIKE ?1", col),
            None => String::new(),
        };
        let count_sql = format!("SELECT COUNT(*) FROM {}{}", table.as_str(), where_clause);
        let rows_sql = format!(
            "SELECT {} FROM {}{} ORDER BY id LIMIT {} OFFSET {}",
            cols.join(", "),
            table.as_str(),
            where_clause,
            query.limit,
            query.offset
        );

        let map_row = |row: &Row| -> rusqlite::Result<serde_json::Value> {
            let mut obj = serde_json::Map::new();
            for (i, col) in cols.iter().enumerate() {
                let value = match row.get_ref(i)? {
                    ValueRef::Null => serde_json::Value::Null,
                    ValueRef::Integer(n) => serde_json::Value::from(n),
                    ValueRef::Real(x) => serde_json::Value::from(x),
                    ValueRef::Text(t) => {
                        serde_json::Value::from(String::from_utf8_lossy(t).into_owned())
                    }
                    ValueRef::Blob(_) => serde_json::Value::Null,
                };
                obj.insert((*col).to_string(), value);
            }
            Ok(serde_json::Value::Object(obj))
        };

        if let Some((_, like)) = pattern {
            let total_count: i64 = conn.query_row(&count_sql, params![like], |r| r.get(0))?;
            let mut stmt = conn.prepare(&rows_sql)?;
            let rows = stmt
                .query_map(params![like], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(Paged { rows, total_count })
        } else {
            let total_count: i64 = conn.query_row(&count_sql, [], |r| r.get(0))?;
            let mut stmt = conn.prepare(&rows_sql)?;
            let rows = stmt
                .query_map([], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(Paged { rows, total_count })
        }
    }

    // ============================================
    // Artist operations
    // ============================================

    /// List artists with pagination and optional name search
    pub fn list_artists(&self, query: &ListQuery) -> Result<Paged<Artist>> {
        let conn = self.conn.lock().unwrap();
        Self::list_rows(&conn, Table::Artists, query, Self::row_to_artist)
    }

    /// Get an artist by ID
    pub fn get_artist(&self, id: i64) -> Result<Option<Artist>> {
        let conn = self.conn.lock().unwrap();
        Self::artist_by_id(&conn, id)
    }

    /// Get an artist by name
    pub fn get_artist_by_name(&self, name: &str) -> Result<Option<Artist>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM artists WHERE name = ?",
            [name],
            Self::row_to_artist,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Create an artist; a colliding name surfaces as a validation error
    pub fn create_artist(&self, attrs: &ArtistAttrs) -> Result<Artist> {
        let conn = self.conn.lock().unwrap();
        let Some(name) = attrs.name.as_deref() else {
            return Err(ValidationError::NotNull {
                entity: "Artist",
                field: "name",
            }
            .into());
        };

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO artists (name, created_at, updated_at) VALUES (?1, ?2, ?2)",
            params![name, now],
        )
        .map_err(map_constraint)?;

        Self::artist_by_id(&conn, conn.last_insert_rowid())?
            .ok_or(Error::Database(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Partial update; returns the number of affected rows (0 if absent)
    pub fn update_artist(&self, id: i64, attrs: &ArtistAttrs) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let Some(existing) = Self::artist_by_id(&conn, id)? else {
            return Ok(0);
        };

        let name = attrs.name.clone().unwrap_or(existing.name);
        let affected = conn
            .execute(
                "UPDATE artists SET name = ?1, updated_at = ?2 WHERE id = ?3",
                params![name, Utc::now().to_rfc3339(), id],
            )
            .map_err(map_constraint)?;
        Ok(affected)
    }

    /// Hard delete; no cascade validation of referencing bands
    pub fn delete_artist(&self, id: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.execute("DELETE FROM artists WHERE id = ?1", [id])?)
    }

    fn artist_by_id(conn: &Connection, id: i64) -> Result<Option<Artist>> {
        conn.query_row("SELECT * FROM artists WHERE id = ?", [id], Self::row_to_artist)
            .optional()
            .map_err(Error::from)
    }

    fn row_to_artist(row: &Row) -> rusqlite::Result<Artist> {
        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;
        Ok(Artist {
            id: row.get("id")?,
            name: row.get("name")?,
            created_at: parse_dt(&created_at),
            updated_at: parse_dt(&updated_at),
        })
    }

    // ============================================
    // Genre operations
    // ============================================

    /// List genres with pagination and optional name search
    pub fn list_genres(&self, query: &ListQuery) -> Result<Paged<Genre>> {
        let conn = self.conn.lock().unwrap();
        Self::list_rows(&conn, Table::Genres, query, Self::row_to_genre)
    }

    /// Get a genre by ID
    pub fn get_genre(&self, id: i64) -> Result<Option<Genre>> {
        let conn = self.conn.lock().unwrap();
        Self::genre_by_id(&conn, id)
    }

    /// Get a genre by name
    pub fn get_genre_by_name(&self, name: &str) -> Result<Option<Genre>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM genres WHERE name = ?",
            [name],
            Self::row_to_genre,
        )
        .optional()
        .map_err(Error::from)
    }

    pub fn create_genre(&self, attrs: &GenreAttrs) -> Result<Genre> {
        let conn = self.conn.lock().unwrap();
        let Some(name) = attrs.name.as_deref() else {
            return Err(ValidationError::NotNull {
                entity: "Genre",
                field: "name",
            }
            .into());
        };

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO genres (name, created_at, updated_at) VALUES (?1, ?2, ?2)",
            params![name, now],
        )
        .map_err(map_constraint)?;

        Self::genre_by_id(&conn, conn.last_insert_rowid())?
            .ok_or(Error::Database(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn update_genre(&self, id: i64, attrs: &GenreAttrs) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let Some(existing) = Self::genre_by_id(&conn, id)? else {
            return Ok(0);
        };

        let name = attrs.name.clone().unwrap_or(existing.name);
        let affected = conn
            .execute(
                "UPDATE genres SET name = ?1, updated_at = ?2 WHERE id = ?3",
                params![name, Utc::now().to_rfc3339(), id],
            )
            .map_err(map_constraint)?;
        Ok(affected)
    }

    pub fn delete_genre(&self, id: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.execute("DELETE FROM genres WHERE id = ?1", [id])?)
    }

    fn genre_by_id(conn: &Connection, id: i64) -> Result<Option<Genre>> {
        conn.query_row("SELECT * FROM genres WHERE id = ?", [id], Self::row_to_genre)
            .optional()
            .map_err(Error::from)
    }

    fn row_to_genre(row: &Row) -> rusqlite::Result<Genre> {
        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;
        Ok(Genre {
            id: row.get("id")?,
            name: row.get("name")?,
            created_at: parse_dt(&created_at),
            updated_at: parse_dt(&updated_at),
        })
    }

    // ============================================
    // Instrument operations
    // ============================================

    /// List instruments with pagination and optional name search
    pub fn list_instruments(&self, query: &ListQuery) -> Result<Paged<Instrument>> {
        let conn = self.conn.lock().unwrap();
        Self::list_rows(&conn, Table::Instruments, query, Self::row_to_instrument)
    }

    /// Get an instrument by ID
    pub fn get_instrument(&self, id: i64) -> Result<Option<Instrument>> {
        let conn = self.conn.lock().unwrap();
        Self::instrument_by_id(&conn, id)
    }

    /// Get an instrument by name
    pub fn get_instrument_by_name(&self, name: &str) -> Result<Option<Instrument>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM instruments WHERE name = ?",
            [name],
            Self::row_to_instrument,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Instruments flagged as part of every new band's default line-up
    pub fn list_default_instruments(&self) -> Result<Vec<Instrument>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT * FROM instruments WHERE is_band_default = 1 ORDER BY id")?;
        let instruments = stmt
            .query_map([], Self::row_to_instrument)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(instruments)
    }

    pub fn create_instrument(&self, attrs: &InstrumentAttrs) -> Result<Instrument> {
        let conn = self.conn.lock().unwrap();
        let Some(name) = attrs.name.as_deref() else {
            return Err(ValidationError::NotNull {
                entity: "Instrument",
                field: "name",
            }
            .into());
        };

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO instruments (name, is_band_default, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            params![name, attrs.is_band_default.unwrap_or(false), now],
        )
        .map_err(map_constraint)?;

        Self::instrument_by_id(&conn, conn.last_insert_rowid())?
            .ok_or(Error::Database(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn update_instrument(&self, id: i64, attrs: &InstrumentAttrs) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let Some(existing) = Self::instrument_by_id(&conn, id)? else {
            return Ok(0);
        };

        let name = attrs.name.clone().unwrap_or(existing.name);
        let is_band_default = attrs.is_band_default.unwrap_or(existing.is_band_default);
        let affected = conn
            .execute(
                "UPDATE instruments SET name = ?1, is_band_default = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![name, is_band_default, Utc::now().to_rfc3339(), id],
            )
            .map_err(map_constraint)?;
        Ok(affected)
    }

    pub fn delete_instrument(&self, id: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.execute("DELETE FROM instruments WHERE id = ?1", [id])?)
    }

    fn instrument_by_id(conn: &Connection, id: i64) -> Result<Option<Instrument>> {
        conn.query_row(
            "SELECT * FROM instruments WHERE id = ?",
            [id],
            Self::row_to_instrument,
        )
        .optional()
        .map_err(Error::from)
    }

    fn row_to_instrument(row: &Row) -> rusqlite::Result<Instrument> {
        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;
        Ok(Instrument {
            id: row.get("id")?,
            name: row.get("name")?,
            is_band_default: row.get("is_band_default")?,
            created_at: parse_dt(&created_at),
            updated_at: parse_dt(&updated_at),
        })
    }

    // ============================================
    // User operations
    // ============================================

    /// List users with pagination and optional name search
    pub fn list_users(&self, query: &ListQuery) -> Result<Paged<User>> {
        let conn = self.conn.lock().unwrap();
        Self::list_rows(&conn, Table::Users, query, Self::row_to_user)
    }

    /// Get a user by ID
    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        Self::user_by_id(&conn, id)
    }

    /// Get a user by email
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM users WHERE email = ?",
            [email],
            Self::row_to_user,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Get a user by external uuid
    pub fn get_user_by_uuid(&self, uuid: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM users WHERE uuid = ?",
            [uuid],
            Self::row_to_user,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Create a user. A uuid is generated when not supplied; duplicate
    /// uuid/email surfaces as a validation error.
    pub fn create_user(&self, attrs: &UserAttrs) -> Result<User> {
        let conn = self.conn.lock().unwrap();
        let Some(name) = attrs.name.as_deref() else {
            return Err(ValidationError::NotNull {
                entity: "User",
                field: "name",
            }
            .into());
        };
        let Some(email) = attrs.email.as_deref() else {
            return Err(ValidationError::NotNull {
                entity: "User",
                field: "email",
            }
            .into());
        };
        let uuid = attrs
            .uuid
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO users (uuid, name, email, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![uuid, name, email, attrs.description, now],
        )
        .map_err(map_constraint)?;

        Self::user_by_id(&conn, conn.last_insert_rowid())?
            .ok_or(Error::Database(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn update_user(&self, id: i64, attrs: &UserAttrs) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let Some(existing) = Self::user_by_id(&conn, id)? else {
            return Ok(0);
        };

        let uuid = attrs.uuid.clone().unwrap_or(existing.uuid);
        let name = attrs.name.clone().unwrap_or(existing.name);
        let email = attrs.email.clone().unwrap_or(existing.email);
        let description = attrs.description.clone().or(existing.description);
        let affected = conn
            .execute(
                "UPDATE users SET uuid = ?1, name = ?2, email = ?3, description = ?4,
                 updated_at = ?5 WHERE id = ?6",
                params![uuid, name, email, description, Utc::now().to_rfc3339(), id],
            )
            .map_err(map_constraint)?;
        Ok(affected)
    }

    pub fn delete_user(&self, id: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id])?)
    }

    fn user_by_id(conn: &Connection, id: i64) -> Result<Option<User>> {
        conn.query_row("SELECT * FROM users WHERE id = ?", [id], Self::row_to_user)
            .optional()
            .map_err(Error::from)
    }

    fn row_to_user(row: &Row) -> rusqlite::Result<User> {
        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;
        Ok(User {
            id: row.get("id")?,
            uuid: row.get("uuid")?,
            name: row.get("name")?,
            email: row.get("email")?,
            description: row.get("description")?,
            created_at: parse_dt(&created_at),
            updated_at: parse_dt(&updated_at),
        })
    }

    // ============================================
    // Session operations
    // ============================================

    /// List sessions; the search pattern matches the showcase location
    pub fn list_sessions(&self, query: &ListQuery) -> Result<Paged<Session>> {
        let conn = self.conn.lock().unwrap();
        Self::list_rows(&conn, Table::Sessions, query, Self::row_to_session)
    }

    /// Get a session by ID
    pub fn get_session(&self, id: i64) -> Result<Option<Session>> {
        let conn = self.conn.lock().unwrap();
        Self::session_by_id(&conn, id)
    }

    pub fn create_session(&self, attrs: &SessionAttrs) -> Result<Session> {
        let conn = self.conn.lock().unwrap();
        let Some(started_at) = attrs.started_at else {
            return Err(ValidationError::NotNull {
                entity: "Session",
                field: "started_at",
            }
            .into());
        };
        let Some(showcased_at) = attrs.showcased_at else {
            return Err(ValidationError::NotNull {
                entity: "Session",
                field: "showcased_at",
            }
            .into());
        };

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO sessions (started_at, showcased_at, showcase_location, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![
                started_at.format("%Y-%m-%d").to_string(),
                showcased_at.to_rfc3339(),
                attrs.showcase_location,
                now
            ],
        )
        .map_err(map_constraint)?;

        Self::session_by_id(&conn, conn.last_insert_rowid())?
            .ok_or(Error::Database(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn update_session(&self, id: i64, attrs: &SessionAttrs) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let Some(existing) = Self::session_by_id(&conn, id)? else {
            return Ok(0);
        };

        let started_at = attrs.started_at.unwrap_or(existing.started_at);
        let showcased_at = attrs.showcased_at.unwrap_or(existing.showcased_at);
        let showcase_location = attrs
            .showcase_location
            .clone()
            .or(existing.showcase_location);
        let affected = conn
            .execute(
                "UPDATE sessions SET started_at = ?1, showcased_at = ?2, showcase_location = ?3,
                 updated_at = ?4 WHERE id = ?5",
                params![
                    started_at.format("%Y-%m-%d").to_string(),
                    showcased_at.to_rfc3339(),
                    showcase_location,
                    Utc::now().to_rfc3339(),
                    id
                ],
            )
            .map_err(map_constraint)?;
        Ok(affected)
    }

    /// Hard delete; bands referencing the session are left in place
    pub fn delete_session(&self, id: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.execute("DELETE FROM sessions WHERE id = ?1", [id])?)
    }

    fn session_by_id(conn: &Connection, id: i64) -> Result<Option<Session>> {
        conn.query_row(
            "SELECT * FROM sessions WHERE id = ?",
            [id],
            Self::row_to_session,
        )
        .optional()
        .map_err(Error::from)
    }

    fn row_to_session(row: &Row) -> rusqlite::Result<Session> {
        let started_at: String = row.get("started_at")?;
        let showcased_at: String = row.get("showcased_at")?;
        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;
        Ok(Session {
            id: row.get("id")?,
            started_at: parse_date(&started_at),
            showcased_at: parse_dt(&showcased_at),
            showcase_location: row.get("showcase_location")?,
            created_at: parse_dt(&created_at),
            updated_at: parse_dt(&updated_at),
        })
    }

    // ============================================
    // Band operations
    // ============================================

    /// List bands with pagination and optional name search
    pub fn list_bands(&self, query: &ListQuery) -> Result<Paged<Band>> {
        let conn = self.conn.lock().unwrap();
        Self::list_rows(&conn, Table::Bands, query, Self::row_to_band)
    }

    /// Get a band by ID
    pub fn get_band(&self, id: i64) -> Result<Option<Band>> {
        let conn = self.conn.lock().unwrap();
        Self::band_by_id(&conn, id)
    }

    /// Get a band by name
    pub fn get_band_by_name(&self, name: &str) -> Result<Option<Band>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM bands WHERE name = ?",
            [name],
            Self::row_to_band,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Get a band joined with its session dates and artist/genre names
    pub fn get_band_detail(&self, id: i64) -> Result<Option<BandDetail>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            r#"
            SELECT
                b.*,
                s.started_at AS session_started_at,
                s.showcased_at AS session_showcased_at,
                a.name AS artist_name,
                g.name AS genre_name
            FROM bands b
            JOIN sessions s ON s.id = b.session_id
            LEFT JOIN artists a ON a.id = b.artist_id
            LEFT JOIN genres g ON g.id = b.genre_id
            WHERE b.id = ?
            "#,
            [id],
            |row| {
                let session_started: String = row.get("session_started_at")?;
                let session_showcased: String = row.get("session_showcased_at")?;
                Ok(BandDetail {
                    band: Self::row_to_band(row)?,
                    session_started_at: parse_date(&session_started),
                    session_showcased_at: parse_dt(&session_showcased),
                    artist_name: row.get("artist_name")?,
                    genre_name: row.get("genre_name")?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    /// Create a band.
    ///
    /// Validates the session/artist/genre references, then inserts the band
    /// and provisions one instrument slot per default-flagged instrument.
    /// The whole sequence is one transaction: a failing slot insert rolls
    /// the band back too.
    pub fn create_band(&self, attrs: &BandAttrs) -> Result<Band> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let values = [
            ("session_id", attrs.session_id),
            ("artist_id", attrs.artist_id),
            ("genre_id", attrs.genre_id),
        ];
        validate::check(
            &tx,
            validate::BAND_RULES,
            &Attempt {
                entity: "Band",
                values: &values,
                changed: None,
            },
            self.accumulate_errors,
        )?;

        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO bands (session_id, artist_id, genre_id, name, image_url, day_of_week,
                                starts_at, ends_at, price, duration_weeks, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
            params![
                attrs.session_id,
                attrs.artist_id,
                attrs.genre_id,
                attrs.name,
                attrs.image_url,
                attrs.day_of_week.map(|d| d.as_str()),
                attrs.starts_at.map(|t| t.format("%H:%M:%S").to_string()),
                attrs.ends_at.map(|t| t.format("%H:%M:%S").to_string()),
                attrs.price,
                attrs.duration_weeks,
                now
            ],
        )
        .map_err(map_constraint)?;
        let band_id = tx.last_insert_rowid();

        // Default instrumentation for the new band
        let mut stmt =
            tx.prepare("SELECT id FROM instruments WHERE is_band_default = 1 ORDER BY id")?;
        let defaults = stmt
            .query_map([], |r| r.get::<_, i64>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(stmt);

        for instrument_id in &defaults {
            tx.execute(
                "INSERT INTO band_instruments (band_id, instrument_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                params![band_id, instrument_id, now],
            )
            .map_err(map_constraint)?;
        }
        if !defaults.is_empty() {
            tracing::debug!(
                band_id,
                slots = defaults.len(),
                "Provisioned default instrument slots"
            );
        }

        let band = Self::band_by_id(&tx, band_id)?
            .ok_or(Error::Database(rusqlite::Error::QueryReturnedNoRows))?;
        tx.commit()?;
        Ok(band)
    }

    /// Partial update. Foreign keys present in `attrs` are re-validated
    /// against the store before the merged row is written.
    pub fn update_band(&self, id: i64, attrs: &BandAttrs) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let Some(existing) = Self::band_by_id(&tx, id)? else {
            return Ok(0);
        };

        let session_id = attrs.session_id.unwrap_or(existing.session_id);
        let artist_id = attrs.artist_id.or(existing.artist_id);
        let genre_id = attrs.genre_id.or(existing.genre_id);

        let mut changed: Vec<&'static str> = Vec::new();
        if attrs.session_id.is_some() {
            changed.push("session_id");
        }
        if attrs.artist_id.is_some() {
            changed.push("artist_id");
        }
        if attrs.genre_id.is_some() {
            changed.push("genre_id");
        }

        let values = [
            ("session_id", Some(session_id)),
            ("artist_id", artist_id),
            ("genre_id", genre_id),
        ];
        validate::check(
            &tx,
            validate::BAND_RULES,
            &Attempt {
                entity: "Band",
                values: &values,
                changed: Some(&changed),
            },
            self.accumulate_errors,
        )?;

        let name = attrs.name.clone().or(existing.name);
        let image_url = attrs.image_url.clone().or(existing.image_url);
        let day_of_week = attrs.day_of_week.or(existing.day_of_week);
        let starts_at = attrs.starts_at.or(existing.starts_at);
        let ends_at = attrs.ends_at.or(existing.ends_at);
        let price = attrs.price.or(existing.price);
        let duration_weeks = attrs.duration_weeks.or(existing.duration_weeks);

        let affected = tx
            .execute(
                "UPDATE bands SET session_id = ?1, artist_id = ?2, genre_id = ?3, name = ?4,
                 image_url = ?5, day_of_week = ?6, starts_at = ?7, ends_at = ?8, price = ?9,
                 duration_weeks = ?10, updated_at = ?11 WHERE id = ?12",
                params![
                    session_id,
                    artist_id,
                    genre_id,
                    name,
                    image_url,
                    day_of_week.map(|d| d.as_str()),
                    starts_at.map(|t| t.format("%H:%M:%S").to_string()),
                    ends_at.map(|t| t.format("%H:%M:%S").to_string()),
                    price,
                    duration_weeks,
                    Utc::now().to_rfc3339(),
                    id
                ],
            )
            .map_err(map_constraint)?;
        tx.commit()?;
        Ok(affected)
    }

    /// Hard delete; instrument slots referencing the band are left in place
    pub fn delete_band(&self, id: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.execute("DELETE FROM bands WHERE id = ?1", [id])?)
    }

    fn band_by_id(conn: &Connection, id: i64) -> Result<Option<Band>> {
        conn.query_row("SELECT * FROM bands WHERE id = ?", [id], Self::row_to_band)
            .optional()
            .map_err(Error::from)
    }

    fn row_to_band(row: &Row) -> rusqlite::Result<Band> {
        let day_of_week: Option<String> = row.get("day_of_week")?;
        let starts_at: Option<String> = row.get("starts_at")?;
        let ends_at: Option<String> = row.get("ends_at")?;
        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;
        Ok(Band {
            id: row.get("id")?,
            session_id: row.get("session_id")?,
            artist_id: row.get("artist_id")?,
            genre_id: row.get("genre_id")?,
            name: row.get("name")?,
            image_url: row.get("image_url")?,
            day_of_week: day_of_week.and_then(|s| s.parse().ok()),
            starts_at: starts_at.map(|s| parse_time(&s)),
            ends_at: ends_at.map(|s| parse_time(&s)),
            price: row.get("price")?,
            duration_weeks: row.get("duration_weeks")?,
            created_at: parse_dt(&created_at),
            updated_at: parse_dt(&updated_at),
        })
    }

    // ============================================
    // BandInstrument operations
    // ============================================

    /// All instrument slots for a band, with instrument and participant names
    pub fn list_band_instruments_for_band(
        &self,
        band_id: i64,
    ) -> Result<Vec<BandInstrumentDetail>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT
                bi.*,
                i.name AS instrument_name,
                u.name AS user_name
            FROM band_instruments bi
            JOIN instruments i ON i.id = bi.instrument_id
            LEFT JOIN users u ON u.id = bi.user_id
            WHERE bi.band_id = ?
            ORDER BY bi.id
            "#,
        )?;

        let details = stmt
            .query_map([band_id], |row| {
                Ok(BandInstrumentDetail {
                    assignment: Self::row_to_band_instrument(row)?,
                    instrument_name: row.get("instrument_name")?,
                    user_name: row.get("user_name")?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(details)
    }

    /// Get an instrument slot by ID
    pub fn get_band_instrument(&self, id: i64) -> Result<Option<BandInstrument>> {
        let conn = self.conn.lock().unwrap();
        Self::band_instrument_by_id(&conn, id)
    }

    /// Create an instrument slot for a band.
    ///
    /// The band and instrument must exist, the (band_id, instrument_id) pair
    /// must be unused, and the participant must exist when given. Check and
    /// insert share one transaction, so a concurrent duplicate cannot slip
    /// between them; the unique index is the store-level backstop.
    pub fn create_band_instrument(&self, attrs: &BandInstrumentAttrs) -> Result<BandInstrument> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let values = [
            ("band_id", attrs.band_id),
            ("instrument_id", attrs.instrument_id),
            ("user_id", attrs.user_id),
        ];
        validate::check(
            &tx,
            validate::BAND_INSTRUMENT_RULES,
            &Attempt {
                entity: "BandInstrument",
                values: &values,
                changed: None,
            },
            self.accumulate_errors,
        )?;

        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO band_instruments (band_id, instrument_id, user_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![attrs.band_id, attrs.instrument_id, attrs.user_id, now],
        )
        .map_err(map_constraint)?;

        let slot = Self::band_instrument_by_id(&tx, tx.last_insert_rowid())?
            .ok_or(Error::Database(rusqlite::Error::QueryReturnedNoRows))?;
        tx.commit()?;
        Ok(slot)
    }

    /// Partial update; only the fields present in `attrs` are re-validated
    pub fn update_band_instrument(
        &self,
        id: i64,
        attrs: &BandInstrumentAttrs,
    ) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let Some(existing) = Self::band_instrument_by_id(&tx, id)? else {
            return Ok(0);
        };

        let band_id = attrs.band_id.unwrap_or(existing.band_id);
        let instrument_id = attrs.instrument_id.unwrap_or(existing.instrument_id);
        let user_id = attrs.user_id.or(existing.user_id);

        let mut changed: Vec<&'static str> = Vec::new();
        if attrs.band_id.is_some() {
            changed.push("band_id");
        }
        if attrs.instrument_id.is_some() {
            changed.push("instrument_id");
        }
        if attrs.user_id.is_some() {
            changed.push("user_id");
        }

        let values = [
            ("band_id", Some(band_id)),
            ("instrument_id", Some(instrument_id)),
            ("user_id", user_id),
        ];
        validate::check(
            &tx,
            validate::BAND_INSTRUMENT_RULES,
            &Attempt {
                entity: "BandInstrument",
                values: &values,
                changed: Some(&changed),
            },
            self.accumulate_errors,
        )?;

        let affected = tx
            .execute(
                "UPDATE band_instruments SET band_id = ?1, instrument_id = ?2, user_id = ?3,
                 updated_at = ?4 WHERE id = ?5",
                params![band_id, instrument_id, user_id, Utc::now().to_rfc3339(), id],
            )
            .map_err(map_constraint)?;
        tx.commit()?;
        Ok(affected)
    }

    pub fn delete_band_instrument(&self, id: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.execute("DELETE FROM band_instruments WHERE id = ?1", [id])?)
    }

    fn band_instrument_by_id(conn: &Connection, id: i64) -> Result<Option<BandInstrument>> {
        conn.query_row(
            "SELECT * FROM band_instruments WHERE id = ?",
            [id],
            Self::row_to_band_instrument,
        )
        .optional()
        .map_err(Error::from)
    }

    fn row_to_band_instrument(row: &Row) -> rusqlite::Result<BandInstrument> {
        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;
        Ok(BandInstrument {
            id: row.get("id")?,
            band_id: row.get("band_id")?,
            instrument_id: row.get("instrument_id")?,
            user_id: row.get("user_id")?,
            created_at: parse_dt(&created_at),
            updated_at: parse_dt(&updated_at),
        })
    }
}
