//! # bandroom-core
//!
//! Core library for bandroom - a validated data-access layer for band and
//! session scheduling.
//!
//! This library provides:
//! - Domain types for artists, genres, instruments, users, sessions, bands,
//!   and per-band instrument assignments
//! - A SQLite storage layer with embedded migrations
//! - A referential-integrity and uniqueness validation engine that guards
//!   every write carrying foreign keys
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Repositories expose create/update/delete/query operations per entity. A
//! write request first passes through the entity's declared validation rules
//! (required presence, cross-table existence, compound uniqueness); the
//! checks and the guarded write share one transaction, so the first failing
//! rule aborts the attempt with no side effects.
//!
//! ## Example
//!
//! ```rust,no_run
//! use bandroom_core::{BandAttrs, Config, Database};
//!
//! let config = Config::load().expect("failed to load config");
//! let db = Database::open(&config.database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! // Fails with "session_id not found" unless session 1 exists
//! let band = db.create_band(&BandAttrs {
//!     session_id: Some(1),
//!     name: Some("bikini kill".to_string()),
//!     ..Default::default()
//! });
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::{Database, ListQuery, Paged};
pub use error::{Error, Result, ValidationError, Violations};
pub use types::*;

// Public modules
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod types;
