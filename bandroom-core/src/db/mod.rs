//! Database layer for bandroom
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Repository operations per entity
//! - Referential-integrity and uniqueness validation on writes
//! - Reference-data seeding

pub mod repo;
pub mod schema;
pub mod seed;
pub mod validate;

pub use repo::{BandDetail, BandInstrumentDetail, Database, ListQuery, Paged};
