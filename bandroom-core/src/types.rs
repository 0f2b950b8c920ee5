//! Core domain types for bandroom
//!
//! These types model a season of band sessions: reference data (artists,
//! genres, instruments, users), the sessions themselves, and the bands and
//! per-band instrument assignments scheduled within a session.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Session** | A scheduling period that culminates in a showcase |
//! | **Band** | A group assembled for a Session, optionally themed on an Artist/Genre |
//! | **BandInstrument** | One instrument slot in a Band, optionally filled by a User |
//! | **Instrument** | Reference row; `is_band_default` marks the standard line-up |
//!
//! Every row carries `created_at`/`updated_at` timestamps maintained by the
//! storage layer.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Tables
// ============================================

/// The closed set of tables the storage layer operates on.
///
/// Existence and uniqueness checks build SQL from this enum, never from
/// caller-supplied strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Artists,
    Genres,
    Instruments,
    Users,
    Sessions,
    Bands,
    BandInstruments,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Artists => "artists",
            Table::Genres => "genres",
            Table::Instruments => "instruments",
            Table::Users => "users",
            Table::Sessions => "sessions",
            Table::Bands => "bands",
            Table::BandInstruments => "band_instruments",
        }
    }

    /// All columns of the table, for validating projection requests
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::Artists | Table::Genres => {
                &["id", "name", "created_at", "updated_at"]
            }
            Table::Instruments => &["id", "name", "is_band_default", "created_at", "updated_at"],
            Table::Users => &[
                "id",
                "uuid",
                "name",
                "email",
                "description",
                "created_at",
                "updated_at",
            ],
            Table::Sessions => &[
                "id",
                "started_at",
                "showcased_at",
                "showcase_location",
                "created_at",
                "updated_at",
            ],
            Table::Bands => &[
                "id",
                "session_id",
                "artist_id",
                "genre_id",
                "name",
                "image_url",
                "day_of_week",
                "starts_at",
                "ends_at",
                "price",
                "duration_weeks",
                "created_at",
                "updated_at",
            ],
            Table::BandInstruments => &[
                "id",
                "band_id",
                "instrument_id",
                "user_id",
                "created_at",
                "updated_at",
            ],
        }
    }

    /// The column a list `search` pattern matches against, if the table has one.
    ///
    /// Sessions have no name; their searchable column is the showcase location.
    pub fn search_column(&self) -> Option<&'static str> {
        match self {
            Table::Artists
            | Table::Genres
            | Table::Instruments
            | Table::Users
            | Table::Bands => Some("name"),
            Table::Sessions => Some("showcase_location"),
            Table::BandInstruments => None,
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================
// Reference entities
// ============================================

/// A performing artist a band can be themed on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artist {
    pub id: i64,
    /// Unique display name
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A musical genre
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    /// Unique display name
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An instrument that can be assigned to bands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub id: i64,
    /// Unique display name
    pub name: String,
    /// Part of the default line-up provisioned for every new band
    pub is_band_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A registered participant who can fill a band's instrument slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Stable external identifier, unique
    pub uuid: String,
    pub name: String,
    /// Unique contact address
    pub email: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================
// Sessions
// ============================================

/// A scheduling period culminating in a showcase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    /// First day of the session
    pub started_at: NaiveDate,
    /// When the closing showcase takes place
    pub showcased_at: DateTime<Utc>,
    pub showcase_location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================
// Bands
// ============================================

/// Weekday a band rehearses on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
            DayOfWeek::Sunday => "Sunday",
        }
    }
}

impl std::str::FromStr for DayOfWeek {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Monday" => Ok(DayOfWeek::Monday),
            "Tuesday" => Ok(DayOfWeek::Tuesday),
            "Wednesday" => Ok(DayOfWeek::Wednesday),
            "Thursday" => Ok(DayOfWeek::Thursday),
            "Friday" => Ok(DayOfWeek::Friday),
            "Saturday" => Ok(DayOfWeek::Saturday),
            "Sunday" => Ok(DayOfWeek::Sunday),
            _ => Err(format!("unknown day of week: {}", s)),
        }
    }
}

impl std::fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A band scheduled within a session.
///
/// `session_id` must reference an existing session; `artist_id` and
/// `genre_id` must reference existing rows when set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Band {
    pub id: i64,
    pub session_id: i64,
    pub artist_id: Option<i64>,
    pub genre_id: Option<i64>,
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub day_of_week: Option<DayOfWeek>,
    pub starts_at: Option<NaiveTime>,
    pub ends_at: Option<NaiveTime>,
    pub price: Option<f64>,
    pub duration_weeks: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One instrument slot in a band.
///
/// The (band_id, instrument_id) pair is unique: a band cannot carry the same
/// instrument twice. `user_id` is the participant filling the slot, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandInstrument {
    pub id: i64,
    pub band_id: i64,
    pub instrument_id: i64,
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================
// Write attribute sets
// ============================================
//
// One attribute struct per entity, used for both create and partial update.
// `None` means "absent": on create the validators decide whether absence is
// acceptable, on update the field is left unchanged.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtistAttrs {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenreAttrs {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstrumentAttrs {
    pub name: Option<String>,
    pub is_band_default: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserAttrs {
    /// Generated when absent on create
    pub uuid: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionAttrs {
    pub started_at: Option<NaiveDate>,
    pub showcased_at: Option<DateTime<Utc>>,
    pub showcase_location: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BandAttrs {
    pub session_id: Option<i64>,
    pub artist_id: Option<i64>,
    pub genre_id: Option<i64>,
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub day_of_week: Option<DayOfWeek>,
    pub starts_at: Option<NaiveTime>,
    pub ends_at: Option<NaiveTime>,
    pub price: Option<f64>,
    pub duration_weeks: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BandInstrumentAttrs {
    pub band_id: Option<i64>,
    pub instrument_id: Option<i64>,
    pub user_id: Option<i64>,
}
