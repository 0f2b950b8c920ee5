//! Integration tests for the bandroom storage and validation layer
//!
//! These drive the public `Database` API end to end: reference checks,
//! compound uniqueness, the default-line-up cascade on band creation, and
//! the repository contract (pagination, projection, partial updates).

use bandroom_core::db::seed;
use bandroom_core::{
    Band, BandAttrs, BandInstrumentAttrs, Database, DayOfWeek, Error, InstrumentAttrs, ListQuery,
    SessionAttrs, Table, UserAttrs,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tempfile::TempDir;

fn test_db() -> Database {
    bandroom_core::logging::init_test();
    let db = Database::open_in_memory().expect("in-memory database should open");
    db.migrate().expect("migrations should run");
    db
}

fn showcase_date() -> DateTime<Utc> {
    "2025-12-12T19:00:00Z".parse().unwrap()
}

fn make_session(db: &Database) -> i64 {
    db.create_session(&SessionAttrs {
        started_at: Some(NaiveDate::from_ymd_opt(2025, 9, 1).unwrap()),
        showcased_at: Some(showcase_date()),
        showcase_location: Some("Main Hall".to_string()),
    })
    .expect("session create should succeed")
    .id
}

fn make_band(db: &Database, session_id: i64) -> Band {
    db.create_band(&BandAttrs {
        session_id: Some(session_id),
        ..Default::default()
    })
    .expect("band create should succeed")
}

fn make_instrument(db: &Database, name: &str, default: bool) -> i64 {
    db.create_instrument(&InstrumentAttrs {
        name: Some(name.to_string()),
        is_band_default: Some(default),
    })
    .expect("instrument create should succeed")
    .id
}

fn validation_message(err: Error) -> String {
    match err {
        Error::Validation(v) => v.to_string(),
        other => panic!("expected validation error, got {other}"),
    }
}

// ============================================
// Band reference validation
// ============================================

#[test]
fn test_create_band_with_valid_session_only() {
    let db = test_db();
    let session_id = make_session(&db);

    let band = make_band(&db, session_id);

    assert_eq!(band.session_id, session_id);
    assert!(band.artist_id.is_none());
    assert!(band.genre_id.is_none());
    assert!(band.name.is_none());
    assert!(band.day_of_week.is_none());
    assert!(band.starts_at.is_none());
    assert!(band.ends_at.is_none());
    assert!(band.price.is_none());
    assert!(band.duration_weeks.is_none());
}

#[test]
fn test_create_band_without_session_id_fails() {
    let db = test_db();

    let err = db.create_band(&BandAttrs::default()).unwrap_err();
    assert_eq!(validation_message(err), "Band.session_id cannot be null");

    // Nothing was written
    let bands = db.list_bands(&ListQuery::default()).unwrap();
    assert_eq!(bands.total_count, 0);
}

#[test]
fn test_create_band_with_unknown_session_id_fails() {
    let db = test_db();

    let err = db
        .create_band(&BandAttrs {
            session_id: Some(999999),
            ..Default::default()
        })
        .unwrap_err();
    assert_eq!(validation_message(err), "session_id not found");
}

#[test]
fn test_create_band_with_unknown_artist_fails() {
    let db = test_db();
    let session_id = make_session(&db);

    let err = db
        .create_band(&BandAttrs {
            session_id: Some(session_id),
            artist_id: Some(999999),
            ..Default::default()
        })
        .unwrap_err();
    assert_eq!(validation_message(err), "artist_id not found");
}

#[test]
fn test_create_band_full_attributes() {
    let db = test_db();
    let session_id = make_session(&db);
    let artist_id = db
        .create_artist(&bandroom_core::ArtistAttrs {
            name: Some("Bikini Kill".to_string()),
        })
        .unwrap()
        .id;
    let genre_id = db
        .create_genre(&bandroom_core::GenreAttrs {
            name: Some("Riot grrrl".to_string()),
        })
        .unwrap()
        .id;

    let band = db
        .create_band(&BandAttrs {
            session_id: Some(session_id),
            artist_id: Some(artist_id),
            genre_id: Some(genre_id),
            name: Some("tankini torture".to_string()),
            image_url: Some("http://www.images.com/image.jpg".to_string()),
            day_of_week: Some(DayOfWeek::Monday),
            starts_at: Some(NaiveTime::from_hms_opt(20, 0, 0).unwrap()),
            ends_at: Some(NaiveTime::from_hms_opt(21, 30, 0).unwrap()),
            price: Some(200.0),
            duration_weeks: Some(8),
        })
        .unwrap();

    let fetched = db.get_band(band.id).unwrap().unwrap();
    assert_eq!(fetched.name.as_deref(), Some("tankini torture"));
    assert_eq!(fetched.day_of_week, Some(DayOfWeek::Monday));
    assert_eq!(
        fetched.starts_at,
        Some(NaiveTime::from_hms_opt(20, 0, 0).unwrap())
    );
    assert_eq!(fetched.price, Some(200.0));
    assert_eq!(fetched.duration_weeks, Some(8));

    let detail = db.get_band_detail(band.id).unwrap().unwrap();
    assert_eq!(detail.artist_name.as_deref(), Some("Bikini Kill"));
    assert_eq!(detail.genre_name.as_deref(), Some("Riot grrrl"));
    assert_eq!(
        detail.session_started_at,
        NaiveDate::from_ymd_opt(2025, 9, 1).unwrap()
    );
    assert_eq!(detail.session_showcased_at, showcase_date());
}

// ============================================
// Compound uniqueness
// ============================================

#[test]
fn test_band_instrument_pair_unique() {
    let db = test_db();
    let session_id = make_session(&db);
    let band = make_band(&db, session_id);
    let guitar = make_instrument(&db, "Guitar", false);
    let drums = make_instrument(&db, "Drums", false);

    // First assignment succeeds
    db.create_band_instrument(&BandInstrumentAttrs {
        band_id: Some(band.id),
        instrument_id: Some(guitar),
        user_id: None,
    })
    .expect("first assignment should succeed");

    // Identical pair is rejected
    let err = db
        .create_band_instrument(&BandInstrumentAttrs {
            band_id: Some(band.id),
            instrument_id: Some(guitar),
            user_id: None,
        })
        .unwrap_err();
    assert_eq!(
        validation_message(err),
        "instrument_id already exists for this band_id"
    );

    // Different instrument on the same band succeeds
    db.create_band_instrument(&BandInstrumentAttrs {
        band_id: Some(band.id),
        instrument_id: Some(drums),
        user_id: None,
    })
    .expect("different pair should succeed");

    let slots = db.list_band_instruments_for_band(band.id).unwrap();
    assert_eq!(slots.len(), 2);
}

#[test]
fn test_band_instrument_requires_band_and_instrument() {
    let db = test_db();

    let err = db
        .create_band_instrument(&BandInstrumentAttrs::default())
        .unwrap_err();
    assert_eq!(
        validation_message(err),
        "BandInstrument.band_id cannot be null"
    );

    let session_id = make_session(&db);
    let band = make_band(&db, session_id);
    let err = db
        .create_band_instrument(&BandInstrumentAttrs {
            band_id: Some(band.id),
            instrument_id: Some(999999),
            user_id: None,
        })
        .unwrap_err();
    assert_eq!(validation_message(err), "instrument_id not found");
}

#[test]
fn test_band_instrument_unknown_user_fails() {
    let db = test_db();
    let session_id = make_session(&db);
    let band = make_band(&db, session_id);
    let guitar = make_instrument(&db, "Guitar", false);

    let err = db
        .create_band_instrument(&BandInstrumentAttrs {
            band_id: Some(band.id),
            instrument_id: Some(guitar),
            user_id: Some(999999),
        })
        .unwrap_err();
    assert_eq!(validation_message(err), "user_id not found");

    // The failed attempt left nothing behind
    assert!(db.list_band_instruments_for_band(band.id).unwrap().is_empty());
}

// ============================================
// Default line-up cascade
// ============================================

#[test]
fn test_band_create_provisions_default_line_up() {
    let db = test_db();
    seed::seed_instruments(&db).unwrap();
    let session_id = make_session(&db);

    let band = make_band(&db, session_id);

    let defaults = db.list_default_instruments().unwrap();
    let slots = db.list_band_instruments_for_band(band.id).unwrap();
    assert_eq!(slots.len(), defaults.len());

    // Slots come back joined with instrument names, unfilled
    let names: Vec<_> = slots.iter().map(|s| s.instrument_name.as_str()).collect();
    assert!(names.contains(&"Guitar"));
    assert!(slots.iter().all(|s| s.assignment.user_id.is_none()));
}

#[test]
fn test_band_create_without_defaults_provisions_nothing() {
    let db = test_db();
    make_instrument(&db, "Theremin", false);
    let session_id = make_session(&db);

    let band = make_band(&db, session_id);
    assert!(db.list_band_instruments_for_band(band.id).unwrap().is_empty());
}

// ============================================
// Deletes and orphaning
// ============================================

#[test]
fn test_deleting_artist_does_not_invalidate_band() {
    let db = test_db();
    let session_id = make_session(&db);
    let artist_id = db
        .create_artist(&bandroom_core::ArtistAttrs {
            name: Some("The Gits".to_string()),
        })
        .unwrap()
        .id;

    let band = db
        .create_band(&BandAttrs {
            session_id: Some(session_id),
            artist_id: Some(artist_id),
            ..Default::default()
        })
        .unwrap();

    assert_eq!(db.delete_artist(artist_id).unwrap(), 1);

    // The existing band is untouched; it still carries the dangling id
    let fetched = db.get_band(band.id).unwrap().unwrap();
    assert_eq!(fetched.artist_id, Some(artist_id));
}

#[test]
fn test_delete_returns_affected_count() {
    let db = test_db();
    let session_id = make_session(&db);
    let band = make_band(&db, session_id);

    assert_eq!(db.delete_band(band.id).unwrap(), 1);
    assert_eq!(db.delete_band(band.id).unwrap(), 0);
}

#[test]
fn test_get_absent_band_is_idempotent() {
    let db = test_db();
    let session_id = make_session(&db);
    make_band(&db, session_id);

    assert!(db.get_band(999999).unwrap().is_none());
    assert!(db.get_band(999999).unwrap().is_none());

    // No mutation happened along the way
    assert_eq!(db.list_bands(&ListQuery::default()).unwrap().total_count, 1);
}

// ============================================
// Store-enforced uniqueness
// ============================================

#[test]
fn test_artist_name_collision_is_validation_error() {
    let db = test_db();
    let attrs = bandroom_core::ArtistAttrs {
        name: Some("Sleater-Kinney".to_string()),
    };

    db.create_artist(&attrs).unwrap();
    let err = db.create_artist(&attrs).unwrap_err();
    assert!(err.is_validation(), "collision should be recoverable: {err}");
}

#[test]
fn test_user_uuid_generated_and_email_unique() {
    let db = test_db();
    let user = db
        .create_user(&UserAttrs {
            name: Some("Kathleen".to_string()),
            email: Some("kathleen@example.com".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert!(!user.uuid.is_empty());
    assert_eq!(
        db.get_user_by_uuid(&user.uuid).unwrap().unwrap().id,
        user.id
    );

    let err = db
        .create_user(&UserAttrs {
            name: Some("Other".to_string()),
            email: Some("kathleen@example.com".to_string()),
            ..Default::default()
        })
        .unwrap_err();
    assert!(err.is_validation());
}

// ============================================
// Listing, search, projection
// ============================================

#[test]
fn test_list_bands_pagination_and_search() {
    let db = test_db();
    let session_id = make_session(&db);
    for name in ["bikini kill", "tankini torture", "the julie ruin"] {
        db.create_band(&BandAttrs {
            session_id: Some(session_id),
            name: Some(name.to_string()),
            ..Default::default()
        })
        .unwrap();
    }

    let page = db
        .list_bands(&ListQuery {
            limit: 2,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(page.rows.len(), 2);
    assert_eq!(page.total_count, 3);

    let hits = db.list_bands(&ListQuery::search("%kini%")).unwrap();
    assert_eq!(hits.total_count, 2);
    assert!(hits
        .rows
        .iter()
        .all(|b| b.name.as_deref().unwrap().contains("kini")));
}

#[test]
fn test_select_columns_projection() {
    let db = test_db();
    let session_id = make_session(&db);
    db.create_band(&BandAttrs {
        session_id: Some(session_id),
        name: Some("bratmobile".to_string()),
        ..Default::default()
    })
    .unwrap();

    let page = db
        .select_columns(Table::Bands, &["name".to_string()], &ListQuery::default())
        .unwrap();
    assert_eq!(page.total_count, 1);
    let row = &page.rows[0];
    assert_eq!(row["name"], "bratmobile");
    assert!(row.get("id").is_none(), "unrequested columns are omitted");

    let err = db
        .select_columns(
            Table::Bands,
            &["no_such_column".to_string()],
            &ListQuery::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::InvalidQuery(_)));
}

// ============================================
// Partial updates
// ============================================

#[test]
fn test_update_band_revalidates_patched_fields() {
    let db = test_db();
    let session_id = make_session(&db);
    let band = make_band(&db, session_id);

    let err = db
        .update_band(
            band.id,
            &BandAttrs {
                artist_id: Some(999999),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert_eq!(validation_message(err), "artist_id not found");

    // The failed update left the row unchanged
    assert!(db.get_band(band.id).unwrap().unwrap().artist_id.is_none());

    let affected = db
        .update_band(
            band.id,
            &BandAttrs {
                name: Some("heavens to betsy".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(affected, 1);

    let fetched = db.get_band(band.id).unwrap().unwrap();
    assert_eq!(fetched.name.as_deref(), Some("heavens to betsy"));
    assert_eq!(fetched.session_id, session_id, "unpatched fields survive");
}

#[test]
fn test_update_band_instrument_user_only_skips_pair_check() {
    let db = test_db();
    let session_id = make_session(&db);
    let band = make_band(&db, session_id);
    let guitar = make_instrument(&db, "Guitar", false);
    let user = db
        .create_user(&UserAttrs {
            name: Some("Corin".to_string()),
            email: Some("corin@example.com".to_string()),
            ..Default::default()
        })
        .unwrap();

    let slot = db
        .create_band_instrument(&BandInstrumentAttrs {
            band_id: Some(band.id),
            instrument_id: Some(guitar),
            user_id: None,
        })
        .unwrap();

    // Filling the slot re-validates only user_id; the row's own pair does
    // not trip the duplicate check.
    let affected = db
        .update_band_instrument(
            slot.id,
            &BandInstrumentAttrs {
                user_id: Some(user.id),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(affected, 1);

    let err = db
        .update_band_instrument(
            slot.id,
            &BandInstrumentAttrs {
                user_id: Some(999999),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert_eq!(validation_message(err), "user_id not found");
}

#[test]
fn test_update_absent_row_returns_zero() {
    let db = test_db();

    let affected = db
        .update_band(
            999999,
            &BandAttrs {
                name: Some("nobody".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(affected, 0);
}

// ============================================
// Accumulate mode
// ============================================

#[test]
fn test_accumulate_mode_reports_all_violations() {
    let db = Database::open_in_memory().unwrap().accumulate_errors(true);
    db.migrate().unwrap();

    let err = db
        .create_band(&BandAttrs {
            artist_id: Some(999999),
            genre_id: Some(999999),
            ..Default::default()
        })
        .unwrap_err();

    match err {
        Error::Validation(v) => {
            assert_eq!(v.len(), 3);
            assert_eq!(
                v.to_string(),
                "Band.session_id cannot be null; artist_id not found; genre_id not found"
            );
        }
        other => panic!("expected validation error, got {other}"),
    }
}

// ============================================
// On-disk round trip
// ============================================

#[test]
fn test_full_pipeline_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("schedule.db");
    let db = Database::open(&db_path).expect("database should open");
    db.migrate().expect("migrations should run");
    seed::seed_instruments(&db).unwrap();

    let session_id = make_session(&db);
    let band = db
        .create_band(&BandAttrs {
            session_id: Some(session_id),
            name: Some("bikini kill".to_string()),
            day_of_week: Some(DayOfWeek::Wednesday),
            ..Default::default()
        })
        .unwrap();

    drop(db);

    // Reopen and verify everything survived
    let db = Database::open(&db_path).expect("database should reopen");
    db.migrate().expect("migrations stay idempotent");

    let fetched = db.get_band(band.id).unwrap().unwrap();
    assert_eq!(fetched.name.as_deref(), Some("bikini kill"));
    assert_eq!(fetched.day_of_week, Some(DayOfWeek::Wednesday));

    let defaults = db.list_default_instruments().unwrap();
    let slots = db.list_band_instruments_for_band(band.id).unwrap();
    assert_eq!(slots.len(), defaults.len());
}
