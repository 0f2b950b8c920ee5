//! Reference-data seeding
//!
//! The instrument catalogue ships with the application; the first five make
//! up the default line-up provisioned for every new band.

use crate::db::Database;
use crate::error::Result;
use crate::types::InstrumentAttrs;

/// (name, is_band_default)
pub const INSTRUMENT_SEEDS: &[(&str, bool)] = &[
    ("Vocals", true),
    ("Guitar", true),
    ("Bass", true),
    ("Drums", true),
    ("Keyboard", true),
    ("Saxophone", false),
    ("Trumpet", false),
    ("Violin", false),
    ("Cello", false),
];

/// Insert any missing seed instruments. Idempotent; returns how many rows
/// were actually created.
pub fn seed_instruments(db: &Database) -> Result<usize> {
    let mut created = 0;
    for (name, is_band_default) in INSTRUMENT_SEEDS {
        if db.get_instrument_by_name(name)?.is_none() {
            db.create_instrument(&InstrumentAttrs {
                name: Some((*name).to_string()),
                is_band_default: Some(*is_band_default),
            })?;
            created += 1;
        }
    }

    tracing::info!(created, "Instrument seed data applied");
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();

        let first = seed_instruments(&db).unwrap();
        assert_eq!(first, INSTRUMENT_SEEDS.len());

        let second = seed_instruments(&db).unwrap();
        assert_eq!(second, 0);

        let defaults = db.list_default_instruments().unwrap();
        let expected = INSTRUMENT_SEEDS.iter().filter(|(_, d)| *d).count();
        assert_eq!(defaults.len(), expected);
    }
}
