//! Referential-integrity and uniqueness validation
//!
//! Sits between the repository operations and the store. Each referencing
//! entity declares a list of per-field rules; one generic engine evaluates
//! them against the live database immediately before a write, inside the
//! write's own transaction.
//!
//! Evaluation order for one write attempt: required-presence checks for every
//! field in declaration order, then existence checks in declaration order,
//! then compound-uniqueness checks. The first failing rule aborts the attempt
//! unless the engine runs in accumulate mode, in which case every failing
//! rule is collected into a single [`Violations`] value.

use crate::error::{Result, ValidationError, Violations};
use crate::types::Table;
use rusqlite::{params, Connection, OptionalExtension};

/// A single validation rule attached to a field
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// Null/absent is itself a failure
    Required,
    /// The value, when present, must be the primary key of a row in `table`
    MustExist { table: Table },
    /// The (other_field, this field) pair must not already exist in `table`
    UniqueWith {
        other_field: &'static str,
        table: Table,
    },
}

/// The rules for one foreign-key field of an entity
#[derive(Debug, Clone, Copy)]
pub struct FieldRules {
    pub field: &'static str,
    pub rules: &'static [Rule],
}

/// Band: session_id is mandatory, artist/genre are optional references
pub const BAND_RULES: &[FieldRules] = &[
    FieldRules {
        field: "session_id",
        rules: &[
            Rule::Required,
            Rule::MustExist {
                table: Table::Sessions,
            },
        ],
    },
    FieldRules {
        field: "artist_id",
        rules: &[Rule::MustExist {
            table: Table::Artists,
        }],
    },
    FieldRules {
        field: "genre_id",
        rules: &[Rule::MustExist {
            table: Table::Genres,
        }],
    },
];

/// BandInstrument: band and instrument are mandatory, and an instrument may
/// appear only once per band
pub const BAND_INSTRUMENT_RULES: &[FieldRules] = &[
    FieldRules {
        field: "band_id",
        rules: &[
            Rule::Required,
            Rule::MustExist { table: Table::Bands },
        ],
    },
    FieldRules {
        field: "instrument_id",
        rules: &[
            Rule::Required,
            Rule::MustExist {
                table: Table::Instruments,
            },
            Rule::UniqueWith {
                other_field: "band_id",
                table: Table::BandInstruments,
            },
        ],
    },
    FieldRules {
        field: "user_id",
        rules: &[Rule::MustExist { table: Table::Users }],
    },
];

/// Check whether a row with primary key `id` exists in `table`.
///
/// `None` passes: an absent optional reference is not a failure. "Not found"
/// is an `Ok(false)`, never an error; only genuine query failures propagate.
pub fn exists(conn: &Connection, table: Table, id: Option<i64>) -> Result<bool> {
    let Some(id) = id else {
        return Ok(true);
    };

    let sql = format!("SELECT id FROM {} WHERE id = ?1 LIMIT 1", table.as_str());
    let found: Option<i64> = conn
        .query_row(&sql, params![id], |r| r.get(0))
        .optional()?;

    Ok(found.is_some())
}

/// Check whether any row of `table` matches both key/value pairs at once.
///
/// Returns `false` when either value is absent: a null can never collide.
pub fn is_duplicate(
    conn: &Connection,
    table: Table,
    key_a: &'static str,
    value_a: Option<i64>,
    key_b: &'static str,
    value_b: Option<i64>,
) -> Result<bool> {
    let Some(value_b) = value_b else {
        return Ok(false);
    };
    let Some(value_a) = value_a else {
        return Ok(false);
    };

    let sql = format!(
        "SELECT id FROM {} WHERE {} = ?1 AND {} = ?2 LIMIT 1",
        table.as_str(),
        key_a,
        key_b
    );
    let found: Option<i64> = conn
        .query_row(&sql, params![value_a, value_b], |r| r.get(0))
        .optional()?;

    Ok(found.is_some())
}

/// The foreign-key values of one write attempt, post-merge.
///
/// `changed` limits which fields' rules run (partial updates re-validate only
/// the fields present in the patch); `None` means validate everything.
pub struct Attempt<'a> {
    pub entity: &'static str,
    pub values: &'a [(&'static str, Option<i64>)],
    pub changed: Option<&'a [&'static str]>,
}

impl Attempt<'_> {
    fn value_of(&self, field: &str) -> Option<i64> {
        self.values
            .iter()
            .find(|(name, _)| *name == field)
            .and_then(|(_, v)| *v)
    }

    fn in_scope(&self, field: &str) -> bool {
        match self.changed {
            Some(fields) => fields.contains(&field),
            None => true,
        }
    }
}

/// Evaluate an entity's rule set against the store.
///
/// Runs inside the caller's transaction so that the checks and the guarded
/// write observe one consistent snapshot.
pub fn check(
    conn: &Connection,
    rules: &[FieldRules],
    attempt: &Attempt<'_>,
    accumulate: bool,
) -> Result<()> {
    let mut failures: Vec<ValidationError> = Vec::new();

    // Pass 1: required-presence
    for field_rules in rules {
        if !attempt.in_scope(field_rules.field) {
            continue;
        }
        for rule in field_rules.rules {
            if let Rule::Required = *rule {
                if attempt.value_of(field_rules.field).is_none() {
                    failures.push(ValidationError::NotNull {
                        entity: attempt.entity,
                        field: field_rules.field,
                    });
                    if !accumulate {
                        return Err(Violations::new(failures).into());
                    }
                }
            }
        }
    }

    // Pass 2: existence
    for field_rules in rules {
        if !attempt.in_scope(field_rules.field) {
            continue;
        }
        for rule in field_rules.rules {
            if let Rule::MustExist { table } = *rule {
                if !exists(conn, table, attempt.value_of(field_rules.field))? {
                    failures.push(ValidationError::NotFound {
                        field: field_rules.field,
                    });
                    if !accumulate {
                        return Err(Violations::new(failures).into());
                    }
                }
            }
        }
    }

    // Pass 3: compound uniqueness
    for field_rules in rules {
        if !attempt.in_scope(field_rules.field) {
            continue;
        }
        for rule in field_rules.rules {
            if let Rule::UniqueWith { other_field, table } = *rule {
                let pair_hit = is_duplicate(
                    conn,
                    table,
                    other_field,
                    attempt.value_of(other_field),
                    field_rules.field,
                    attempt.value_of(field_rules.field),
                )?;
                if pair_hit {
                    failures.push(ValidationError::DuplicatePair {
                        field: field_rules.field,
                        other_field,
                    });
                    if !accumulate {
                        return Err(Violations::new(failures).into());
                    }
                }
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(Violations::new(failures).into())
    }
}
