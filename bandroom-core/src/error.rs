//! Error types for bandroom-core

use thiserror::Error;

/// Main error type for the bandroom-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed query arguments (unknown table column, bad projection)
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// One or more validation rules rejected a write
    #[error("validation error: {0}")]
    Validation(Violations),
}

impl Error {
    /// True when this error came from a validation rule rather than the store
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// The violations behind a validation error, if that is what this is
    pub fn violations(&self) -> Option<&Violations> {
        match self {
            Error::Validation(v) => Some(v),
            _ => None,
        }
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(Violations::single(err))
    }
}

impl From<Violations> for Error {
    fn from(violations: Violations) -> Self {
        Error::Validation(violations)
    }
}

/// A single failed validation rule.
///
/// Message formats are part of the public contract and asserted in tests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was null or absent
    #[error("{entity}.{field} cannot be null")]
    NotNull {
        entity: &'static str,
        field: &'static str,
    },

    /// A foreign key did not resolve to an existing row
    #[error("{field} not found")]
    NotFound { field: &'static str },

    /// A compound-unique pair already exists
    #[error("{field} already exists for this {other_field}")]
    DuplicatePair {
        field: &'static str,
        other_field: &'static str,
    },

    /// A store-enforced constraint fired (single-column uniqueness, NOT NULL)
    #[error("{0}")]
    Constraint(String),
}

/// Ordered, non-empty list of validation failures for one write attempt.
///
/// In the default short-circuit mode this holds exactly one entry; with
/// `validation.accumulate_errors` enabled it holds every rule that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violations(Vec<ValidationError>);

impl Violations {
    pub fn new(errors: Vec<ValidationError>) -> Self {
        debug_assert!(!errors.is_empty(), "Violations must not be empty");
        Self(errors)
    }

    pub fn single(error: ValidationError) -> Self {
        Self(vec![error])
    }

    /// The first (or only) violation
    pub fn first(&self) -> &ValidationError {
        &self.0[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Violations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

/// Result type alias for bandroom-core
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages() {
        let err = ValidationError::NotNull {
            entity: "Band",
            field: "session_id",
        };
        assert_eq!(err.to_string(), "Band.session_id cannot be null");

        let err = ValidationError::NotFound {
            field: "session_id",
        };
        assert_eq!(err.to_string(), "session_id not found");

        let err = ValidationError::DuplicatePair {
            field: "instrument_id",
            other_field: "band_id",
        };
        assert_eq!(
            err.to_string(),
            "instrument_id already exists for this band_id"
        );
    }

    #[test]
    fn test_error_wraps_violations() {
        let err: Error = ValidationError::NotFound { field: "artist_id" }.into();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "validation error: artist_id not found");
    }

    #[test]
    fn test_violations_display_joins() {
        let violations = Violations::new(vec![
            ValidationError::NotNull {
                entity: "Band",
                field: "session_id",
            },
            ValidationError::NotFound { field: "genre_id" },
        ]);
        assert_eq!(
            violations.to_string(),
            "Band.session_id cannot be null; genre_id not found"
        );
    }
}
