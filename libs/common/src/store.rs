//! Store outcomes
//!
//! Repositories report constraint violations as values instead of errors so
//! callers can branch on them. Anything that is not one of these outcomes is
//! a [`DatabaseError`].

use sqlx::error::ErrorKind;
use tracing::debug;

use crate::error::{DatabaseError, DatabaseResult};

/// Result of a store operation that may hit a relational constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome<T> {
    /// The operation committed
    Success(T),
    /// A unique or primary key constraint rejected the write
    UniqueViolation,
    /// A foreign key constraint rejected the write
    ForeignKeyViolation,
    /// A NOT NULL constraint rejected the write
    NullViolation,
    /// The targeted row does not exist
    NotFound,
}

impl<T> StoreOutcome<T> {
    /// Map the success value, keeping every violation as is
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> StoreOutcome<U> {
        match self {
            StoreOutcome::Success(value) => StoreOutcome::Success(f(value)),
            StoreOutcome::UniqueViolation => StoreOutcome::UniqueViolation,
            StoreOutcome::ForeignKeyViolation => StoreOutcome::ForeignKeyViolation,
            StoreOutcome::NullViolation => StoreOutcome::NullViolation,
            StoreOutcome::NotFound => StoreOutcome::NotFound,
        }
    }

    /// Return the success value, if any
    pub fn success(self) -> Option<T> {
        match self {
            StoreOutcome::Success(value) => Some(value),
            _ => None,
        }
    }
}

/// Result alias for operations that return a [`StoreOutcome`]
pub type StoreResult<T> = DatabaseResult<StoreOutcome<T>>;

/// Classify a sqlx error into a constraint outcome, or pass it on as a query error
pub fn classify<T>(err: sqlx::Error) -> StoreResult<T> {
    if let sqlx::Error::Database(db_err) = &err {
        let outcome = match db_err.kind() {
            ErrorKind::UniqueViolation => Some(StoreOutcome::UniqueViolation),
            ErrorKind::ForeignKeyViolation => Some(StoreOutcome::ForeignKeyViolation),
            ErrorKind::NotNullViolation => Some(StoreOutcome::NullViolation),
            _ => None,
        };

        if let Some(outcome) = outcome {
            debug!(
                constraint = db_err.constraint().unwrap_or_default(),
                "Store rejected write: {}",
                db_err.message()
            );
            return Ok(outcome);
        }
    }

    match err {
        sqlx::Error::RowNotFound => Ok(StoreOutcome::NotFound),
        other => Err(DatabaseError::Query(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_is_an_outcome() {
        let outcome: StoreOutcome<()> = classify(sqlx::Error::RowNotFound).unwrap();
        assert_eq!(outcome, StoreOutcome::NotFound);
    }

    #[test]
    fn test_other_errors_stay_errors() {
        let result: StoreResult<()> = classify(sqlx::Error::PoolTimedOut);
        assert!(matches!(result, Err(DatabaseError::Query(_))));
    }

    #[test]
    fn test_map_keeps_violations() {
        let ok = StoreOutcome::Success(2).map(|v| v * 10);
        assert_eq!(ok, StoreOutcome::Success(20));

        let dup: StoreOutcome<i32> = StoreOutcome::UniqueViolation;
        assert_eq!(dup.map(|v| v * 10), StoreOutcome::UniqueViolation);
        assert_eq!(StoreOutcome::Success("x").success(), Some("x"));
        assert_eq!(StoreOutcome::<()>::NotFound.success(), None);
    }
}
