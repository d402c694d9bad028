//! Shared helpers for Diesel repository implementations.
//!
//! This module provides:
//! - constraint violation classification by PostgreSQL constraint name
//! - the fallback mapping of Diesel errors onto query/connection variants
//! - count casting between SQL `bigint` and `usize`

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

/// Integrity violation reported by PostgreSQL, with the constraint name when
/// the server provided one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConstraintViolation<'a> {
    Unique(Option<&'a str>),
    ForeignKey(Option<&'a str>),
}

impl<'a> ConstraintViolation<'a> {
    /// Classify `error`; `None` for anything that is not an integrity
    /// violation.
    pub(crate) fn of(error: &'a DieselError) -> Option<Self> {
        match error {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                Some(Self::Unique(info.constraint_name()))
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                Some(Self::ForeignKey(info.constraint_name()))
            }
            _ => None,
        }
    }

    /// Whether the violated constraint is `name`.
    pub(crate) fn is(&self, name: &str) -> bool {
        match self {
            Self::Unique(constraint) | Self::ForeignKey(constraint) => *constraint == Some(name),
        }
    }
}

/// Map common Diesel error variants into query/connection constructors.
///
/// Callers match the violations they understand first and fall back to this
/// for everything else.
pub(crate) fn map_basic_diesel_error<E, Q, C>(error: DieselError, query: Q, connection: C) -> E
where
    Q: Fn(&'static str) -> E,
    C: Fn(&'static str) -> E,
{
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(
                ?kind,
                message = info.message(),
                constraint = info.constraint_name(),
                "diesel operation failed"
            );
        }
        _ => debug!(%error, "diesel operation failed"),
    }

    match error {
        DieselError::NotFound => query("record not found"),
        DieselError::QueryBuilderError(_) => query("database query error"),
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _)
        | DieselError::BrokenTransactionManager => connection("database connection error"),
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            query("unexpected unique violation")
        }
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
            query("unexpected foreign key violation")
        }
        DieselError::DatabaseError(DatabaseErrorKind::CheckViolation, _) => {
            query("check constraint violated")
        }
        _ => query("database error"),
    }
}

/// Cast an SQL `count(*)` to `usize`; negative counts cannot occur.
pub(crate) fn cast_count(count: i64) -> usize {
    usize::try_from(count).unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Synthetic Diesel errors for mapping tests.

    use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};

    struct ErrorInfo {
        message: String,
        constraint: Option<String>,
    }

    impl DatabaseErrorInformation for ErrorInfo {
        fn message(&self) -> &str {
            &self.message
        }

        fn details(&self) -> Option<&str> {
            None
        }

        fn hint(&self) -> Option<&str> {
            None
        }

        fn table_name(&self) -> Option<&str> {
            None
        }

        fn column_name(&self) -> Option<&str> {
            None
        }

        fn constraint_name(&self) -> Option<&str> {
            self.constraint.as_deref()
        }

        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    pub(crate) fn database_error(kind: DatabaseErrorKind, constraint: Option<&str>) -> DieselError {
        DieselError::DatabaseError(
            kind,
            Box::new(ErrorInfo {
                message: format!("{kind:?}"),
                constraint: constraint.map(str::to_owned),
            }),
        )
    }
}
