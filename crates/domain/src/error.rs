//! Shared error-classification types used across crate boundaries (§7).

use std::fmt;

/// The seven-entry error taxonomy from spec §7. Every crate-level error
/// type exposes a `kind()` accessor returning one of these so the CLI
/// boundary can report failures uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Bad config / flags / profile; surfaced pre-run, no report emitted.
    Validation,
    /// Initial connect or health-check failure; fatal.
    Connectivity,
    /// Session acquisition exceeded its deadline; per-op error, non-fatal.
    PoolTimeout,
    /// The driver returned an error during statement execution; non-fatal.
    Statement,
    /// Caller-requested stop; clean termination with a partial report.
    Cancellation,
    /// Timeline storage cap exceeded, or file I/O failure.
    Storage,
    /// Invariant violation; aborts with a diagnostic.
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::Connectivity => "connectivity",
            Self::PoolTimeout => "pool_timeout",
            Self::Statement => "statement",
            Self::Cancellation => "cancellation",
            Self::Storage => "storage",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Sub-classification of a per-statement driver error, and the unified
/// key under which per-operation error counts are bucketed
/// (`OperationStats::error_kind_map`). `PoolTimeout` folds spec §7's
/// `pool_timeout` axis into this same enum, since `increment_error(op,
/// kind)` takes one kind value per spec §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The statement or the acquisition exceeded its deadline.
    Timeout,
    /// A connection-level failure (reset, broken pipe, TLS failure).
    Connection,
    /// A serialization-failure class (e.g. Postgres `40001`/`40P01`).
    Serialization,
    /// A constraint violation (unique/foreign-key/check).
    Constraint,
    /// Session acquisition exceeded its deadline.
    PoolTimeout,
    /// Anything not classified above.
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::Connection => "connection",
            Self::Serialization => "serialization",
            Self::Constraint => "constraint",
            Self::PoolTimeout => "pool_timeout",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// Classify a `sqlx::Error` into an [`ErrorKind`] by error-class matching,
/// per spec §4.4 / §7.
#[must_use]
pub fn classify_sqlx_error(err: &sqlx::Error) -> ErrorKind {
    match err {
        sqlx::Error::PoolTimedOut => ErrorKind::PoolTimeout,
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolClosed => {
            ErrorKind::Connection
        }
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string());
            match code.as_deref() {
                // Serialization failure / deadlock detected.
                Some("40001" | "40P01") => ErrorKind::Serialization,
                // Class 23 - integrity constraint violation.
                Some(c) if c.starts_with("23") => ErrorKind::Constraint,
                _ => ErrorKind::Other,
            }
        }
        _ => ErrorKind::Other,
    }
}

// `sqlx` is only pulled in for its `Error`/`Database` types used above; it
// is re-exported through `domain` so downstream crates classify errors
// consistently without each redeclaring the match arms.
pub use sqlx;

#[cfg(test)]
mod tests {
    use super::ErrorClass;

    #[test]
    fn display_matches_taxonomy_names() {
        assert_eq!(ErrorClass::PoolTimeout.to_string(), "pool_timeout");
        assert_eq!(ErrorClass::Statement.to_string(), "statement");
    }
}
