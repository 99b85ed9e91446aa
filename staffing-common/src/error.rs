//! Common error types for the staffing dashboard

use thiserror::Error;

/// Common result type for staffing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the data store, allocation engine and services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Write rejected by a uniqueness or reference constraint
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Translate SQLite constraint violations into domain errors.
    ///
    /// `what` names the entity being written, e.g. "role".
    /// Anything that is not a constraint violation stays a `Database` error.
    pub fn from_write(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Error::Conflict(format!("{} already exists", what));
            }
            if db_err.is_foreign_key_violation() {
                return Error::InvalidInput(format!("{} references a missing record", what));
            }
        }
        Error::Database(err)
    }

    /// Translate a foreign key violation on DELETE into a conflict.
    pub fn from_delete(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_foreign_key_violation() {
                return Error::Conflict(format!("{} is still referenced", what));
            }
        }
        Error::Database(err)
    }
}
