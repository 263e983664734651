//! Error types for the dataset view pipeline

use crate::join::JoinConditionError;
use thiserror::Error;

/// Errors raised anywhere between join text and a verified view
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Cannot establish or verify a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Introspection failed (distinct from "not found", which is an empty result)
    #[error("Schema lookup error: {0}")]
    SchemaLookupError(String),

    /// Malformed input that never reaches execution
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The view text generator failed or produced unusable SQL
    #[error("Generation error: {0}")]
    GenerationError(String),

    /// SQL execution failed; carries the driver message unchanged
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// The statement ran but the view could not be found afterwards
    #[error("View creation error: view '{0}' was not found after CREATE VIEW")]
    ViewCreationError(String),

    /// Dataset registry write or read failed
    #[error("Registry error: {0}")]
    RegistryError(String),

    /// Metadata cache write or read failed
    #[error("Metadata cache error: {0}")]
    CacheError(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// sqlx database error
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<JoinConditionError> for DatabaseError {
    fn from(err: JoinConditionError) -> Self {
        DatabaseError::ValidationError(err.to_string())
    }
}

impl DatabaseError {
    /// True for errors that were caught before anything touched the database
    pub fn is_validation(&self) -> bool {
        matches!(self, DatabaseError::ValidationError(_))
    }

    /// True for errors that mean the connection itself is unusable
    pub fn is_connection(&self) -> bool {
        match self {
            DatabaseError::ConnectionError(_) => true,
            DatabaseError::Sqlx(err) => is_connection_error(err),
            _ => false,
        }
    }
}

/// The database's own message for statement failures, the sqlx rendering otherwise
pub(crate) fn driver_message(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db_err) => db_err.message().to_string(),
        other => other.to_string(),
    }
}

/// Check if a sqlx error is connection-related rather than statement-related
pub(crate) fn is_connection_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolClosed
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => true,
        sqlx::Error::Database(db_err) => {
            let msg = db_err.message().to_lowercase();
            msg.contains("connection")
                || msg.contains("broken pipe")
                || msg.contains("reset by peer")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_condition_error_becomes_validation_error() {
        let err: DatabaseError = JoinConditionError::Empty.into();
        assert!(err.is_validation());
        assert!(err.to_string().contains("cannot be empty"));
    }

    #[test]
    fn test_pool_closed_is_connection_error() {
        let err = DatabaseError::Sqlx(sqlx::Error::PoolClosed);
        assert!(err.is_connection());
        assert!(!DatabaseError::ExecutionError("syntax error".into()).is_connection());
    }
}
