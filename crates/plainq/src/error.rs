//! Error types for plainq

use crate::mapping::MappingError;
use thiserror::Error;

/// Result type alias for plainq operations
pub type DbResult<T> = Result<T, DbError>;

/// Error types for database operations
#[derive(Debug, Error)]
pub enum DbError {
    /// Result columns are not compatible with the destination type.
    #[error("{0}")]
    Mapping(#[from] MappingError),

    /// A generated-key insert was requested for a table without an identity column.
    #[error("Auto increment column not found in table '{table}'.")]
    AutoIncrementNotFound { table: String },

    /// UPDATE / DELETE / get-by-key against a table without key columns.
    #[error("Key columns not found in table '{table}'.")]
    NoKeyColumns { table: String },

    /// No dialect is registered for the connection's driver.
    #[error("Unknown connection type '{0}'")]
    UnknownConnectionType(String),

    /// Error reported by tokio-postgres
    #[cfg(feature = "postgres")]
    #[error("Postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Error reported by tiberius
    #[cfg(feature = "mssql")]
    #[error("SQL Server error: {0}")]
    SqlServer(#[from] tiberius::error::Error),

    /// Socket-level error while opening a connection
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// More rows than the operation allows
    #[error("Too many rows: expected {expected}, got {got}")]
    TooManyRows { expected: usize, got: usize },

    /// Row decode error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Invalid input (bad identifiers, unbindable parameters, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl DbError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a too-many-rows error
    pub fn too_many_rows(expected: usize, got: usize) -> Self {
        Self::TooManyRows { expected, got }
    }

    /// Check if this is a mapping error
    pub fn is_mapping(&self) -> bool {
        matches!(self, Self::Mapping(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// The mapping diagnostic, if this is a mapping error.
    pub fn as_mapping(&self) -> Option<&MappingError> {
        match self {
            Self::Mapping(e) => Some(e),
            _ => None,
        }
    }
}
