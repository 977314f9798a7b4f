//! Error types for pgadapter.

use thiserror::Error;

/// The main error type for adapter operations.
///
/// Schema drift is deliberately absent: a mismatch between declared and live
/// schema is reported as an [`EntityPlan`](crate::migrate::EntityPlan), not as
/// an error.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The query executor failed to run a statement.
    #[error("Database error: {0}")]
    Transport(String),

    /// An aggregate query returned no row, or a row of the wrong shape.
    #[error("{0}")]
    Aggregate(String),

    /// No entity with this name has been registered.
    #[error("Unknown entity: '{0}'")]
    UnknownEntity(String),

    /// A value could not be encoded for its attribute type.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// A filter document did not have a recognised shape.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdapterError {
    /// Create an aggregate-shape error.
    pub fn aggregate(message: impl Into<String>) -> Self {
        Self::Aggregate(message.into())
    }

    /// Create an invalid-value error.
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue(message.into())
    }

    /// Create an invalid-filter error.
    pub fn invalid_filter(message: impl Into<String>) -> Self {
        Self::InvalidFilter(message.into())
    }

    /// True when the error came from the executor rather than from local checks.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<sqlx::Error> for AdapterError {
    fn from(e: sqlx::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Result type alias for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;
