//! Error types

use std::error::Error as StdError;
use std::fmt;

/// Boxed error produced by a driver implementation
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Failure reported by the driver boundary
///
/// Drivers wrap their native errors in this type so the connection layer can
/// carry them without knowing the concrete driver.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct DriverError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl DriverError {
    /// Create a driver error from a message
    pub fn new(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string(),
            source: None,
        }
    }

    /// Wrap a native driver error, keeping it as the source
    pub fn from_source<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Main error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Engine or execution context initialized twice
    #[error("{0} is already initialized")]
    AlreadyInitialized(&'static str),

    /// Operation attempted before the engine or context was initialized
    #[error("{0} is not initialized")]
    NotInitialized(&'static str),

    /// Commit or rollback requested but no physical connection is open
    #[error("no active connection")]
    NoActiveConnection,

    /// Driver failed to open a physical connection
    #[error("connection error: {0}")]
    Connection(#[source] DriverError),

    /// Driver failed to open or close a cursor
    #[error("cursor error: {0}")]
    Cursor(#[source] DriverError),

    /// Select statement failed
    #[error("query failed: {source} (sql: {sql})")]
    Query {
        /// Native SQL sent to the driver
        sql: String,
        /// Driver failure
        #[source]
        source: DriverError,
    },

    /// Write statement failed
    #[error("update failed: {source} (sql: {sql})")]
    Update {
        /// Native SQL sent to the driver
        sql: String,
        /// Driver failure
        #[source]
        source: DriverError,
    },

    /// Commit failed; a rollback was attempted afterwards
    #[error("commit failed: {source}{}", rollback_suffix(.rollback))]
    Commit {
        /// Commit failure
        #[source]
        source: DriverError,
        /// Failure of the recovery rollback, if it failed too
        rollback: Option<DriverError>,
    },

    /// Rollback failed
    #[error("rollback failed: {0}")]
    Rollback(#[source] DriverError),

    /// Closing the physical connection failed
    #[error("close failed: {0}")]
    Close(#[source] DriverError),

    /// Outermost transaction rolled back because a nested scope failed
    #[error("transaction rolled back: a nested transaction scope failed")]
    RollbackOnly,

    /// Scalar select over a result that does not have exactly one column
    #[error("expected exactly one column, found {0}")]
    MultiColumn(usize),

    /// Bound argument count does not match the placeholders in the statement
    #[error("statement has {expected} placeholders but {actual} arguments were given")]
    ArgumentCount {
        /// Placeholders found in the SQL
        expected: usize,
        /// Arguments supplied
        actual: usize,
    },

    /// Invalid argument to an operation
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Row has no column with that name
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// Value could not be converted to the requested type
    #[error("type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        /// Requested type
        expected: &'static str,
        /// Stored value kind
        actual: &'static str,
    },

    /// Invalid state transition
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// Configuration error
    #[error("invalid configuration: {0}")]
    Config(String),
}

fn rollback_suffix(rollback: &Option<DriverError>) -> String {
    match rollback {
        Some(err) => format!(" (rollback also failed: {})", err),
        None => String::new(),
    }
}

impl Error {
    /// Whether this error came from the driver rather than from misuse of the API
    pub fn is_driver_error(&self) -> bool {
        matches!(
            self,
            Error::Connection(_)
                | Error::Cursor(_)
                | Error::Query { .. }
                | Error::Update { .. }
                | Error::Commit { .. }
                | Error::Rollback(_)
                | Error::Close(_)
        )
    }

    /// Native SQL of the failing statement, for query and update errors
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query { sql, .. } | Error::Update { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
