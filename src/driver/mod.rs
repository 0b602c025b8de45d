//! Driver boundary
//!
//! The connection layer never talks to a database directly. A driver supplies:
//! * a [`Connector`] that opens physical connections from an [`EngineConfig`]
//! * a [`PhysicalConnection`] with cursor/commit/rollback/close
//! * a [`Cursor`] that executes one parameterized statement and fetches rows
//!
//! [`memory`] ships a recording in-memory driver used by tests, benches and demos.

pub mod memory;

use crate::engine::EngineConfig;
use crate::error::DriverError;
use crate::query::Placeholder;
use crate::value::Value;

/// Result type used across the driver boundary
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Opens physical connections
///
/// Called concurrently from every thread that needs a connection, so it must
/// not share mutable state between the connections it produces.
pub trait Connector: Send + Sync + 'static {
    /// Open a new physical connection
    fn connect(&self, config: &EngineConfig) -> DriverResult<Box<dyn PhysicalConnection>>;

    /// Native placeholder style of the driver
    fn placeholder(&self) -> Placeholder {
        Placeholder::Format
    }
}

/// A live database session owned by a single execution context
pub trait PhysicalConnection {
    /// Open a cursor for one statement
    fn cursor(&mut self) -> DriverResult<Box<dyn Cursor + '_>>;

    /// Commit the current transaction
    fn commit(&mut self) -> DriverResult<()>;

    /// Roll back the current transaction
    fn rollback(&mut self) -> DriverResult<()>;

    /// Close the session
    fn close(&mut self) -> DriverResult<()>;
}

/// Statement cursor
pub trait Cursor {
    /// Execute a statement written in the driver's native placeholder style
    fn execute(&mut self, sql: &str, args: &[Value]) -> DriverResult<()>;

    /// Column names of the last result set, `None` for statements without one
    fn description(&self) -> Option<&[String]>;

    /// Fetch the next row
    fn fetch_one(&mut self) -> DriverResult<Option<Vec<Value>>>;

    /// Fetch all remaining rows
    fn fetch_all(&mut self) -> DriverResult<Vec<Vec<Value>>>;

    /// Rows affected by the last write statement
    fn row_count(&self) -> u64;

    /// Release the cursor
    fn close(&mut self) -> DriverResult<()>;
}
