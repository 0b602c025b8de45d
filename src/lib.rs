//! scopedb: thread-scoped lazy connections and nested transactions
//!
//! Every thread gets its own execution context holding at most one physical
//! connection, opened on the first statement and closed when the outermost
//! scope ends. Transaction scopes nest freely; only the outermost one commits
//! or rolls back, and a failure anywhere inside makes it roll back.
//!
//! ```
//! use scopedb::driver::memory::{Event, MemoryConnector};
//! use scopedb::{params, Engine, EngineConfig, Value};
//!
//! let driver = MemoryConnector::new();
//! let engine = Engine::new(EngineConfig::new("test", "root"), driver.clone());
//!
//! engine.with_transaction(|| {
//!     scopedb::insert("user", [("id", Value::from(1)), ("name", Value::from("alice"))])?;
//!     // Joins the outer transaction instead of committing on its own
//!     scopedb::with_transaction(|| {
//!         scopedb::update("update user set name = ? where id = ?", &params!["bob", 1])
//!     })?;
//!     Ok::<_, scopedb::Error>(())
//! })?;
//!
//! assert_eq!(driver.count(|e| matches!(e, Event::Commit { .. })), 1);
//! # Ok::<(), scopedb::Error>(())
//! ```
//!
//! Statements are written with `?` placeholders and rewritten to the driver's
//! native style before execution. The database driver itself is pluggable
//! through the traits in [`driver`].

pub mod connection;
pub mod driver;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod query;
pub mod row;
pub mod scope;
pub mod value;

pub use connection::{ExecutionContext, LazyConnection};
pub use engine::{create_engine, initialize, Engine, EngineConfig, EngineConfigBuilder};
pub use error::{DriverError, Error, Result};
pub use query::{insert, select, select_int, select_one, select_scalar, update, Placeholder};
pub use row::Row;
pub use scope::{with_connection, with_transaction, ConnectionScope, TransactionScope};
pub use value::{FromValue, Value};
