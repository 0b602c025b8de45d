//! Recording in-memory driver
//!
//! Does not parse SQL. Result sets are scripted up front and matched against
//! executed statements by substring; every driver call is appended to an event
//! log that tests inspect afterwards. Faults can be injected per operation.
//!
//! ```
//! use scopedb::driver::memory::{Event, MemoryConnector, ResultSet};
//! use scopedb::{params, Engine, EngineConfig, Value};
//!
//! let driver = MemoryConnector::new();
//! driver.script("from users", ResultSet::rows(&["id"], vec![vec![Value::Int(1)]]));
//!
//! let engine = Engine::new(EngineConfig::new("test", "root"), driver.clone());
//! let id = engine
//!     .with_connection(|| scopedb::select_int("select id from users where id = ?", &params![1]))
//!     .unwrap();
//!
//! assert_eq!(id, Some(1));
//! assert_eq!(driver.count(|e| matches!(e, Event::Close { .. })), 1);
//! ```

use super::{Connector, Cursor, DriverResult, PhysicalConnection};
use crate::engine::EngineConfig;
use crate::error::DriverError;
use crate::query::Placeholder;
use crate::value::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One observed driver call
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Physical connection opened
    Connect {
        /// Connection id
        conn: u64,
    },
    /// Statement executed
    Execute {
        /// Connection id
        conn: u64,
        /// Native SQL
        sql: String,
        /// Bound arguments
        args: Vec<Value>,
    },
    /// Cursor closed
    CursorClosed {
        /// Connection id
        conn: u64,
    },
    /// Commit issued
    Commit {
        /// Connection id
        conn: u64,
    },
    /// Rollback issued
    Rollback {
        /// Connection id
        conn: u64,
    },
    /// Physical connection closed
    Close {
        /// Connection id
        conn: u64,
    },
}

impl Event {
    /// Id of the connection the event belongs to
    pub fn conn(&self) -> u64 {
        match self {
            Event::Connect { conn }
            | Event::Execute { conn, .. }
            | Event::CursorClosed { conn }
            | Event::Commit { conn }
            | Event::Rollback { conn }
            | Event::Close { conn } => *conn,
        }
    }
}

/// Driver operation that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Opening a connection
    Connect,
    /// Executing any statement
    Execute,
    /// Committing
    Commit,
    /// Rolling back
    Rollback,
    /// Closing the connection
    Close,
    /// Closing a cursor
    CursorClose,
}

/// Scripted statement result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    columns: Option<Vec<String>>,
    rows: Vec<Vec<Value>>,
    row_count: u64,
}

impl ResultSet {
    /// Result with columns and rows
    pub fn rows(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        let row_count = rows.len() as u64;
        Self {
            columns: Some(columns.iter().map(|c| c.to_string()).collect()),
            rows,
            row_count,
        }
    }

    /// Write result affecting `n` rows
    pub fn affected(n: u64) -> Self {
        Self {
            columns: None,
            rows: Vec::new(),
            row_count: n,
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    next_conn: u64,
    events: Vec<Event>,
    scripts: Vec<(String, ResultSet)>,
    faults: Vec<Fault>,
    failing_statements: Vec<String>,
}

impl Shared {
    fn check(&self, fault: Fault) -> DriverResult<()> {
        if self.faults.contains(&fault) {
            return Err(DriverError::new(format!("injected {:?} failure", fault)));
        }
        Ok(())
    }
}

/// In-memory [`Connector`] that records every call
///
/// Clones share the same script, faults and event log.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    shared: Arc<Mutex<Shared>>,
    placeholder: Placeholder,
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConnector {
    /// Create a connector using `%s` placeholders
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            placeholder: Placeholder::Format,
        }
    }

    /// Use a different native placeholder style
    pub fn with_placeholder(mut self, placeholder: Placeholder) -> Self {
        self.placeholder = placeholder;
        self
    }

    /// Return `result` for statements containing `pattern`
    ///
    /// Earlier scripts win when several patterns match.
    pub fn script(&self, pattern: impl Into<String>, result: ResultSet) {
        self.lock().scripts.push((pattern.into(), result));
    }

    /// Make an operation fail until [`heal`](Self::heal) is called
    pub fn fail(&self, fault: Fault) {
        self.lock().faults.push(fault);
    }

    /// Make statements containing `pattern` fail on execute
    pub fn fail_statement(&self, pattern: impl Into<String>) {
        self.lock().failing_statements.push(pattern.into());
    }

    /// Remove all injected faults
    pub fn heal(&self) {
        let mut shared = self.lock();
        shared.faults.clear();
        shared.failing_statements.clear();
    }

    /// Snapshot of the event log
    pub fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    /// Events of one connection
    pub fn events_for(&self, conn: u64) -> Vec<Event> {
        self.lock()
            .events
            .iter()
            .filter(|e| e.conn() == conn)
            .cloned()
            .collect()
    }

    /// Number of events matching a predicate
    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.lock().events.iter().filter(|e| pred(e)).count()
    }

    /// Executed statements with their arguments, in order
    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Execute { sql, args, .. } => Some((sql.clone(), args.clone())),
                _ => None,
            })
            .collect()
    }

    /// Clear the event log
    pub fn clear_events(&self) {
        self.lock().events.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, _config: &EngineConfig) -> DriverResult<Box<dyn PhysicalConnection>> {
        let mut shared = self.lock();
        shared.check(Fault::Connect)?;
        shared.next_conn += 1;
        let id = shared.next_conn;
        shared.events.push(Event::Connect { conn: id });
        Ok(Box::new(MemoryConnection {
            id,
            shared: Arc::clone(&self.shared),
        }))
    }

    fn placeholder(&self) -> Placeholder {
        self.placeholder
    }
}

struct MemoryConnection {
    id: u64,
    shared: Arc<Mutex<Shared>>,
}

impl MemoryConnection {
    fn record(&self, fault: Fault, event: Event) -> DriverResult<()> {
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        shared.events.push(event);
        shared.check(fault)
    }
}

impl PhysicalConnection for MemoryConnection {
    fn cursor(&mut self) -> DriverResult<Box<dyn Cursor + '_>> {
        Ok(Box::new(MemoryCursor {
            conn: self.id,
            shared: Arc::clone(&self.shared),
            columns: None,
            rows: VecDeque::new(),
            row_count: 0,
        }))
    }

    fn commit(&mut self) -> DriverResult<()> {
        self.record(Fault::Commit, Event::Commit { conn: self.id })
    }

    fn rollback(&mut self) -> DriverResult<()> {
        self.record(Fault::Rollback, Event::Rollback { conn: self.id })
    }

    fn close(&mut self) -> DriverResult<()> {
        self.record(Fault::Close, Event::Close { conn: self.id })
    }
}

struct MemoryCursor {
    conn: u64,
    shared: Arc<Mutex<Shared>>,
    columns: Option<Vec<String>>,
    rows: VecDeque<Vec<Value>>,
    row_count: u64,
}

impl Cursor for MemoryCursor {
    fn execute(&mut self, sql: &str, args: &[Value]) -> DriverResult<()> {
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        shared.events.push(Event::Execute {
            conn: self.conn,
            sql: sql.to_string(),
            args: args.to_vec(),
        });
        shared.check(Fault::Execute)?;
        if let Some(pattern) = shared
            .failing_statements
            .iter()
            .find(|p| sql.contains(p.as_str()))
        {
            return Err(DriverError::new(format!(
                "injected failure for statement matching `{}`",
                pattern
            )));
        }

        let result = shared
            .scripts
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_default();
        self.columns = result.columns;
        self.rows = result.rows.into();
        self.row_count = result.row_count;
        Ok(())
    }

    fn description(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    fn fetch_one(&mut self) -> DriverResult<Option<Vec<Value>>> {
        Ok(self.rows.pop_front())
    }

    fn fetch_all(&mut self) -> DriverResult<Vec<Vec<Value>>> {
        Ok(self.rows.drain(..).collect())
    }

    fn row_count(&self) -> u64 {
        self.row_count
    }

    fn close(&mut self) -> DriverResult<()> {
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        shared.events.push(Event::CursorClosed { conn: self.conn });
        shared.check(Fault::CursorClose)
    }
}
