//! Lazily opened connection

use super::state::ConnectionState;
use crate::driver::{Cursor, PhysicalConnection};
use crate::engine::Engine;
use crate::{Error, Result};

/// Wraps at most one physical connection, opened on the first cursor request
///
/// A scope that never runs a statement never touches the network.
pub struct LazyConnection {
    engine: Engine,
    physical: Option<Box<dyn PhysicalConnection>>,
    state: ConnectionState,
}

impl LazyConnection {
    /// Create a pending connection bound to `engine`
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            physical: None,
            state: ConnectionState::Pending,
        }
    }

    /// Engine the connection is opened from
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether a physical connection is open
    pub fn is_open(&self) -> bool {
        self.physical.is_some()
    }

    /// Open a cursor, connecting first if needed
    pub fn cursor(&mut self) -> Result<Box<dyn Cursor + '_>> {
        if self.physical.is_none() {
            if self.state == ConnectionState::Closed {
                return Err(Error::InvalidState {
                    expected: ConnectionState::Pending.to_string(),
                    actual: self.state.to_string(),
                });
            }
            let conn = self.engine.connect()?;
            self.state.transition(ConnectionState::Open)?;
            self.physical = Some(conn);
        }
        self.physical_mut()?.cursor().map_err(Error::Cursor)
    }

    /// Commit the open transaction
    pub fn commit(&mut self) -> Result<()> {
        self.physical_mut()?.commit().map_err(|source| Error::Commit {
            source,
            rollback: None,
        })
    }

    /// Roll back the open transaction
    pub fn rollback(&mut self) -> Result<()> {
        self.physical_mut()?.rollback().map_err(Error::Rollback)
    }

    /// Commit; if that fails, roll back and report both outcomes
    pub fn commit_or_rollback(&mut self) -> Result<()> {
        let physical = self.physical_mut()?;
        match physical.commit() {
            Ok(()) => Ok(()),
            Err(source) => {
                crate::metrics::counters::commit_failed();
                tracing::warn!(error = %source, "commit failed, rolling back");
                let rollback = physical.rollback().err();
                if let Some(ref err) = rollback {
                    tracing::error!(error = %err, "rollback after failed commit also failed");
                }
                Err(Error::Commit { source, rollback })
            }
        }
    }

    /// Close the physical connection, if one is open
    ///
    /// Idempotent: closing a closed or never-opened connection is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        self.state.transition(ConnectionState::Closed)?;
        match self.physical.take() {
            Some(mut physical) => {
                tracing::info!(engine = self.engine.id(), "closing connection");
                crate::metrics::counters::connection_closed();
                physical.close().map_err(Error::Close)
            }
            None => Ok(()),
        }
    }

    fn physical_mut(&mut self) -> Result<&mut (dyn PhysicalConnection + 'static)> {
        self.physical
            .as_deref_mut()
            .ok_or(Error::NoActiveConnection)
    }
}

impl std::fmt::Debug for LazyConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyConnection")
            .field("engine", &self.engine.id())
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::memory::{Event, Fault, MemoryConnector};
    use crate::engine::EngineConfig;

    fn lazy(driver: &MemoryConnector) -> LazyConnection {
        LazyConnection::new(Engine::new(EngineConfig::new("db", "u"), driver.clone()))
    }

    #[test]
    fn test_connects_on_first_cursor_only() {
        let driver = MemoryConnector::new();
        let mut conn = lazy(&driver);
        assert!(!conn.is_open());
        assert!(driver.events().is_empty());

        drop(conn.cursor().unwrap());
        drop(conn.cursor().unwrap());
        assert!(conn.is_open());
        assert_eq!(conn.state(), ConnectionState::Open);
        assert_eq!(driver.count(|e| matches!(e, Event::Connect { .. })), 1);
    }

    #[test]
    fn test_commit_and_rollback_require_connection() {
        let driver = MemoryConnector::new();
        let mut conn = lazy(&driver);
        assert!(matches!(conn.commit(), Err(Error::NoActiveConnection)));
        assert!(matches!(conn.rollback(), Err(Error::NoActiveConnection)));
    }

    #[test]
    fn test_rollback_invokes_driver() {
        let driver = MemoryConnector::new();
        let mut conn = lazy(&driver);
        drop(conn.cursor().unwrap());
        conn.rollback().unwrap();
        assert_eq!(driver.count(|e| matches!(e, Event::Rollback { .. })), 1);
    }

    #[test]
    fn test_commit_failure_rolls_back() {
        let driver = MemoryConnector::new();
        let mut conn = lazy(&driver);
        drop(conn.cursor().unwrap());
        driver.fail(Fault::Commit);

        let err = conn.commit_or_rollback().unwrap_err();
        assert!(matches!(err, Error::Commit { rollback: None, .. }));
        assert_eq!(driver.count(|e| matches!(e, Event::Rollback { .. })), 1);
    }

    #[test]
    fn test_commit_failure_reports_rollback_failure() {
        let driver = MemoryConnector::new();
        let mut conn = lazy(&driver);
        drop(conn.cursor().unwrap());
        driver.fail(Fault::Commit);
        driver.fail(Fault::Rollback);

        let err = conn.commit_or_rollback().unwrap_err();
        assert!(matches!(err, Error::Commit { rollback: Some(_), .. }));
    }

    #[test]
    fn test_close_is_idempotent() {
        let driver = MemoryConnector::new();
        let mut conn = lazy(&driver);
        drop(conn.cursor().unwrap());
        conn.close().unwrap();
        conn.close().unwrap();
        assert_eq!(driver.count(|e| matches!(e, Event::Close { .. })), 1);
        assert!(matches!(conn.cursor(), Err(Error::InvalidState { .. })));
    }

    #[test]
    fn test_close_unopened_never_connects() {
        let driver = MemoryConnector::new();
        let mut conn = lazy(&driver);
        conn.close().unwrap();
        assert!(driver.events().is_empty());
    }

    #[test]
    fn test_connect_failure_leaves_pending() {
        let driver = MemoryConnector::new();
        driver.fail(Fault::Connect);
        let mut conn = lazy(&driver);
        assert!(matches!(conn.cursor(), Err(Error::Connection(_))));
        assert_eq!(conn.state(), ConnectionState::Pending);

        driver.heal();
        assert!(conn.cursor().is_ok());
    }
}
