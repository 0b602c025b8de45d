//! Per-thread execution context
//!
//! Each thread owns one [`ExecutionContext`] holding its lazy connection and
//! transaction depth. The state is never visible to other threads, so it needs
//! no locking; the scope guards are the only code that initializes or tears it
//! down.

use super::lazy::LazyConnection;
use crate::driver::Cursor;
use crate::engine::Engine;
use crate::{Error, Result};
use std::cell::RefCell;

thread_local! {
    static CURRENT: RefCell<ExecutionContext> = RefCell::new(ExecutionContext::new());
}

/// How the exit of a transaction scope resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransactionEnd {
    /// Still inside an outer transaction at this depth
    Nested(usize),
    /// Committed at depth zero
    Committed,
    /// Rolled back at depth zero
    RolledBack,
    /// Depth zero reached without any statement; nothing to finish
    Empty,
}

/// Connection and transaction state of one thread
///
/// Invariant: `transaction_depth > 0` implies an initialized connection.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    connection: Option<LazyConnection>,
    transaction_depth: usize,
    rollback_only: bool,
}

impl ExecutionContext {
    /// Create an uninitialized context
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a connection is held
    pub fn is_initialized(&self) -> bool {
        self.connection.is_some()
    }

    /// Bind a fresh lazy connection on `engine`, resetting the depth
    pub fn initialize(&mut self, engine: Engine) -> Result<()> {
        if self.is_initialized() {
            return Err(Error::AlreadyInitialized("execution context"));
        }
        self.connection = Some(LazyConnection::new(engine));
        self.transaction_depth = 0;
        self.rollback_only = false;
        Ok(())
    }

    /// Engine of the held connection
    pub fn engine(&self) -> Option<&Engine> {
        self.connection.as_ref().map(LazyConnection::engine)
    }

    /// The held connection
    pub fn connection(&mut self) -> Result<&mut LazyConnection> {
        self.connection
            .as_mut()
            .ok_or(Error::NotInitialized("execution context"))
    }

    /// Open a cursor on the held connection
    pub fn cursor(&mut self) -> Result<Box<dyn Cursor + '_>> {
        self.connection()?.cursor()
    }

    /// Number of open transaction scopes
    pub fn transaction_depth(&self) -> usize {
        self.transaction_depth
    }

    /// Whether a nested scope failed and the outermost one must roll back
    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    /// Close the held connection and reset the context
    ///
    /// A transaction still open at this point is rolled back first.
    pub fn teardown(&mut self) -> Result<()> {
        let Some(mut conn) = self.connection.take() else {
            return Ok(());
        };
        if self.transaction_depth > 0 {
            tracing::warn!(
                depth = self.transaction_depth,
                "connection released inside an open transaction, rolling back"
            );
            if conn.is_open() {
                if let Err(e) = conn.rollback() {
                    crate::metrics::counters::cleanup_failed("teardown_rollback");
                    tracing::error!(error = %e, "rollback during teardown failed");
                }
            }
        }
        self.transaction_depth = 0;
        self.rollback_only = false;
        conn.close()
    }

    /// Enter a transaction scope, returning the new depth
    pub(crate) fn begin_transaction(&mut self) -> Result<usize> {
        if !self.is_initialized() {
            return Err(Error::NotInitialized("execution context"));
        }
        if self.transaction_depth == 0 {
            self.rollback_only = false;
        }
        self.transaction_depth += 1;
        Ok(self.transaction_depth)
    }

    /// Leave a transaction scope
    ///
    /// A failed exit at any depth marks the transaction rollback-only. At depth
    /// zero the physical connection is committed or rolled back exactly once.
    /// A successful outermost exit over a rollback-only transaction rolls back
    /// and reports [`Error::RollbackOnly`].
    pub(crate) fn end_transaction(&mut self, success: bool) -> Result<TransactionEnd> {
        if self.transaction_depth == 0 {
            return Err(Error::InvalidState {
                expected: "open transaction".into(),
                actual: "transaction depth 0".into(),
            });
        }
        self.transaction_depth -= 1;
        if !success {
            self.rollback_only = true;
        }
        if self.transaction_depth > 0 {
            return Ok(TransactionEnd::Nested(self.transaction_depth));
        }

        let rollback_only = std::mem::take(&mut self.rollback_only);
        let conn = self.connection()?;
        let end = if !conn.is_open() {
            TransactionEnd::Empty
        } else if rollback_only {
            let result = conn.rollback();
            crate::metrics::counters::transaction_finished(crate::metrics::labels::OUTCOME_ROLLBACK);
            result?;
            TransactionEnd::RolledBack
        } else {
            match conn.commit_or_rollback() {
                Ok(()) => {
                    crate::metrics::counters::transaction_finished(
                        crate::metrics::labels::OUTCOME_COMMIT,
                    );
                    TransactionEnd::Committed
                }
                Err(e) => {
                    crate::metrics::counters::transaction_finished(
                        crate::metrics::labels::OUTCOME_ROLLBACK,
                    );
                    return Err(e);
                }
            }
        };

        if success && rollback_only {
            return Err(Error::RollbackOnly);
        }
        Ok(end)
    }
}

/// Run `f` with this thread's context
///
/// `f` must not call back into the crate; the context is mutably borrowed for
/// the duration of the call.
pub(crate) fn with_current<R>(f: impl FnOnce(&mut ExecutionContext) -> R) -> R {
    CURRENT.with(|cell| f(&mut cell.borrow_mut()))
}

/// Like [`with_current`], but `None` while the thread is being torn down
pub(crate) fn try_with_current<R>(f: impl FnOnce(&mut ExecutionContext) -> R) -> Option<R> {
    CURRENT.try_with(|cell| f(&mut cell.borrow_mut())).ok()
}

/// Whether this thread currently holds a connection scope
pub fn is_active() -> bool {
    CURRENT.with(|cell| cell.borrow().is_initialized())
}

/// Number of transaction scopes open on this thread
pub fn transaction_depth() -> usize {
    CURRENT.with(|cell| cell.borrow().transaction_depth())
}
