//! Transaction scope guard

use super::connection::ConnectionScope;
use crate::connection::context::{try_with_current, with_current, TransactionEnd};
use crate::engine::Engine;
use crate::metrics::labels;
use crate::{Error, Result};
use std::time::Instant;

/// Guard for one level of a (possibly nested) transaction
///
/// Entering increments the thread's transaction depth; leaving decrements it.
/// Only the scope that brings the depth back to zero commits or rolls back the
/// physical connection. A failed exit at any level (an explicit
/// [`rollback`](Self::rollback), an early drop, a panic) makes the outermost
/// exit roll back.
///
/// The guard also holds a [`ConnectionScope`], so the outermost transaction on
/// a thread without a connection opens and later closes one.
#[derive(Debug)]
pub struct TransactionScope {
    connection: ConnectionScope,
    depth: usize,
    finished: bool,
    started: Instant,
}

impl TransactionScope {
    /// Begin a transaction level, using the process-wide engine if no
    /// connection is active
    pub fn enter() -> Result<Self> {
        Self::begin(None)
    }

    /// Begin a transaction level on `engine` if no connection is active
    pub fn enter_on(engine: &Engine) -> Result<Self> {
        Self::begin(Some(engine))
    }

    pub(crate) fn begin(engine: Option<&Engine>) -> Result<Self> {
        let connection = ConnectionScope::acquire(engine)?;
        let depth = with_current(|ctx| ctx.begin_transaction())?;
        tracing::debug!(depth, "begin transaction");
        Ok(Self {
            connection,
            depth,
            finished: false,
            started: Instant::now(),
        })
    }

    /// Depth of this level (1 for the outermost)
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Leave successfully; commits if this is the outermost level
    pub fn commit(mut self) -> Result<()> {
        self.finish(true)
    }

    /// Leave with failure; rolls back if this is the outermost level,
    /// otherwise marks the transaction rollback-only
    pub fn rollback(mut self) -> Result<()> {
        self.finish(false)
    }

    fn finish(&mut self, success: bool) -> Result<()> {
        self.finished = true;
        let span = tracing::debug_span!("transaction", depth = self.depth, success);
        let _guard = span.enter();

        let ended = try_with_current(|ctx| ctx.end_transaction(success))
            .unwrap_or(Err(Error::NotInitialized("execution context")));
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        match &ended {
            Ok(TransactionEnd::Nested(depth)) => {
                tracing::debug!(remaining = depth, "leave nested transaction");
            }
            Ok(TransactionEnd::Committed) => {
                tracing::debug!(elapsed_ms, "commit");
                crate::metrics::histograms::transaction_duration(labels::OUTCOME_COMMIT, elapsed_ms);
            }
            Ok(TransactionEnd::RolledBack) => {
                tracing::debug!(elapsed_ms, "rollback");
                crate::metrics::histograms::transaction_duration(
                    labels::OUTCOME_ROLLBACK,
                    elapsed_ms,
                );
            }
            Ok(TransactionEnd::Empty) => {
                tracing::debug!("transaction issued no statements");
            }
            Err(e) => {
                tracing::debug!(error = %e, elapsed_ms, "transaction failed");
                crate::metrics::histograms::transaction_duration(
                    labels::OUTCOME_ROLLBACK,
                    elapsed_ms,
                );
            }
        }

        let released = self.connection.release();
        match (ended, released) {
            (Err(e), Err(release_err)) => {
                crate::metrics::counters::cleanup_failed("transaction_scope");
                tracing::error!(error = %release_err, "failed to release connection after transaction error");
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(_), released) => released,
        }
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if std::thread::panicking() {
            tracing::warn!(depth = self.depth, "transaction scope unwound by panic, rolling back");
        } else {
            tracing::debug!(depth = self.depth, "transaction scope dropped without commit");
        }
        if let Err(e) = self.finish(false) {
            crate::metrics::counters::cleanup_failed("transaction_scope");
            tracing::error!(error = %e, "failed to finish transaction");
        }
    }
}
