//! Scoped acquisition of connections and transactions
//!
//! Two guards and two wrappers:
//! * [`ConnectionScope`] / [`with_connection`]: share one connection across a call tree
//! * [`TransactionScope`] / [`with_transaction`]: nested transactions that commit once

mod connection;
mod transaction;

pub use connection::ConnectionScope;
pub use transaction::TransactionScope;

use crate::engine::Engine;
use crate::Error;

/// Run `f` with a connection scope active on this thread
///
/// Statements issued by `f`, and by anything it calls, share one physical
/// connection, which is closed when the outermost scope ends. An error from
/// `f` takes precedence over an error closing the connection; the latter is
/// logged.
///
/// ```no_run
/// use scopedb::{with_connection, params};
///
/// let total = with_connection(|| {
///     let users = scopedb::select_int("select count(*) from user", &[])?;
///     let posts = scopedb::select_int("select count(*) from post where user_id = ?", &params![1])?;
///     Ok::<_, scopedb::Error>(users.unwrap_or(0) + posts.unwrap_or(0))
/// })?;
/// # Ok::<(), scopedb::Error>(())
/// ```
pub fn with_connection<T, E, F>(f: F) -> std::result::Result<T, E>
where
    F: FnOnce() -> std::result::Result<T, E>,
    E: From<Error>,
{
    run_with_connection(None, f)
}

/// Run `f` inside a transaction scope on this thread
///
/// `Ok` commits when this is the outermost transaction; `Err` (or a panic)
/// rolls back. Nested calls join the outer transaction, and a failure in any
/// of them makes the outermost one roll back. An error from `f` takes
/// precedence over a rollback or close failure, which is logged.
///
/// ```no_run
/// use scopedb::{with_transaction, params};
///
/// with_transaction(|| {
///     scopedb::update("update account set balance = balance - ? where id = ?", &params![10, 1])?;
///     scopedb::update("update account set balance = balance + ? where id = ?", &params![10, 2])?;
///     Ok::<_, scopedb::Error>(())
/// })?;
/// # Ok::<(), scopedb::Error>(())
/// ```
pub fn with_transaction<T, E, F>(f: F) -> std::result::Result<T, E>
where
    F: FnOnce() -> std::result::Result<T, E>,
    E: From<Error>,
{
    run_with_transaction(None, f)
}

pub(crate) fn run_with_connection<T, E, F>(
    engine: Option<&Engine>,
    f: F,
) -> std::result::Result<T, E>
where
    F: FnOnce() -> std::result::Result<T, E>,
    E: From<Error>,
{
    let scope = ConnectionScope::acquire(engine)?;
    match f() {
        Ok(value) => {
            scope.close()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(close_err) = scope.close() {
                crate::metrics::counters::cleanup_failed("with_connection");
                tracing::error!(error = %close_err, "failed to release connection after error");
            }
            Err(e)
        }
    }
}

pub(crate) fn run_with_transaction<T, E, F>(
    engine: Option<&Engine>,
    f: F,
) -> std::result::Result<T, E>
where
    F: FnOnce() -> std::result::Result<T, E>,
    E: From<Error>,
{
    let scope = TransactionScope::begin(engine)?;
    match f() {
        Ok(value) => {
            scope.commit()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = scope.rollback() {
                crate::metrics::counters::cleanup_failed("with_transaction");
                tracing::error!(error = %rollback_err, "failed to roll back after error");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::context::with_current;
    use crate::connection::is_active;
    use crate::driver::memory::{Event, Fault, MemoryConnector};
    use crate::engine::EngineConfig;

    #[derive(Debug, PartialEq)]
    enum AppError {
        Db(String),
        Rejected,
    }

    impl From<Error> for AppError {
        fn from(e: Error) -> Self {
            AppError::Db(e.to_string())
        }
    }

    fn engine(driver: &MemoryConnector) -> Engine {
        Engine::new(EngineConfig::new("db", "u"), driver.clone())
    }

    fn touch() {
        with_current(|ctx| drop(ctx.cursor().unwrap()));
    }

    #[test]
    fn test_with_transaction_returns_value_and_commits() {
        let driver = MemoryConnector::new();
        let value = engine(&driver)
            .with_transaction(|| {
                touch();
                Ok::<_, Error>(42)
            })
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(driver.count(|e| matches!(e, Event::Commit { .. })), 1);
        assert!(!is_active());
    }

    #[test]
    fn test_caller_error_wins_over_rollback_failure() {
        let driver = MemoryConnector::new();
        driver.fail(Fault::Rollback);
        let result: Result<(), AppError> = engine(&driver).with_transaction(|| {
            touch();
            Err(AppError::Rejected)
        });
        assert_eq!(result, Err(AppError::Rejected));
        assert_eq!(driver.count(|e| matches!(e, Event::Rollback { .. })), 1);
        assert!(!is_active());
    }

    #[test]
    fn test_nested_wrappers_share_connection() {
        let driver = MemoryConnector::new();
        let engine = engine(&driver);
        engine
            .with_connection(|| {
                touch();
                engine.with_connection(|| {
                    touch();
                    Ok::<_, Error>(())
                })?;
                assert!(is_active());
                Ok::<_, Error>(())
            })
            .unwrap();
        assert_eq!(driver.count(|e| matches!(e, Event::Connect { .. })), 1);
        assert_eq!(driver.count(|e| matches!(e, Event::Close { .. })), 1);
    }

    #[test]
    fn test_swallowed_inner_error_still_rolls_back() {
        let driver = MemoryConnector::new();
        let engine = engine(&driver);
        let result: Result<(), AppError> = engine.with_transaction(|| {
            touch();
            let inner: Result<(), AppError> = engine.with_transaction(|| Err(AppError::Rejected));
            assert!(inner.is_err());
            Ok(())
        });
        assert!(matches!(result, Err(AppError::Db(msg)) if msg.contains("nested")));
        assert_eq!(driver.count(|e| matches!(e, Event::Commit { .. })), 0);
        assert_eq!(driver.count(|e| matches!(e, Event::Rollback { .. })), 1);
    }

    #[test]
    fn test_panic_rolls_back() {
        let driver = MemoryConnector::new();
        let engine = engine(&driver);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            engine.with_transaction(|| -> Result<(), Error> {
                touch();
                panic!("boom");
            })
        }));
        assert!(result.is_err());
        assert_eq!(driver.count(|e| matches!(e, Event::Rollback { .. })), 1);
        assert_eq!(driver.count(|e| matches!(e, Event::Commit { .. })), 0);
        assert!(!is_active());
    }
}
