//! Nested transaction behaviour
//!
//! Runs against the in-memory recording driver; no database required.

use scopedb::driver::memory::{Event, Fault, MemoryConnector};
use scopedb::{params, Engine, EngineConfig, Error, TransactionScope, Value};

fn setup() -> (MemoryConnector, Engine) {
    let driver = MemoryConnector::new();
    let engine = Engine::new(EngineConfig::new("test", "root"), driver.clone());
    (driver, engine)
}

fn commits(driver: &MemoryConnector) -> usize {
    driver.count(|e| matches!(e, Event::Commit { .. }))
}

fn rollbacks(driver: &MemoryConnector) -> usize {
    driver.count(|e| matches!(e, Event::Rollback { .. }))
}

/// Open `depth` nested transactions, running a statement at the innermost one;
/// level `fail_at` (1-based) returns an error if set.
fn nest(engine: &Engine, depth: usize, level: usize, fail_at: Option<usize>) -> scopedb::Result<()> {
    engine.with_transaction(|| {
        if level == depth {
            scopedb::update("update t set n = n + 1 where id = ?", &params![level as i64])?;
        } else {
            nest(engine, depth, level + 1, fail_at)?;
        }
        if fail_at == Some(level) {
            return Err(Error::InvalidArgument(format!("failure at level {}", level)));
        }
        Ok(())
    })
}

#[test]
fn test_exactly_one_commit_for_any_depth() {
    for depth in 1..=8 {
        let (driver, engine) = setup();
        nest(&engine, depth, 1, None).expect("nested transaction");

        assert_eq!(commits(&driver), 1, "depth {}", depth);
        assert_eq!(rollbacks(&driver), 0, "depth {}", depth);
        // The commit is the last thing before the connection closes
        let events = driver.events();
        assert!(matches!(events[events.len() - 2], Event::Commit { .. }));
        assert!(matches!(events[events.len() - 1], Event::Close { .. }));
    }
}

#[test]
fn test_failure_at_any_level_rolls_back_once() {
    for depth in 1..=6 {
        for fail_at in 1..=depth {
            let (driver, engine) = setup();
            let result = nest(&engine, depth, 1, Some(fail_at));

            assert!(result.is_err(), "depth {} fail_at {}", depth, fail_at);
            assert_eq!(commits(&driver), 0, "depth {} fail_at {}", depth, fail_at);
            assert_eq!(rollbacks(&driver), 1, "depth {} fail_at {}", depth, fail_at);
            assert!(!scopedb::connection::is_active());
        }
    }
}

#[test]
fn test_inner_error_caught_by_outer_still_rolls_back() {
    let (driver, engine) = setup();

    let result = engine.with_transaction(|| {
        scopedb::update("insert into audit values (?)", &params!["start"])?;
        let inner = scopedb::with_transaction(|| -> scopedb::Result<()> {
            scopedb::update("insert into audit values (?)", &params!["inner"])?;
            Err(Error::InvalidArgument("rejected".into()))
        });
        assert!(inner.is_err());
        Ok::<_, Error>(())
    });

    assert!(matches!(result, Err(Error::RollbackOnly)));
    assert_eq!(commits(&driver), 0);
    assert_eq!(rollbacks(&driver), 1);
}

#[test]
fn test_write_inside_transaction_waits_for_outermost_exit() {
    let (driver, engine) = setup();

    let outer = TransactionScope::enter_on(&engine).unwrap();
    scopedb::update("update user set name = ?", &params!["a"]).unwrap();
    scopedb::insert("user", [("name", Value::from("b"))]).unwrap();
    assert_eq!(commits(&driver), 0);

    outer.commit().unwrap();
    assert_eq!(commits(&driver), 1);
}

#[test]
fn test_transaction_without_statements_opens_nothing() {
    let (driver, engine) = setup();
    engine
        .with_transaction(|| engine.with_transaction(|| Ok::<_, Error>(())))
        .unwrap();
    assert!(driver.events().is_empty());
}

#[test]
fn test_commit_failure_surfaces_after_rollback() {
    let (driver, engine) = setup();
    driver.fail(Fault::Commit);

    let result = engine.with_transaction(|| scopedb::update("delete from t", &[]));

    assert!(matches!(result, Err(Error::Commit { rollback: None, .. })));
    assert_eq!(rollbacks(&driver), 1);
    assert!(!scopedb::connection::is_active());
}

#[test]
fn test_one_connection_per_transaction_tree() {
    let (driver, engine) = setup();

    engine
        .with_transaction(|| {
            scopedb::update("update a set x = 1", &[])?;
            scopedb::with_connection(|| scopedb::update("update b set x = 1", &[]))?;
            scopedb::with_transaction(|| scopedb::update("update c set x = 1", &[]))?;
            Ok::<_, Error>(())
        })
        .unwrap();

    let conns: std::collections::BTreeSet<u64> = driver.events().iter().map(Event::conn).collect();
    assert_eq!(conns.len(), 1);
    assert_eq!(driver.count(|e| matches!(e, Event::Connect { .. })), 1);
    assert_eq!(driver.count(|e| matches!(e, Event::Close { .. })), 1);
}

#[test]
fn test_sequential_transactions_use_fresh_connections() {
    let (driver, engine) = setup();

    for _ in 0..3 {
        engine
            .with_transaction(|| scopedb::update("update t set x = 1", &[]))
            .unwrap();
    }

    assert_eq!(driver.count(|e| matches!(e, Event::Connect { .. })), 3);
    assert_eq!(driver.count(|e| matches!(e, Event::Close { .. })), 3);
    assert_eq!(commits(&driver), 3);
}
