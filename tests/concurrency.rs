//! Thread isolation of execution contexts
//!
//! Every thread gets its own context, so concurrent scopes never share a
//! physical connection or a transaction depth.
//!
//! Run with: cargo test --test concurrency -- --nocapture

use scopedb::driver::memory::{Event, MemoryConnector};
use scopedb::{params, Engine, EngineConfig, Error};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Barrier};

fn setup() -> (MemoryConnector, Engine) {
    let driver = MemoryConnector::new();
    let engine = Engine::new(EngineConfig::new("test", "root"), driver.clone());
    (driver, engine)
}

/// Connection ids grouped by the statement argument that identifies a worker
fn connections_by_worker(driver: &MemoryConnector) -> BTreeMap<i64, BTreeSet<u64>> {
    let mut by_worker: BTreeMap<i64, BTreeSet<u64>> = BTreeMap::new();
    for event in driver.events() {
        if let Event::Execute { conn, args, .. } = event {
            let worker = args[0].as_i64().expect("worker id");
            by_worker.entry(worker).or_default().insert(conn);
        }
    }
    by_worker
}

#[test]
fn test_threads_get_separate_connections() {
    println!("Test: concurrent transactions on separate threads");
    const WORKERS: i64 = 8;

    let (driver, engine) = setup();
    // Every worker holds its transaction open until all of them are inside
    let barrier = Arc::new(Barrier::new(WORKERS as usize));

    std::thread::scope(|s| {
        for worker in 0..WORKERS {
            let engine = &engine;
            let barrier = Arc::clone(&barrier);
            s.spawn(move || {
                engine
                    .with_transaction(|| {
                        scopedb::update("update t set owner = ? where slot = 1", &params![worker])?;
                        assert_eq!(scopedb::connection::transaction_depth(), 1);
                        barrier.wait();
                        scopedb::update("update t set owner = ? where slot = 2", &params![worker])?;
                        Ok::<_, Error>(())
                    })
                    .unwrap();
            });
        }
    });

    let by_worker = connections_by_worker(&driver);
    assert_eq!(by_worker.len(), WORKERS as usize);
    let all: BTreeSet<u64> = by_worker.values().flatten().copied().collect();
    assert_eq!(all.len(), WORKERS as usize, "connections must not be shared");
    assert!(by_worker.values().all(|conns| conns.len() == 1));

    assert_eq!(driver.count(|e| matches!(e, Event::Commit { .. })), WORKERS as usize);
    assert_eq!(driver.count(|e| matches!(e, Event::Close { .. })), WORKERS as usize);
    println!("  {} workers, {} connections: ✓", WORKERS, all.len());
}

#[test]
fn test_failure_on_one_thread_does_not_affect_others() {
    let (driver, engine) = setup();

    std::thread::scope(|s| {
        let failing = s.spawn(|| {
            engine.with_transaction(|| {
                scopedb::update("update t set owner = ?", &params![1])?;
                Err::<(), _>(Error::InvalidArgument("abort".into()))
            })
        });
        let succeeding = s.spawn(|| {
            engine.with_transaction(|| scopedb::update("update t set owner = ?", &params![2]))
        });
        assert!(failing.join().unwrap().is_err());
        assert!(succeeding.join().unwrap().is_ok());
    });

    let by_worker = connections_by_worker(&driver);
    let failed_conn = *by_worker[&1].iter().next().unwrap();
    let ok_conn = *by_worker[&2].iter().next().unwrap();
    assert!(driver
        .events_for(failed_conn)
        .iter()
        .any(|e| matches!(e, Event::Rollback { .. })));
    assert!(driver
        .events_for(ok_conn)
        .iter()
        .any(|e| matches!(e, Event::Commit { .. })));
}

#[test]
fn test_scope_on_one_thread_is_invisible_to_another() {
    let (_driver, engine) = setup();

    engine
        .with_transaction(|| {
            assert!(scopedb::connection::is_active());
            let seen = std::thread::spawn(|| {
                (
                    scopedb::connection::is_active(),
                    scopedb::connection::transaction_depth(),
                )
            })
            .join()
            .unwrap();
            assert_eq!(seen, (false, 0));
            Ok::<_, Error>(())
        })
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_blocking_tasks_from_async_runtime() {
    println!("Test: scoped work from spawn_blocking");

    let (driver, engine) = setup();
    let mut handles = Vec::new();
    for worker in 0..16i64 {
        let engine = engine.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            engine.with_transaction(|| {
                scopedb::update("update t set owner = ? where slot = 1", &params![worker])?;
                scopedb::with_transaction(|| {
                    scopedb::update("update t set owner = ? where slot = 2", &params![worker])
                })?;
                Ok::<_, Error>(())
            })
        }));
    }
    for handle in handles {
        handle.await.expect("task panicked").expect("transaction failed");
    }

    // Both statements of a worker ran on the same connection
    let by_worker = connections_by_worker(&driver);
    assert_eq!(by_worker.len(), 16);
    assert!(by_worker.values().all(|conns| conns.len() == 1));
    assert_eq!(driver.count(|e| matches!(e, Event::Commit { .. })), 16);
    println!("  16 tasks committed once each: ✓");
}
