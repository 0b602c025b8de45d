//! Basic usage of scopedb
//!
//! Installs a process-wide engine over the in-memory driver, then runs
//! selects and nested transactions the way application code would.
//!
//! Run with: RUST_LOG=scopedb=debug cargo run --example basic

use scopedb::driver::memory::{Event, Fault, MemoryConnector, ResultSet};
use scopedb::{params, EngineConfig, Error, Value};
use tracing_subscriber::EnvFilter;

fn register(id: i64, name: &str) -> scopedb::Result<()> {
    scopedb::with_transaction(|| {
        scopedb::insert("user", [("id", Value::from(id)), ("name", Value::from(name))])?;
        // Joins the caller's transaction
        scopedb::with_transaction(|| {
            scopedb::update(
                "update stats set users = users + 1 where name = ?",
                &params!["total"],
            )
        })?;
        Ok(())
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scopedb=info")),
        )
        .init();

    let driver = MemoryConnector::new();
    driver.script(
        "from user",
        ResultSet::rows(
            &["id", "name"],
            vec![
                vec![Value::Int(1), Value::from("alice")],
                vec![Value::Int(2), Value::from("bob")],
            ],
        ),
    );
    driver.script(
        "count(*)",
        ResultSet::rows(&["count(*)"], vec![vec![Value::Int(2)]]),
    );

    let config = EngineConfig::builder("demo", "app")
        .password("secret")
        .option("charset", "utf8mb4")
        .build();
    println!("config: {}", serde_json::to_string(&config)?);
    scopedb::create_engine(config, driver.clone())?;

    // Each call below opens and closes its own connection
    let count = scopedb::select_int("select count(*) from user", &[])?;
    println!("users: {:?}", count);

    // One connection for the whole block
    scopedb::with_connection(|| {
        for row in scopedb::select("select id, name from user", &[])? {
            println!("row: {}", row.to_json());
        }
        if let Some(first) = scopedb::select_one("select id, name from user where id = ?", &params![1])? {
            println!("first: {}", first.get_as::<String>("name")?);
        }
        Ok::<_, Error>(())
    })?;

    // Nested transactions commit once
    scopedb::with_transaction(|| {
        register(3, "carol")?;
        register(4, "dave")
    })?;

    // A failure anywhere rolls the whole tree back
    driver.fail_statement("values (%s,%s)");
    let result = scopedb::with_transaction(|| register(5, "eve"));
    println!("failed registration: {}", result.unwrap_err());
    driver.heal();

    // Commit failures are reported after a rollback attempt
    driver.fail(Fault::Commit);
    let result = scopedb::update("delete from session", &[]);
    println!("failed commit: {}", result.unwrap_err());
    driver.heal();

    let commits = driver.count(|e| matches!(e, Event::Commit { .. }));
    let rollbacks = driver.count(|e| matches!(e, Event::Rollback { .. }));
    let connections = driver.count(|e| matches!(e, Event::Connect { .. }));
    println!(
        "commits: {}, rollbacks: {}, connections: {}",
        commits, rollbacks, connections
    );

    Ok(())
}
