//! Query and update operations
//!
//! Each operation runs inside a connection scope (joining the active one, or
//! opening one on the process-wide engine), executes one statement through a
//! cursor that is closed on every path, and shapes the result into [`Row`]s.
//! Writes auto-commit when no transaction scope is open.

mod placeholder;

pub use placeholder::{quote_identifier, rewrite, Placeholder, Rewritten};

use crate::connection::context::with_current;
use crate::driver::Cursor;
use crate::error::DriverError;
use crate::metrics::labels;
use crate::row::Row;
use crate::scope::with_connection;
use crate::value::{FromValue, Value};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;

/// How many rows a select fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fetch {
    First,
    All,
}

/// Select the first matching row, or `None` when nothing matches
pub fn select_one(sql: &str, args: &[Value]) -> Result<Option<Row>> {
    with_connection(|| Ok(select_rows(sql, args, Fetch::First)?.into_iter().next()))
}

/// Select all matching rows
///
/// Fails with [`Error::Query`] when the statement produces no result set.
pub fn select(sql: &str, args: &[Value]) -> Result<Vec<Row>> {
    with_connection(|| select_rows(sql, args, Fetch::All))
}

/// Select a single value
///
/// Fails with [`Error::MultiColumn`] unless the result has exactly one
/// column; the check uses the cursor description, so it applies even when no
/// row matches. Returns `None` when no row matches.
pub fn select_scalar(sql: &str, args: &[Value]) -> Result<Option<Value>> {
    with_connection(|| {
        let row = execute(sql, args, labels::KIND_SELECT, |cursor| {
            let width = cursor.description().map_or(0, <[String]>::len);
            if width != 1 {
                return Ok(Err(Error::MultiColumn(width)));
            }
            Ok(Ok(cursor.fetch_one()?))
        })??;
        Ok(row.and_then(|values| values.into_iter().next()))
    })
}

/// Select a single integer, e.g. `select count(*) from user`
///
/// `None` when no row matches or the value is `NULL` (`select max(id)` over
/// an empty table).
pub fn select_int(sql: &str, args: &[Value]) -> Result<Option<i64>> {
    select_scalar(sql, args)?
        .map(Option::<i64>::from_value)
        .transpose()
        .map(Option::flatten)
}

/// Insert one row
///
/// Builds ``insert into `table` (`a`,`b`) values (?,?)`` from the column/value
/// pairs and returns the affected row count.
///
/// ```no_run
/// use scopedb::Value;
///
/// scopedb::insert("user", [("id", Value::from(1)), ("name", Value::from("alice"))])?;
/// # Ok::<(), scopedb::Error>(())
/// ```
pub fn insert<I, K>(table: &str, columns: I) -> Result<u64>
where
    I: IntoIterator<Item = (K, Value)>,
    K: AsRef<str>,
{
    let (sql, args) = build_insert(table, columns)?;
    update(&sql, &args)
}

/// Execute a write statement, returning the affected row count
pub fn update(sql: &str, args: &[Value]) -> Result<u64> {
    with_connection(|| {
        let count = execute(sql, args, labels::KIND_UPDATE, |cursor| Ok(cursor.row_count()))?;
        with_current(|ctx| -> Result<()> {
            if ctx.transaction_depth() == 0 {
                tracing::info!("auto commit");
                crate::metrics::counters::auto_commit();
                ctx.connection()?.commit_or_rollback()?;
            }
            Ok(())
        })?;
        Ok(count)
    })
}

fn build_insert<I, K>(table: &str, columns: I) -> Result<(String, Vec<Value>)>
where
    I: IntoIterator<Item = (K, Value)>,
    K: AsRef<str>,
{
    let (names, args): (Vec<String>, Vec<Value>) = columns
        .into_iter()
        .map(|(k, v)| (quote_identifier(k.as_ref()), v))
        .unzip();
    if names.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "insert into `{}` needs at least one column",
            table
        )));
    }
    let sql = format!(
        "insert into {} ({}) values ({})",
        quote_identifier(table),
        names.join(","),
        vec!["?"; names.len()].join(",")
    );
    Ok((sql, args))
}

fn select_rows(sql: &str, args: &[Value], fetch: Fetch) -> Result<Vec<Row>> {
    execute(sql, args, labels::KIND_SELECT, |cursor| {
        let columns: Arc<[String]> = match cursor.description() {
            Some(columns) => columns.into(),
            None => return Err(DriverError::new("statement produced no result set")),
        };
        let tuples: Vec<Vec<Value>> = match fetch {
            Fetch::First => cursor.fetch_one()?.into_iter().collect(),
            Fetch::All => cursor.fetch_all()?,
        };
        Ok(tuples
            .into_iter()
            .map(|values| Row::new(Arc::clone(&columns), values))
            .collect())
    })
}

/// Run one statement on the current connection
///
/// `read` consumes the cursor after execution. The cursor is closed whether
/// execution or reading fails; a close failure is only reported when nothing
/// else failed.
fn execute<T>(
    sql: &str,
    args: &[Value],
    kind: &'static str,
    read: impl FnOnce(&mut dyn Cursor) -> std::result::Result<T, DriverError>,
) -> Result<T> {
    let started = Instant::now();
    let (native, result) = with_current(|ctx| -> Result<_> {
        let placeholder = match ctx.engine() {
            Some(engine) => engine.placeholder(),
            None => return Err(Error::NotInitialized("execution context")),
        };
        let rewritten = rewrite(sql, placeholder);
        if rewritten.placeholders != args.len() {
            return Err(Error::ArgumentCount {
                expected: rewritten.placeholders,
                actual: args.len(),
            });
        }
        let native = rewritten.sql.into_owned();
        tracing::debug!(sql = %native, args = ?args, "{}", kind);

        let mut cursor = ctx.cursor()?;
        let result = cursor.execute(&native, args).and_then(|()| read(&mut *cursor));
        let closed = cursor.close();
        let result = match (result, closed) {
            (Ok(value), Ok(())) => Ok(Ok(value)),
            (Ok(_), Err(close_err)) => Err(Error::Cursor(close_err)),
            (Err(e), Ok(())) => Ok(Err(e)),
            (Err(e), Err(close_err)) => {
                crate::metrics::counters::cleanup_failed("cursor_close");
                tracing::error!(error = %close_err, "failed to close cursor after statement error");
                Ok(Err(e))
            }
        };
        result.map(|r| (native, r))
    })?;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    crate::metrics::histograms::statement_duration(kind, elapsed_ms);
    match result {
        Ok(value) => {
            crate::metrics::counters::statement_executed(kind, labels::STATUS_OK);
            Ok(value)
        }
        Err(source) => {
            crate::metrics::counters::statement_executed(kind, labels::STATUS_ERROR);
            tracing::debug!(sql = %native, error = %source, "statement failed");
            Err(if kind == labels::KIND_UPDATE {
                Error::Update { sql: native, source }
            } else {
                Error::Query { sql: native, source }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_insert() {
        let (sql, args) = build_insert(
            "table",
            [("a", Value::from(1)), ("b", Value::from("x"))],
        )
        .unwrap();
        assert_eq!(sql, "insert into `table` (`a`,`b`) values (?,?)");
        assert_eq!(args, vec![Value::Int(1), Value::Text("x".into())]);
    }

    #[test]
    fn test_build_insert_quotes_identifiers() {
        let (sql, _) = build_insert("odd`name", [(String::from("c`1"), Value::Null)]).unwrap();
        assert_eq!(sql, "insert into `odd``name` (`c``1`) values (?)");
    }

    #[test]
    fn test_build_insert_requires_columns() {
        let result = build_insert("user", Vec::<(&str, Value)>::new());
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }
}
