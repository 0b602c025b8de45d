//! Metric names and label values

/// Physical connections opened
pub const CONNECTIONS_OPENED: &str = "scopedb_connections_opened_total";
/// Physical connections closed
pub const CONNECTIONS_CLOSED: &str = "scopedb_connections_closed_total";
/// Connection attempts rejected by the driver
pub const CONNECTIONS_FAILED: &str = "scopedb_connections_failed_total";
/// Statements executed
pub const STATEMENTS: &str = "scopedb_statements_total";
/// Transactions finished at depth zero
pub const TRANSACTIONS: &str = "scopedb_transactions_total";
/// Commits that failed
pub const COMMIT_FAILURES: &str = "scopedb_commit_failures_total";
/// Single statements committed outside a transaction
pub const AUTO_COMMITS: &str = "scopedb_auto_commits_total";
/// Cleanup failures logged instead of returned
pub const CLEANUP_FAILURES: &str = "scopedb_cleanup_failures_total";
/// Statement duration
pub const STATEMENT_DURATION: &str = "scopedb_statement_duration_ms";
/// Outermost transaction duration
pub const TRANSACTION_DURATION: &str = "scopedb_transaction_duration_ms";

/// Read statement
pub const KIND_SELECT: &str = "select";
/// Write statement
pub const KIND_UPDATE: &str = "update";

/// Success outcome
pub const STATUS_OK: &str = "ok";
/// Failure outcome
pub const STATUS_ERROR: &str = "error";

/// Transaction committed
pub const OUTCOME_COMMIT: &str = "commit";
/// Transaction rolled back
pub const OUTCOME_ROLLBACK: &str = "rollback";
