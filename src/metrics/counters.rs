//! Counter metrics

use super::labels;

/// Physical connection opened
pub fn connection_opened() {
    metrics::counter!(labels::CONNECTIONS_OPENED).increment(1);
}

/// Physical connection closed
pub fn connection_closed() {
    metrics::counter!(labels::CONNECTIONS_CLOSED).increment(1);
}

/// Driver refused a connection
pub fn connection_failed() {
    metrics::counter!(labels::CONNECTIONS_FAILED).increment(1);
}

/// Statement finished with `status`
pub fn statement_executed(kind: &'static str, status: &'static str) {
    metrics::counter!(labels::STATEMENTS, "kind" => kind, "status" => status).increment(1);
}

/// Outermost transaction finished with `outcome`
pub fn transaction_finished(outcome: &'static str) {
    metrics::counter!(labels::TRANSACTIONS, "outcome" => outcome).increment(1);
}

/// Commit failed
pub fn commit_failed() {
    metrics::counter!(labels::COMMIT_FAILURES).increment(1);
}

/// Statement auto-committed
pub fn auto_commit() {
    metrics::counter!(labels::AUTO_COMMITS).increment(1);
}

/// Secondary failure during cleanup was logged
pub fn cleanup_failed(stage: &'static str) {
    metrics::counter!(labels::CLEANUP_FAILURES, "stage" => stage).increment(1);
}
