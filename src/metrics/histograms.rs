//! Histogram metrics

use super::labels;

/// Statement duration in milliseconds
pub fn statement_duration(kind: &'static str, duration_ms: u64) {
    metrics::histogram!(labels::STATEMENT_DURATION, "kind" => kind).record(duration_ms as f64);
}

/// Outermost transaction duration in milliseconds
pub fn transaction_duration(outcome: &'static str, duration_ms: u64) {
    metrics::histogram!(labels::TRANSACTION_DURATION, "outcome" => outcome)
        .record(duration_ms as f64);
}
