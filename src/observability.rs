use std::time::Duration;

use crate::engine::EngineError;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: engine operations executed. Labels: op, status.
pub const OPS_TOTAL: &str = "roomledger_ops_total";

/// Histogram: operation latency in seconds, deadline included. Labels: op.
pub const OP_DURATION_SECONDS: &str = "roomledger_op_duration_seconds";

// ── Domain metrics ──────────────────────────────────────────────

/// Counter: ledger inserts rejected because the span was taken. Labels: op.
pub const CONFLICTS_TOTAL: &str = "roomledger_conflicts_total";

/// Counter: operations that hit their deadline. Labels: op.
pub const TIMEOUTS_TOTAL: &str = "roomledger_timeouts_total";

/// Map an operation result to a short status label.
pub fn status_label(err: Option<&EngineError>) -> &'static str {
    match err {
        None => "ok",
        Some(EngineError::NotFound(..)) => "not_found",
        Some(EngineError::Conflict(_)) => "conflict",
        Some(EngineError::Timeout(_)) => "timeout",
        Some(EngineError::StoreUnavailable(_)) => "unavailable",
        Some(EngineError::InvalidInput(_))
        | Some(EngineError::LimitExceeded(_))
        | Some(EngineError::InvalidViewToken(_)) => "rejected",
        Some(EngineError::Store(_)) => "store_error",
    }
}

/// Record one finished operation.
pub fn record_op(op: &'static str, elapsed: Duration, err: Option<&EngineError>) {
    let status = status_label(err);
    metrics::counter!(OPS_TOTAL, "op" => op, "status" => status).increment(1);
    metrics::histogram!(OP_DURATION_SECONDS, "op" => op).record(elapsed.as_secs_f64());
    match err {
        Some(EngineError::Conflict(_)) => {
            metrics::counter!(CONFLICTS_TOTAL, "op" => op).increment(1);
        }
        Some(EngineError::Timeout(_)) => {
            metrics::counter!(TIMEOUTS_TOTAL, "op" => op).increment(1);
        }
        _ => {}
    }
}
