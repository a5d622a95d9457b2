//! Metrics collection for repository operations.
//!
//! Uses the `metrics` facade only; installing an exporter is left to the
//! embedding application. Without one every call is a no-op.

use std::time::Duration;

use metrics::{counter, histogram};

use crate::error::Result;
use crate::logging::OperationTimer;

/// Total repository operations, labelled by operation and status
pub const DB_OPERATIONS_TOTAL: &str = "catastro_db_operations_total";
/// Repository operation latency in seconds
pub const DB_OPERATION_DURATION: &str = "catastro_db_operation_duration_seconds";
/// Photo files that could not be removed after their records were deleted
pub const PHOTO_CLEANUP_FAILURES_TOTAL: &str = "catastro_photo_cleanup_failures_total";
/// Errors by kind
pub const ERRORS_TOTAL: &str = "catastro_errors_total";

/// Record database operation metrics
pub fn record_db_operation(operation: &'static str, duration: Duration, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(DB_OPERATIONS_TOTAL, "operation" => operation, "status" => status).increment(1);
    histogram!(DB_OPERATION_DURATION, "operation" => operation).record(duration.as_secs_f64());

    if !success {
        counter!(ERRORS_TOTAL, "type" => "database", "operation" => operation).increment(1);
    }
}

/// Record photo files left behind after a delete
pub fn record_cleanup_failures(count: usize) {
    if count > 0 {
        counter!(PHOTO_CLEANUP_FAILURES_TOTAL).increment(count as u64);
    }
}

/// Run `f`, timing it and recording the outcome under `operation`
pub(crate) fn instrumented<T>(operation: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let timer = OperationTimer::new(operation);
    let result = f();
    if let Err(e) = &result {
        tracing::debug!(operation, error = %e, "Operation failed");
    }
    record_db_operation(operation, timer.finish(), result.is_ok());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatastroError;

    #[test]
    fn test_instrumented_passes_result_through() {
        assert_eq!(instrumented("noop", || Ok(7)).unwrap(), 7);

        let err = instrumented::<()>("missing", || Err(CatastroError::PropertyNotFound(3)));
        assert!(matches!(err, Err(CatastroError::PropertyNotFound(3))));
    }
}
