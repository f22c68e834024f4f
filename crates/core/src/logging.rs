//! Failure reporting for backend operations whose errors are absorbed

use datebook_domain::DatebookError;
use tracing::warn;

/// Log a failed backend operation. Cancellation is part of normal teardown
/// and is never reported.
pub(crate) fn log_failure(source_uid: &str, operation: &'static str, err: &DatebookError) {
    if err.is_cancelled() {
        return;
    }
    warn!(
        source_uid,
        operation,
        error = %err,
        error_kind = err.label(),
        "Calendar backend operation failed"
    );
}
