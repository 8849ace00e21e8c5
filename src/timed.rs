//! Advisory deadlines for asynchronous operations
//!
//! [`race`] bounds how long the caller waits, not how long the operation
//! runs: the operation is spawned as its own task, and when the deadline
//! wins that task is detached rather than cancelled. Whatever it produces
//! afterwards is discarded.

use std::future::Future;
use std::time::Duration;

use crate::error::TimedOut;

/// Run `operation` against a `timeout` and return whichever finishes first.
///
/// The operation takes no arguments; callers capture whatever it needs in the
/// future itself. A panic inside the operation is re-raised here.
pub async fn race<F, T>(operation: F, timeout: Duration) -> Result<T, TimedOut>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::spawn(operation);

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join_error)) => match join_error.try_into_panic() {
            Ok(payload) => std::panic::resume_unwind(payload),
            // the task is never aborted, so only runtime shutdown lands here
            Err(_) => Err(TimedOut(timeout)),
        },
        Err(_) => {
            log::debug!("Operation exceeded {}ms, detaching it", timeout.as_millis());
            Err(TimedOut(timeout))
        }
    }
}
