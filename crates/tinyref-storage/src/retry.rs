//! Retry wrapper for transient durable-store failures.
//!
//! A primary failover or dropped connection should not surface to the
//! caller on the first attempt; operations are retried on a fixed
//! interval up to a capped attempt count, after which the failure is
//! fatal.

use std::future::Future;
use std::time::Duration;
use tinyref_core::BackendError;
use tracing::warn;
use typed_builder::TypedBuilder;

/// Retry schedule for transient MySQL errors.
#[derive(Debug, Clone, TypedBuilder)]
pub struct RetryPolicy {
    /// Total attempts before giving up, including the first.
    #[builder(default = 100)]
    pub max_attempts: u32,
    /// Fixed wait between attempts.
    #[builder(default = Duration::from_secs(1))]
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Whether an error is a recoverable connectivity failure worth retrying.
pub(crate) fn is_transient(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

pub(crate) fn map_sqlx_error(err: sqlx::Error) -> BackendError {
    let message = err.to_string();

    if is_transient(&err) {
        return BackendError::Transient(message);
    }

    match err {
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => BackendError::InvalidData(message),
        _ => BackendError::Fatal(message),
    }
}

/// Runs `op`, retrying transient failures per `policy`.
///
/// Non-transient errors surface immediately; an exhausted budget becomes
/// [`BackendError::RetriesExhausted`].
pub(crate) async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempts = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_transient(&err) => {
                attempts += 1;
                if attempts == 1 {
                    warn!(operation, error = %err, "transient failure, retrying");
                }
                if attempts >= policy.max_attempts {
                    return Err(BackendError::RetriesExhausted {
                        attempts,
                        message: format!("{operation}: {err}"),
                    });
                }
                tokio::time::sleep(policy.delay).await;
            }
            Err(err) => return Err(map_sqlx_error(err)),
        }
    }
}
