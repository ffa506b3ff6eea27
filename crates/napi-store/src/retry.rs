use backon::{ExponentialBuilder, Retryable};

use crate::error::StoreError;
use crate::{RETRY_BASE_DELAY, TRANSIENT_RETRY_LIMIT};

/// §4.I's transient-error retry: "Transient adapter errors ... retried up
/// to N=3 with exponential backoff for idempotent reads and for the
/// `put`/`batch` attempts that can be safely replayed because they re-read
/// the etag." Uses `backon`'s builder rather than a hand-rolled sleep loop,
/// matching how the teacher's workspace already depends on `backon` for
/// this exact purpose elsewhere in the codebase.
///
/// Non-transient errors (`EtagConflict`, `InvalidParams`-adjacent
/// validation failures, `BucketNotFound`) are returned immediately without
/// retrying — only [`StoreError::is_transient`] errors consume a retry.
pub async fn with_transient_retry<T, F, Fut>(op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let backoff = ExponentialBuilder::default()
        .with_min_delay(RETRY_BASE_DELAY)
        .with_max_times(TRANSIENT_RETRY_LIMIT);

    op.retry(backoff)
        .when(|e: &StoreError| e.is_transient())
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn retries_until_success() {
        let attempts = AtomicUsize::new(0);
        let result = with_transient_retry(|| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(StoreError::internal("not transient, just testing the harness"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        // internal() is not transient, so the first failure should not be retried.
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
