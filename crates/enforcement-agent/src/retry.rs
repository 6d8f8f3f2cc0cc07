use std::future::Future;

use rule_store::StoreError;

use crate::config::StoreRetryCfg;
use crate::events;
use crate::metrics::AgentMetrics;

/// Runs a store call, retrying transient failures with exponential backoff.
/// Non-retryable errors and the last transient error are returned as-is.
pub async fn with_store_retry<T, F, Fut>(
    cfg: &StoreRetryCfg,
    metrics: &AgentMetrics,
    operation: &str,
    mut call: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut retry = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && retry < cfg.retry_attempts => {
                let delay = cfg.delay_for(retry);
                retry += 1;
                events::emit_store_retry(operation, retry, delay, &err);
                metrics.record_store_retry();
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> StoreRetryCfg {
        StoreRetryCfg {
            retry_attempts: 2,
            retry_base_delay_ms: 1,
        }
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let metrics = AgentMetrics::default();
        let calls = AtomicU32::new(0);
        let result = with_store_retry(&fast(), &metrics, "get", || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(StoreError::Unavailable("busy".into()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(2));
        assert_eq!(metrics.snapshot().store_retries, 2);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let metrics = AgentMetrics::default();
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_store_retry(&fast(), &metrics, "set", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Io("disk full".into())) }
        })
        .await;
        assert_eq!(result, Err(StoreError::Io("disk full".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn corrupt_data_is_not_retried() {
        let metrics = AgentMetrics::default();
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_store_retry(&fast(), &metrics, "get", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Corrupt("bad".into())) }
        })
        .await;
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.snapshot().store_retries, 0);
    }
}
