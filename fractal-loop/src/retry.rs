//! Exponential backoff around the provider edge.

use std::future::Future;

use fractal_types::ProviderError;

use crate::config::RetryConfig;

/// Run `op`, retrying retryable provider errors with exponential backoff
/// (delay × base after each attempt, capped). Non-retryable errors and
/// the final attempt's error propagate unchanged.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut delay = config.initial_delay;
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < config.max_attempts => {
                tracing::warn!(
                    attempt,
                    max = config.max_attempts,
                    ?delay,
                    error = %err,
                    "provider call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = delay.mul_f64(config.base).min(config.cap);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn quick_config() -> RetryConfig {
        RetryConfig {
            initial_delay: Duration::from_millis(10),
            base: 2.0,
            cap: Duration::from_millis(50),
            max_attempts: 3,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicUsize::new(0);
        let result = with_retry(&quick_config(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::Network("reset".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = with_retry(&quick_config(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::Network("reset".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_errors_fail_fast() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = with_retry(&quick_config(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::InvalidRequest("bad".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
