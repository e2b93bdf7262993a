//! Exponential backoff with jitter for transport calls to the mail
//! provider, LLM endpoint, or NER backend (§5): max 3 attempts, each call
//! wrapped in the configurable suspension timeout (default 60s).

use crate::error::{AppError, AppResult};
use std::future::Future;
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY_MS: u64 = 200;

pub async fn retry_with_backoff<T, F, Fut>(timeout: Duration, mut f: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 0;
    loop {
        let result = tokio::time::timeout(timeout, f()).await;
        match result {
            Ok(Ok(v)) => return Ok(v),
            Ok(Err(e)) if attempt + 1 < MAX_ATTEMPTS && is_retryable(&e) => {
                attempt += 1;
                sleep_with_jitter(attempt).await;
            }
            Ok(Err(e)) => return Err(e),
            Err(_elapsed) if attempt + 1 < MAX_ATTEMPTS => {
                attempt += 1;
                sleep_with_jitter(attempt).await;
            }
            Err(_elapsed) => {
                return Err(AppError::transport("operation timed out after retries"));
            }
        }
    }
}

fn is_retryable(e: &AppError) -> bool {
    matches!(e, AppError::Transport(_))
}

async fn sleep_with_jitter(attempt: u32) {
    let base = BASE_DELAY_MS * 2u64.pow(attempt - 1);
    let jitter = (base / 4).max(1);
    let jittered = base + (std::process::id() as u64 % jitter);
    tokio::time::sleep(Duration::from_millis(jittered)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transport_errors_up_to_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: AppResult<()> = retry_with_backoff(Duration::from_secs(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::transport("boom")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn succeeds_without_retry_when_first_call_ok() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(Duration::from_secs(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, AppError>(42) }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn does_not_retry_non_transport_errors() {
        let calls = AtomicU32::new(0);
        let result: AppResult<()> = retry_with_backoff(Duration::from_secs(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::invariant("bad")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
