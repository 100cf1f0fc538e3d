//! Bounded retry with exponential backoff for async operations.

use std::future::Future;
use std::time::Duration;

/// Retry an async operation with exponentially doubling delays.
///
/// The operation is attempted once, then up to `max_retries` more times.
/// The first retry waits `initial_delay`, each following retry twice the
/// previous wait. When retries are exhausted the final error is returned.
/// No jitter, no circuit breaking.
pub async fn retry_with_backoff<T, E, F, Fut>(
    mut operation: F,
    max_retries: u32,
    initial_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut retries_left = max_retries;
    let mut delay = initial_delay;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if retries_left == 0 {
                    return Err(e);
                }
                tokio::time::sleep(delay).await;
                delay *= 2;
                retries_left -= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt_with_doubling_delays() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_ref = calls.clone();

        let start = Instant::now();
        let result: Result<u32, &str> = retry_with_backoff(
            move || {
                let calls = calls_ref.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err("not yet")
                    } else {
                        Ok(42)
                    }
                }
            },
            3,
            Duration::from_millis(100),
        )
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two sleeps: 100ms then 200ms (paused clock, so this is exact)
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_surfaces_final_error_when_exhausted() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_ref = calls.clone();

        let result: Result<u32, String> = retry_with_backoff(
            move || {
                let calls = calls_ref.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    Err(format!("attempt {} failed", n))
                }
            },
            2,
            Duration::from_millis(50),
        )
        .await;

        // One initial attempt plus two retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result, Err("attempt 3 failed".to_string()));
    }

    #[tokio::test]
    async fn test_immediate_success_does_not_sleep() {
        let result: Result<&str, &str> =
            retry_with_backoff(|| async { Ok("first try") }, 3, Duration::from_secs(3600)).await;
        assert_eq!(result, Ok("first try"));
    }
}
