//! Retry policy for model requests.
//!
//! Transient failures (network errors, rate limits, server errors) are
//! retried with exponential backoff. Everything else fails immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::LlmError;

/// Maximum number of attempts for a single request.
pub const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff in milliseconds.
pub const BASE_RETRY_DELAY_MS: u64 = 1000;

/// Check if an error is transient and should be retried.
pub fn is_transient_error(error: &LlmError) -> bool {
    match error {
        LlmError::RequestFailed(msg) => {
            let msg = msg.to_lowercase();
            msg.contains("timeout")
                || msg.contains("timed out")
                || msg.contains("connection")
                || msg.contains("temporarily")
        }
        LlmError::Network(_) | LlmError::RateLimited(_) => true,
        LlmError::ApiError { code, .. } => *code >= 500 || *code == 429,
        _ => false,
    }
}

/// Delay before retry number `attempt` (1-based): 1s, 2s, 4s, ...
pub fn backoff_delay(attempt: u32) -> Duration {
    let shift = attempt.saturating_sub(1).min(16);
    Duration::from_millis(BASE_RETRY_DELAY_MS * (1u64 << shift))
}

/// Runs `operation` up to [`MAX_RETRIES`] times, sleeping between
/// attempts that failed with a transient error.
pub async fn with_retry<T, F, Fut>(label: &str, mut operation: F) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut last_error = None;

    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            let delay = backoff_delay(attempt);
            tracing::debug!(
                provider = label,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "Retrying model request after transient failure"
            );
            tokio::time::sleep(delay).await;
        }

        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if is_transient_error(&err) => {
                tracing::warn!(
                    provider = label,
                    attempt = attempt + 1,
                    max_retries = MAX_RETRIES,
                    error = %err,
                    "Transient error, will retry"
                );
                last_error = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        LlmError::RequestFailed("Max retries exceeded with no error captured".to_string())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_is_transient_error_rate_limited() {
        let error = LlmError::RateLimited("Too many requests".to_string());
        assert!(is_transient_error(&error));
    }

    #[test]
    fn test_is_transient_error_server_error() {
        let error = LlmError::ApiError {
            code: 503,
            message: "Service unavailable".to_string(),
        };
        assert!(is_transient_error(&error));
    }

    #[test]
    fn test_is_transient_error_client_error() {
        let error = LlmError::ApiError {
            code: 400,
            message: "Bad request".to_string(),
        };
        assert!(!is_transient_error(&error));
    }

    #[test]
    fn test_is_transient_error_connection() {
        let error = LlmError::RequestFailed("Connection refused".to_string());
        assert!(is_transient_error(&error));
    }

    #[test]
    fn test_is_transient_error_network() {
        let error = LlmError::Network("error sending request for url".to_string());
        assert!(is_transient_error(&error));
    }

    #[test]
    fn test_is_transient_error_parse_error() {
        let error = LlmError::ParseError("Invalid JSON".to_string());
        assert!(!is_transient_error(&error));
        assert!(!is_transient_error(&LlmError::EmptyResponse));
    }

    #[test]
    fn test_backoff_delay_doubles() {
        assert_eq!(backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(3), Duration::from_millis(4000));
    }

    #[tokio::test]
    async fn test_with_retry_recovers_from_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = with_retry("test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(LlmError::RateLimited("slow down".to_string()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_with_retry_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::RequestFailed("connection reset".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(LlmError::RequestFailed(_))));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_RETRIES);
    }

    #[tokio::test]
    async fn test_with_retry_fails_fast_on_permanent_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(LlmError::ApiError {
                    code: 401,
                    message: "unauthorized".to_string(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
