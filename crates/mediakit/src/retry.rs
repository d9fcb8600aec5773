//! Retry logic with exponential backoff for throttling and transient faults.

use crate::error::{Error, Result};
use crate::types::RetryConfig;
use std::thread;

/// Callback trait for retry progress notifications.
pub trait RetryCallback {
    /// Called before sleeping ahead of the next attempt.
    ///
    /// # Arguments
    /// * `attempt` - Attempt that just failed (1-indexed)
    /// * `max_attempts` - Maximum number of attempts
    /// * `error` - The error that triggered the retry
    /// * `delay_ms` - Milliseconds until next attempt
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay_ms: u128);
}

/// Callback that logs retries at warn level.
pub struct LogCallback<'a> {
    /// What is being retried (e.g. "GET transforms")
    pub operation: &'a str,
}

impl RetryCallback for LogCallback<'_> {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay_ms: u128) {
        log::warn!(
            "{} failed (attempt {attempt}/{max_attempts}): {error}; retrying in {delay_ms}ms",
            self.operation
        );
    }
}

/// Execute an operation with retry logic.
///
/// Retries the operation while it returns a retryable error, sleeping with
/// exponential backoff between attempts. Non-retryable errors are returned
/// immediately.
pub fn with_retry<T, F>(
    config: &RetryConfig,
    callback: Option<&dyn RetryCallback>,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut last_error: Option<Error> = None;

    for attempt in 0..config.max_attempts {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !e.is_retryable() {
                    return Err(e);
                }

                if attempt + 1 >= config.max_attempts {
                    last_error = Some(e);
                    break;
                }

                let delay = config.delay_for_attempt(attempt);
                if let Some(cb) = callback {
                    cb.on_retry(attempt + 1, config.max_attempts, &e, delay.as_millis());
                }

                thread::sleep(delay);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::Other("retry exhausted".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_with_retry_success_first_try() {
        let result = with_retry(&RetryConfig::no_retry(), None, || Ok::<_, Error>(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_with_retry_non_retryable_error() {
        let attempts = Cell::new(0);

        let result: Result<()> = with_retry(&fast(4), None, || {
            attempts.set(attempts.get() + 1);
            Err(Error::api(400, "BadRequest", "invalid transform output"))
        });

        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_with_retry_throttled_then_success() {
        let attempts = Cell::new(0);

        let result = with_retry(&fast(3), None, || {
            let current = attempts.get();
            attempts.set(current + 1);
            if current < 2 {
                Err(Error::api(429, "TooManyRequests", "slow down"))
            } else {
                Ok("done")
            }
        });

        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_with_retry_exhausted_returns_last_error() {
        let attempts = Cell::new(0);

        let result: Result<()> = with_retry(&fast(3), None, || {
            attempts.set(attempts.get() + 1);
            Err(Error::Transport {
                message: "connection reset".to_string(),
            })
        });

        assert_eq!(attempts.get(), 3);
        assert!(matches!(result, Err(Error::Transport { .. })));
    }

    struct Counting(Cell<u32>);

    impl RetryCallback for Counting {
        fn on_retry(&self, _attempt: u32, _max: u32, _error: &Error, _delay_ms: u128) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_callback_called_between_attempts() {
        let callback = Counting(Cell::new(0));

        let _: Result<()> = with_retry(&fast(3), Some(&callback), || {
            Err(Error::api(503, "ServiceUnavailable", "try later"))
        });

        assert_eq!(callback.0.get(), 2);
    }
}
