//! Exponential-backoff retry, grounded on subx-cli's `services::ai::retry`.

use crate::Result;
use crate::error::OrchestratorError;
use tokio::time::{Duration, sleep};

/// Retry policy: attempt count and backoff shape.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: usize,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

/// Retry `operation` with exponential backoff, per spec §4.A: transient
/// failures are retried up to `config.max_attempts`; anything
/// [`OrchestratorError::retryable`] reports `false` for is returned
/// immediately without consuming further attempts.
pub async fn retry_with_backoff<F, Fut, T>(operation: F, config: &RetryConfig) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_error: Option<OrchestratorError> = None;

    for attempt in 0..config.max_attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !e.retryable() {
                    return Err(e);
                }
                last_error = Some(e);
                if attempt < config.max_attempts - 1 {
                    let delay = std::cmp::min(
                        Duration::from_millis(
                            (config.base_delay.as_millis() as f64
                                * config.backoff_multiplier.powi(attempt as i32))
                                as u64,
                        ),
                        config.max_delay,
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    Err(last_error.expect("loop always runs at least once"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    #[tokio::test]
    async fn succeeds_on_second_attempt() {
        let config = RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        };
        let count = Arc::new(Mutex::new(0));
        let count_clone = count.clone();
        let op = || async {
            let mut c = count_clone.lock().unwrap();
            *c += 1;
            if *c == 1 {
                Err(OrchestratorError::llm_transient("first attempt fails"))
            } else {
                Ok("ok".to_string())
            }
        };
        let result = retry_with_backoff(op, &config).await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn exhausts_max_attempts() {
        let config = RetryConfig {
            max_attempts: 2,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            backoff_multiplier: 2.0,
        };
        let count = Arc::new(Mutex::new(0));
        let count_clone = count.clone();
        let op = || async {
            *count_clone.lock().unwrap() += 1;
            Err::<String, _>(OrchestratorError::llm_transient("always fails"))
        };
        let result = retry_with_backoff(op, &config).await;
        assert!(result.is_err());
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn non_retryable_errors_stop_immediately() {
        let config = RetryConfig::default();
        let count = Arc::new(Mutex::new(0));
        let count_clone = count.clone();
        let op = || async {
            *count_clone.lock().unwrap() += 1;
            Err::<String, _>(OrchestratorError::llm_fatal("bad credentials"))
        };
        let result = retry_with_backoff(op, &config).await;
        assert!(result.is_err());
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn delay_is_capped_at_max_delay() {
        let config = RetryConfig {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(150),
            backoff_multiplier: 4.0,
        };
        let times = Arc::new(Mutex::new(Vec::new()));
        let times_clone = times.clone();
        let op = || async {
            times_clone.lock().unwrap().push(Instant::now());
            Err::<String, _>(OrchestratorError::llm_transient("always fails"))
        };
        let _ = retry_with_backoff(op, &config).await;
        let times = times.lock().unwrap();
        if times.len() >= 3 {
            let gap = times[2].duration_since(times[1]);
            assert!(gap <= Duration::from_millis(200));
        }
    }
}
