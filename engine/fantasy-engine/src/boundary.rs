//! Timeout and bounded retry around persistence calls
//!
//! Every repository call made by the engine goes through [`Boundary::call`]. A call
//! that exceeds the configured timeout becomes [`FantasyError::Timeout`]; retryable
//! errors are retried with exponential backoff, domain errors are returned at once.

use std::future::Future;
use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::config::BoundaryConfig;
use crate::error::{FantasyError, Result};

#[derive(Debug, Clone, Default)]
pub struct Boundary {
    config: BoundaryConfig,
}

impl Boundary {
    pub fn new(config: BoundaryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BoundaryConfig {
        &self.config
    }

    /// Run `f` under the timeout, retrying retryable failures
    pub async fn call<F, Fut, T>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let outcome = match timeout(self.config.timeout(), f()).await {
                Ok(result) => result,
                Err(_) => Err(FantasyError::Timeout {
                    operation: operation.to_string(),
                    after_ms: self.config.timeout_ms,
                }),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.config.backoff_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        "Persistence call failed: {}, retrying in {:?}",
                        e,
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn fast() -> Boundary {
        Boundary::new(BoundaryConfig {
            timeout_ms: 50,
            max_attempts: 3,
            initial_backoff_ms: 1,
            backoff_multiplier: 2.0,
            max_backoff_ms: 5,
        })
    }

    #[tokio::test]
    async fn test_retries_infrastructure_errors_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = fast()
            .call("flaky", || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(FantasyError::infrastructure("connection reset"))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<()> = fast()
            .call("down", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(FantasyError::infrastructure("down"))
                }
            })
            .await;
        assert!(matches!(result, Err(FantasyError::Infrastructure { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_domain_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<()> = fast()
            .call("create_team", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(FantasyError::ContestFull { contest_id: 1, max_entries: 2 })
                }
            })
            .await;
        assert!(matches!(result, Err(FantasyError::ContestFull { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let boundary = Boundary::new(BoundaryConfig { max_attempts: 1, timeout_ms: 10, ..fast().config });
        let result: Result<()> = boundary
            .call("get_contest", || async {
                sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await;
        match result {
            Err(FantasyError::Timeout { operation, after_ms }) => {
                assert_eq!(operation, "get_contest");
                assert_eq!(after_ms, 10);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
