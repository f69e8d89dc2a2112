use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::FetchError;

/// Retry policy for outbound fetches: a fixed number of attempts separated by
/// a random pause of 1..=`max_delay_secs` seconds.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub max_delay_secs: u64,
}

impl RetryPolicy {
    fn pause(&self) -> Duration {
        if self.max_delay_secs == 0 {
            return Duration::ZERO;
        }
        let secs = rand::thread_rng().gen_range(1..=self.max_delay_secs);
        Duration::from_secs(secs)
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, url: &str, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempt >= attempts => {
                    return Err(FetchError::Exhausted {
                        url: url.to_string(),
                        attempts,
                        last: Box::new(e),
                    })
                }
                Err(e) => {
                    let pause = self.pause();
                    warn!(
                        "Attempt {}/{} for {} failed: {}. Retrying in {:?}",
                        attempt, attempts, url, e, pause
                    );
                    tokio::time::sleep(pause).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::protocol::ProtocolError;
    use std::sync::atomic::{AtomicU32, Ordering};

    const NO_WAIT: RetryPolicy = RetryPolicy {
        attempts: 4,
        max_delay_secs: 0,
    };

    fn unavailable() -> FetchError {
        FetchError::Status {
            url: "u".into(),
            status: 503,
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = NO_WAIT
            .run("u", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(unavailable())
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_the_last_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = NO_WAIT
            .run("u", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(unavailable())
            })
            .await;

        assert!(matches!(result, Err(FetchError::Exhausted { attempts: 4, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = NO_WAIT
            .run("u", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::Protocol(ProtocolError::MissingPost))
            })
            .await;

        assert!(matches!(result, Err(FetchError::Protocol(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pause_stays_within_bounds() {
        let policy = RetryPolicy {
            attempts: 4,
            max_delay_secs: 15,
        };
        for _ in 0..50 {
            let pause = policy.pause();
            assert!(pause >= Duration::from_secs(1) && pause <= Duration::from_secs(15));
        }
    }
}
