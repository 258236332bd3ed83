//! Upload retries and throttled logging of repeated claim faults.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

/// Bounded exponential backoff for one kind of operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    label: &'static str,
    retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    /// `retries` extra attempts after the first, starting at 500ms.
    pub fn new(label: &'static str, retries: u32) -> Self {
        Self {
            label,
            retries,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }

    pub fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Call `op` until it succeeds or the policy's retries are spent. The last
/// error is returned unchanged.
pub async fn retry_async<F, Fut, T, E>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut retry = 0;
    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if retry >= policy.retries {
            return Err(err);
        }
        let wait = policy.backoff(retry);
        retry += 1;
        debug!(retry, ?wait, "{} failed: {}", policy.label, err);
        tokio::time::sleep(wait).await;
    }
}

/// Logs the first few faults of a streak, then goes quiet until it recovers.
#[derive(Debug)]
pub struct LogThrottle {
    streak: u32,
    loud_limit: u32,
}

impl LogThrottle {
    pub fn new(loud_limit: u32) -> Self {
        Self { streak: 0, loud_limit }
    }

    /// Whether this fault should be logged.
    pub fn fault(&mut self) -> bool {
        self.streak += 1;
        if self.streak == self.loud_limit + 1 {
            warn!("{} faults in a row, muting until recovery", self.loud_limit);
        }
        self.streak <= self.loud_limit
    }

    pub fn recovered(&mut self) {
        if self.streak > self.loud_limit {
            info!("Recovered after {} consecutive faults", self.streak);
        }
        self.streak = 0;
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }
}
