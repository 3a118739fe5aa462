use std::future::Future;
use std::time::Duration;

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_BASE_DELAY_MS: u64 = 300;

/// Bounded polling with a doubling delay, used to wait for freshly written rows to become
/// readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn from_env() -> Self {
        let max_attempts = std::env::var("SCORE_POLL_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|n| *n >= 1)
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);

        let base_delay_ms = std::env::var("SCORE_POLL_BASE_DELAY_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_BASE_DELAY_MS);

        Self {
            max_attempts,
            base_delay: Duration::from_millis(base_delay_ms),
        }
    }

    /// Delay after the given 1-based attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << shift)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability<T> {
    Ready(T),
    NotYetAvailable { attempts: u32 },
}

impl<T> Availability<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            Availability::Ready(v) => Some(v),
            Availability::NotYetAvailable { .. } => None,
        }
    }
}

/// Calls `fetch` until it yields `Some`, sleeping between attempts per `policy`.
///
/// Errors from `fetch` end the poll immediately; running out of attempts is not an error and
/// comes back as [`Availability::NotYetAvailable`].
pub async fn poll_until_available<T, F, Fut>(
    policy: RetryPolicy,
    what: &str,
    mut fetch: F,
) -> anyhow::Result<Availability<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<Option<T>>>,
{
    let max_attempts = policy.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        if let Some(v) = fetch().await? {
            return Ok(Availability::Ready(v));
        }
        if attempt < max_attempts {
            let backoff = policy.delay_after(attempt);
            tracing::debug!(what, attempt, ?backoff, "not yet available; polling again");
            tokio::time::sleep(backoff).await;
        }
    }

    tracing::warn!(what, attempts = max_attempts, "gave up waiting for data");
    Ok(Availability::NotYetAvailable {
        attempts: max_attempts,
    })
}
