//! Bounded retries with exponential backoff.

use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;

use crate::Error;

/// Describes how an operation is retried.
///
/// The operation runs at most `max_attempts` times. The delay before the
/// second attempt is `initial_delay`, and it's multiplied by `multiplier`
/// before each following attempt, capped at `max_delay`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Growth factor of the delay.
    pub multiplier: f64,
    /// Upper bound of a single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy that doubles the delay after each attempt.
    #[inline]
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            ..Default::default()
        }
    }

    /// Sets the growth factor of the delay.
    #[inline]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    fn backoff(&self) -> BoundedBackoff {
        let inner = ExponentialBackoff {
            current_interval: self.initial_delay,
            initial_interval: self.initial_delay,
            randomization_factor: 0.0,
            multiplier: self.multiplier,
            max_interval: self.max_delay,
            max_elapsed_time: None,
            ..Default::default()
        };
        BoundedBackoff {
            inner,
            max_retries: self.max_attempts.saturating_sub(1),
            retries: 0,
        }
    }
}

/// An exponential backoff that gives up after a fixed number of retries.
struct BoundedBackoff {
    inner: ExponentialBackoff,
    max_retries: u32,
    retries: u32,
}

impl Backoff for BoundedBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.retries >= self.max_retries {
            return None;
        }
        self.retries += 1;
        self.inner.next_backoff()
    }

    fn reset(&mut self) {
        self.retries = 0;
        self.inner.reset();
    }
}

/// Runs `op` until it succeeds, fails permanently, or the policy runs out
/// of attempts. The last error is returned in the latter two cases.
///
/// Errors whose kind [`is_permanent`] are never retried.
///
/// [`is_permanent`]: grounded_chat_model::ErrorKind::is_permanent
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    backoff::future::retry_notify(
        policy.backoff(),
        || {
            let fut = op();
            async move {
                fut.await.map_err(|err| {
                    if err.kind().is_permanent() {
                        backoff::Error::permanent(err)
                    } else {
                        backoff::Error::transient(err)
                    }
                })
            }
        },
        |err: Error, delay: Duration| {
            warn!("{label} failed, retrying in {delay:?}: {err}");
        },
    )
    .await
}
