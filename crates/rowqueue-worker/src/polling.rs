//! Poll policies and the deadline-bounded poll loop shared by the lock and
//! the queue fetcher.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use rowqueue_core::config::MAX_SPAN_SECONDS;
use rowqueue_core::error::AppError;
use rowqueue_core::result::AppResult;

/// Decides how long to wait between unsuccessful attempts.
pub trait PollPolicy: Send + Sync + std::fmt::Debug + 'static {
    /// Delay after the `misses`-th consecutive miss (starting at 0).
    fn next_delay(&self, misses: u32) -> Duration;
}

/// Same interval every time, plus jitter.
#[derive(Debug, Clone, Copy)]
pub struct FixedInterval {
    interval: Duration,
    jitter: Duration,
}

impl FixedInterval {
    /// Create a fixed policy.
    pub fn new(interval: Duration, jitter: Duration) -> Self {
        Self { interval, jitter }
    }
}

impl PollPolicy for FixedInterval {
    fn next_delay(&self, _misses: u32) -> Duration {
        jittered(self.interval, self.jitter)
    }
}

/// Doubling interval capped at `max`, plus jitter.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    jitter: Duration,
}

impl ExponentialBackoff {
    /// Create a backoff policy.
    pub fn new(initial: Duration, max: Duration, jitter: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            jitter,
        }
    }
}

impl PollPolicy for ExponentialBackoff {
    fn next_delay(&self, misses: u32) -> Duration {
        let factor = 1u32.checked_shl(misses.min(16)).unwrap_or(u32::MAX);
        let base = self.initial.saturating_mul(factor).min(self.max);
        jittered(base, self.jitter)
    }
}

/// `base` plus a uniformly random extra in `0..=jitter`.
fn jittered(base: Duration, jitter: Duration) -> Duration {
    let jitter_ms = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
    if jitter_ms == 0 {
        return base;
    }
    let extra = rand::random::<u64>() % jitter_ms.saturating_add(1);
    base.saturating_add(Duration::from_millis(extra))
}

/// Convert a configured span into a `chrono` duration for timestamp math.
///
/// Spans longer than [`MAX_SPAN_SECONDS`] are rejected so that adding them
/// to or subtracting them from a timestamp cannot overflow.
pub(crate) fn to_chrono(span: Duration, setting: &str) -> AppResult<chrono::Duration> {
    if span.as_secs() > MAX_SPAN_SECONDS {
        return Err(AppError::configuration(format!(
            "{setting} must not exceed {MAX_SPAN_SECONDS} seconds"
        )));
    }
    chrono::Duration::from_std(span)
        .map_err(|_| AppError::configuration(format!("{setting} is out of range")))
}

/// Run `attempt` until it yields a value, the deadline passes, or `cancel`
/// fires.
///
/// Transient store errors are logged and retried within the deadline; other
/// errors are returned as is. A zero `timeout` makes exactly one attempt; a
/// timeout too large to form a deadline (such as `Duration::MAX`) waits until
/// success or cancellation.
pub async fn poll_until<T, F, Fut>(
    what: &str,
    policy: &dyn PollPolicy,
    timeout: Duration,
    cancel: &CancellationToken,
    mut attempt: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<Option<T>>>,
{
    let deadline = Instant::now().checked_add(timeout);
    let mut misses = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(AppError::cancelled(format!("{what} was cancelled")));
        }

        match attempt().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e) if e.is_transient() => {
                warn!(what, error = %e, "Transient store error, retrying");
            }
            Err(e) => return Err(e),
        }

        let mut delay = policy.next_delay(misses);
        if let Some(deadline) = deadline {
            let now = Instant::now();
            if now >= deadline {
                return Err(AppError::timeout(format!(
                    "{what} timed out after {}ms",
                    timeout.as_millis()
                )));
            }
            delay = delay.min(deadline - now);
        }
        misses = misses.saturating_add(1);
        debug!(what, delay_ms = delay.as_millis() as u64, "Nothing available, backing off");

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(AppError::cancelled(format!("{what} was cancelled")));
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
