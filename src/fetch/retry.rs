//! Bounded retry policy for fetches.

use std::fmt;
use std::time::Duration;

/// Why a single attempt did not produce content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    /// The server answered with a non-success status.
    Status(u16),
    /// No usable response: connection, TLS, body read, or timeout.
    Transport { message: String, timeout: bool },
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Status(status) => write!(f, "HTTP {status}"),
            AttemptError::Transport { message, timeout: true } => write!(f, "timed out: {message}"),
            AttemptError::Transport { message, .. } => f.write_str(message),
        }
    }
}

/// Transport errors, timeouts, 5xx, 408 and 429 are worth another attempt.
pub fn default_retryable(err: &AttemptError) -> bool {
    match err {
        AttemptError::Transport { .. } => true,
        AttemptError::Status(status) => *status >= 500 || *status == 408 || *status == 429,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    Fixed(Duration),
    Exponential {
        initial: Duration,
        max: Duration,
        multiplier: f64,
    },
}

impl Backoff {
    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        match self {
            Backoff::Fixed(delay) => *delay,
            Backoff::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let mut delay = *initial;
                for _ in 1..retry {
                    let next_ms = (delay.as_millis() as f64 * multiplier) as u64;
                    delay = Duration::from_millis(next_ms).min(*max);
                }
                delay.min(*max)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub backoff: Backoff,
    pub retryable: fn(&AttemptError) -> bool,
}

impl RetryPolicy {
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed(delay),
            retryable: default_retryable,
        }
    }

    pub fn never() -> Self {
        Self::fixed(0, Duration::ZERO)
    }

    /// Whether attempt number `attempt` (1-based) that failed with `err`
    /// should be followed by another.
    pub fn should_retry(&self, attempt: u32, err: &AttemptError) -> bool {
        attempt <= self.max_retries && (self.retryable)(err)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(5))
    }
}
