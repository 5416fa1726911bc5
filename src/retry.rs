//! Reusable retry/backoff policy, shared by graph node execution and the
//! Tool base's retry loop.

use std::time::Duration;

/// Backoff strategy for a failed operation.
#[derive(Debug, Clone)]
pub enum RetryPolicy {
    /// Never retry.
    None,
    /// Retry up to `max_attempts` additional times with a fixed delay.
    Fixed { max_attempts: u32, delay: Duration },
    /// Retry up to `max_attempts` additional times, doubling (times `factor`)
    /// the delay each attempt, capped at `max_delay`.
    Exponential {
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        factor: f64,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::None
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        RetryPolicy::Fixed {
            max_attempts,
            delay,
        }
    }

    pub fn exponential(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        factor: f64,
    ) -> Self {
        RetryPolicy::Exponential {
            max_attempts,
            base_delay,
            max_delay,
            factor,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        match self {
            RetryPolicy::None => 0,
            RetryPolicy::Fixed { max_attempts, .. } => *max_attempts,
            RetryPolicy::Exponential { max_attempts, .. } => *max_attempts,
        }
    }

    /// Delay to wait before retry attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            RetryPolicy::None => Duration::ZERO,
            RetryPolicy::Fixed { delay, .. } => *delay,
            RetryPolicy::Exponential {
                base_delay,
                max_delay,
                factor,
                ..
            } => {
                let scaled = base_delay.as_secs_f64() * factor.powi(attempt.saturating_sub(1) as i32);
                Duration::from_secs_f64(scaled).min(*max_delay)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_never_retries() {
        assert_eq!(RetryPolicy::None.max_attempts(), 0);
    }

    #[test]
    fn exponential_caps_at_max_delay() {
        let policy = RetryPolicy::exponential(
            5,
            Duration::from_millis(100),
            Duration::from_millis(300),
            2.0,
        );
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(300));
        assert_eq!(policy.delay_for(4), Duration::from_millis(300));
    }
}
