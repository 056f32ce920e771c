use std::time::Duration;

/// Bounded linear backoff for reopening a failed allow-list listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResubscribePolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl ResubscribePolicy {
    /// Creates a policy allowing `max_attempts` consecutive attempts, waiting
    /// `backoff * attempt` before each one.
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Never reopens a failed listener.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Returns the configured attempt cap.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the wait before `attempt` (1-based), or `None` once exhausted.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }

        Some(self.backoff.saturating_mul(attempt))
    }
}

impl Default for ResubscribePolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(1000))
    }
}
