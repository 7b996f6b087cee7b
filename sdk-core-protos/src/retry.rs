use std::time::Duration;

/// Governs automatic re-execution of a failing activity or workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Option<Duration>,
    pub backoff_coefficient: f64,
    pub maximum_interval: Option<Duration>,
    /// `0` = unlimited, `1` = no retry, `N` = N total attempts.
    pub maximum_attempts: u32,
    pub non_retryable_error_types: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Some(Duration::from_secs(1)),
            backoff_coefficient: 2.0,
            maximum_interval: None,
            maximum_attempts: 0,
            non_retryable_error_types: Vec::new(),
        }
    }
}

impl RetryPolicy {
    /// Computes the delay before the given (1-indexed) attempt number,
    /// honoring `maximumInterval` as a ceiling. Returns `None` once
    /// `maximum_attempts` has been exhausted.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if self.maximum_attempts != 0 && attempt >= self.maximum_attempts {
            return None;
        }
        let initial = self.initial_interval.unwrap_or(Duration::from_secs(1));
        let exp = (attempt.saturating_sub(1)) as i32;
        let factor = self.backoff_coefficient.powi(exp);
        let millis = (initial.as_millis() as f64 * factor) as u64;
        let mut delay = Duration::from_millis(millis);
        if let Some(max) = self.maximum_interval {
            if delay > max {
                delay = max;
            }
        }
        Some(delay)
    }
}
