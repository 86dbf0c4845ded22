//! Transport retry/backoff shape for [`super::sync_document`].
//!
//! Grounded on `braid-http::client::retry::{RetryConfig, RetryState}`, but
//! adapted from HTTP-status-code retry to the single `YorkieError::
//! is_retryable()` signal the [`crate::coordinator::Coordinator`] boundary
//! exposes (there are no status codes to inspect on this side of the
//! trait).

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: Option<u32>,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(3),
        }
    }
}

impl RetryConfig {
    pub fn no_retry() -> Self {
        Self {
            max_retries: Some(0),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = Some(max);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    Retry(Duration),
    DontRetry,
}

/// Tracks attempts and the current backoff across one `sync` call's retry
/// loop; discarded once the call succeeds or gives up.
#[derive(Debug, Clone)]
pub struct RetryState {
    attempts: u32,
    current_backoff: Duration,
    config: RetryConfig,
}

impl RetryState {
    pub fn new(config: RetryConfig) -> Self {
        let current_backoff = config.initial_backoff;
        Self {
            attempts: 0,
            current_backoff,
            config,
        }
    }

    pub fn decide(&mut self) -> RetryDecision {
        self.attempts += 1;
        if let Some(max) = self.config.max_retries {
            if self.attempts > max {
                return RetryDecision::DontRetry;
            }
        }
        let wait = self.current_backoff;
        self.current_backoff = std::cmp::min(self.current_backoff * 2, self.config.max_backoff);
        RetryDecision::Retry(wait)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_after_max_retries() {
        let mut state = RetryState::new(RetryConfig::default().with_max_retries(1));
        assert!(matches!(state.decide(), RetryDecision::Retry(_)));
        assert_eq!(state.decide(), RetryDecision::DontRetry);
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let mut state = RetryState::new(RetryConfig {
            max_retries: None,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(300),
        });
        assert_eq!(state.decide(), RetryDecision::Retry(Duration::from_millis(100)));
        assert_eq!(state.decide(), RetryDecision::Retry(Duration::from_millis(200)));
        assert_eq!(state.decide(), RetryDecision::Retry(Duration::from_millis(300)));
    }

    #[test]
    fn no_retry_never_retries() {
        let mut state = RetryState::new(RetryConfig::no_retry());
        assert_eq!(state.decide(), RetryDecision::DontRetry);
    }
}
