//! Exponential backoff for transient federation failures. 4xx responses are
//! final (not retried); 5xx and transport errors back off and retry up to
//! `max_retry_attempts`.

use std::time::Duration;

use ember_common::config::FederationConfig;

/// Backoff delay before retry attempt `attempt` (0-indexed), capped at
/// `retry_cap_secs`.
pub fn backoff(config: &FederationConfig, attempt: u32) -> Duration {
    let base = config.retry_base_secs.saturating_pow(attempt.min(32));
    Duration::from_secs(base.min(config.retry_cap_secs))
}

/// Whether an HTTP status code should be retried at all. 4xx is final; 5xx
/// and anything outside the normal range is transient.
pub fn is_retryable_status(status: u16) -> bool {
    !(400..500).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FederationConfig {
        FederationConfig {
            request_timeout_secs: 30,
            max_retry_attempts: 8,
            retry_base_secs: 2,
            retry_cap_secs: 60,
            circuit_break_threshold: 5,
            circuit_break_ttl_secs: 3600,
        }
    }

    #[test]
    fn backoff_grows_then_caps() {
        let c = config();
        assert_eq!(backoff(&c, 0), Duration::from_secs(1));
        assert_eq!(backoff(&c, 1), Duration::from_secs(2));
        assert_eq!(backoff(&c, 2), Duration::from_secs(4));
        assert_eq!(backoff(&c, 10), Duration::from_secs(60));
    }

    #[test]
    fn client_errors_are_final() {
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(404));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
    }
}
