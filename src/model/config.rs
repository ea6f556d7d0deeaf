use std::time::Duration;

/// Default values for configuration options.
mod defaults {
    use std::time::Duration;

    /// Per-call deadline in seconds.
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;

    /// Retries after the first attempt.
    pub const MAX_RETRIES: u32 = 2;

    /// Delay before the first retry, in milliseconds. Doubles on each retry.
    pub const INITIAL_BACKOFF_MS: u64 = 500;

    pub fn request_timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }

    pub fn initial_backoff() -> Duration {
        Duration::from_millis(INITIAL_BACKOFF_MS)
    }
}

/// Deadline and retry policy applied by the model caller to every provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCallerConfig {
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for ModelCallerConfig {
    fn default() -> Self {
        Self {
            request_timeout: defaults::request_timeout(),
            max_retries: defaults::MAX_RETRIES,
            initial_backoff: defaults::initial_backoff(),
        }
    }
}

impl ModelCallerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }
}
