//! Retry policy shared by every provider

use paperkg_domain::ProviderFailure;
use std::fmt;
use std::time::Duration;

/// Default number of attempts per document
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay before the retry that follows attempt `attempt_index` (0-based)
pub type BackoffFn = fn(u32) -> Duration;

/// Whether a failure must stop all further work instead of being retried
pub type FatalPredicate = fn(&ProviderFailure) -> bool;

/// Exponential backoff: `2^attempt_index` seconds (1s, 2s, 4s, ...)
pub fn exponential_backoff(attempt_index: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt_index))
}

/// No delay between attempts
pub fn no_backoff(_attempt_index: u32) -> Duration {
    Duration::ZERO
}

/// Fatal when the account balance or quota is exhausted
pub fn quota_exhausted(failure: &ProviderFailure) -> bool {
    failure.is_quota_exhausted()
}

/// Retry/backoff policy parameterized by attempt count, backoff function and
/// fatal-condition predicate
///
/// # Examples
///
/// ```
/// use paperkg_llm::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(4);
/// assert_eq!(policy.delay_before_retry(0), Duration::from_secs(1));
/// assert_eq!(policy.delay_before_retry(2), Duration::from_secs(4));
/// ```
#[derive(Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (at least one attempt is always made)
    pub max_attempts: u32,

    /// Delay function
    pub backoff: BackoffFn,

    /// Fatal-condition predicate
    pub is_fatal: FatalPredicate,
}

impl RetryPolicy {
    /// Policy with the given attempt count, exponential backoff and the
    /// quota circuit breaker
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: exponential_backoff,
            is_fatal: quota_exhausted,
        }
    }

    /// Replace the backoff function
    pub fn with_backoff(mut self, backoff: BackoffFn) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replace the fatal-condition predicate
    pub fn with_fatal(mut self, is_fatal: FatalPredicate) -> Self {
        self.is_fatal = is_fatal;
        self
    }

    /// Effective attempt count
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after attempt `attempt_index` failed
    pub fn delay_before_retry(&self, attempt_index: u32) -> Duration {
        (self.backoff)(attempt_index)
    }

    /// Whether `failure` is fatal under this policy
    pub fn is_fatal(&self, failure: &ProviderFailure) -> bool {
        (self.is_fatal)(failure)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}
