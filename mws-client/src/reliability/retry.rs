//! Retry bounds and error classification.
//!
//! The service signals overload with HTTP 503 and expects the caller to wait
//! and resend. How long to wait is per operation ([`ThrottleConfig`]); how
//! many times to try, or for how long, is the caller's [`RetryPolicy`].
//!
//! [`ThrottleConfig`]: super::ThrottleConfig

use std::time::Duration;

use crate::MwsError;

/// Bounds on the throttle retry loop.
///
/// The default is unbounded: a throttled request is resent until the
/// service accepts it or the caller cancels.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use mws_client::reliability::RetryPolicy;
///
/// let policy = RetryPolicy::unbounded();
/// assert!(policy.allows_attempt(1_000));
///
/// let capped = RetryPolicy::with_max_attempts(3).deadline(Duration::from_secs(60));
/// assert!(capped.allows_attempt(3));
/// assert!(!capped.allows_attempt(4));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of requests per call, including the first.
    pub max_attempts: Option<u32>,
    /// Maximum time from the first attempt, sleeps included.
    pub deadline: Option<Duration>,
}

impl RetryPolicy {
    /// Retries forever.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self { max_attempts: None, deadline: None }
    }

    /// Caps the number of attempts.
    #[must_use]
    pub const fn with_max_attempts(max_attempts: u32) -> Self {
        Self { max_attempts: Some(max_attempts), deadline: None }
    }

    /// Adds a deadline.
    #[must_use]
    pub const fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Whether attempt number `attempt` (1-based) may be sent.
    #[must_use]
    pub fn allows_attempt(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt <= max)
    }

    /// Whether sleeping `next_sleep` after `elapsed` would pass the deadline.
    #[must_use]
    pub fn exceeds_deadline(&self, elapsed: Duration, next_sleep: Duration) -> bool {
        self.deadline.is_some_and(|deadline| elapsed.saturating_add(next_sleep) > deadline)
    }
}

/// Determines if an error is worth retrying later.
///
/// Returns `true` for exhausted throttle retries and for transient network
/// failures (timeouts, refused connections). Everything else is a
/// permanent failure that a retry would only repeat.
///
/// # Examples
///
/// ```
/// use mws_client::{MwsError, reliability::is_retryable};
///
/// assert!(is_retryable(&MwsError::Overloaded { attempts: 5 }));
/// assert!(!is_retryable(&MwsError::MissingCredential { store: "main".into() }));
/// assert!(!is_retryable(&MwsError::Cancelled));
/// ```
#[must_use]
#[allow(
    clippy::match_same_arms,
    reason = "arms grouped by failure source"
)]
pub fn is_retryable(error: &MwsError) -> bool {
    match error {
        MwsError::Overloaded { .. } => true,
        MwsError::Transport(e) => e.is_timeout() || e.is_connect(),
        // The service rejected the request itself
        MwsError::Http(_) | MwsError::EchoMismatch { .. } | MwsError::Xml(_) => false,
        // Local problems that a retry cannot fix
        MwsError::Config(_)
        | MwsError::MissingCredential { .. }
        | MwsError::UnsupportedAlgorithm(_)
        | MwsError::Fixture(_)
        | MwsError::InvalidInput(_) => false,
        MwsError::Cancelled => false,
    }
}
