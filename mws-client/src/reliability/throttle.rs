//! Resend-on-503 delivery.
//!
//! The service answers an overloaded request with HTTP 503. The retrier
//! sleeps the operation's configured throttle duration and resends the
//! same signed request:
//!
//! ```text
//! Ready ──send──> Sent ──503──> Throttled ──sleep──> Sent ...
//!                  │
//!                  └──any other status──> done
//! ```
//!
//! Any status other than 503 ends the loop and is returned unchanged.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use super::RetryPolicy;
use crate::{
    clock::Clock,
    error::{MwsError, Result},
    request::SignedRequest,
    transport::{Transport, TransportResponse},
};

/// Status the service uses to signal throttling.
pub const THROTTLED_STATUS: u16 = 503;

/// Extra sleep added to every throttle wait in throttle-safe mode.
pub const THROTTLE_SAFE_MARGIN: Duration = Duration::from_secs(1);

/// Per-operation throttle settings.
///
/// Operations sharing a request quota share a group name; the group is only
/// carried for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleConfig {
    group: String,
    sleep: Duration,
}

impl ThrottleConfig {
    /// Creates throttle settings for a quota group.
    #[must_use]
    pub fn new(group: impl Into<String>, sleep: Duration) -> Self {
        Self { group: group.into(), sleep }
    }

    /// Quota group name.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Configured sleep after a 503.
    #[must_use]
    pub fn sleep(&self) -> Duration {
        self.sleep
    }

    /// Sleep actually taken, including the throttle-safe margin.
    #[must_use]
    pub fn effective_sleep(&self, throttle_safe: bool) -> Duration {
        if throttle_safe { self.sleep + THROTTLE_SAFE_MARGIN } else { self.sleep }
    }
}

impl Default for ThrottleConfig {
    /// One minute, the restore interval of most list operations.
    fn default() -> Self {
        Self::new("default", Duration::from_secs(60))
    }
}

/// Sends a request, sleeping and resending while the service answers 503.
#[derive(Debug)]
pub struct ThrottleRetrier<'a, T, C> {
    transport: &'a T,
    clock: &'a C,
    policy: RetryPolicy,
    throttle_safe: bool,
}

impl<'a, T: Transport, C: Clock> ThrottleRetrier<'a, T, C> {
    /// Creates an unbounded retrier.
    #[must_use]
    pub fn new(transport: &'a T, clock: &'a C) -> Self {
        Self { transport, clock, policy: RetryPolicy::unbounded(), throttle_safe: false }
    }

    /// Bounds the retry loop.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Adds [`THROTTLE_SAFE_MARGIN`] to every sleep.
    #[must_use]
    pub fn throttle_safe(mut self, enabled: bool) -> Self {
        self.throttle_safe = enabled;
        self
    }

    /// Delivers `request`, retrying on 503.
    ///
    /// # Errors
    ///
    /// - [`MwsError::Overloaded`] when the policy's attempt cap or
    ///   deadline is reached while still throttled
    /// - [`MwsError::Cancelled`] when `cancel` fires before a response
    /// - any transport error, unretried
    #[instrument(
        skip_all,
        fields(action = %request.action, group = %throttle.group(), protocol = self.transport.protocol_name())
    )]
    pub async fn send(
        &self,
        request: &SignedRequest,
        throttle: &ThrottleConfig,
        cancel: &CancellationToken,
    ) -> Result<TransportResponse> {
        let started = self.clock.now();
        let sleep = throttle.effective_sleep(self.throttle_safe);
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);

            let response = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(cancelled(attempt)),
                response = self.transport.send(request) => response?,
            };

            if response.status != THROTTLED_STATUS {
                if attempt > 1 {
                    info!(attempt, status = response.status, "request accepted after throttling");
                }
                return Ok(response);
            }

            warn!(attempt, sleep_secs = sleep.as_secs_f64(), "request throttled");

            if !self.policy.allows_attempt(attempt.saturating_add(1)) {
                error!(attempts = attempt, "retry cap reached while throttled");
                return Err(MwsError::Overloaded { attempts: attempt });
            }
            let elapsed = (self.clock.now() - started).to_std().unwrap_or_default();
            if self.policy.exceeds_deadline(elapsed, sleep) {
                error!(attempts = attempt, elapsed_secs = elapsed.as_secs(), "retry deadline reached while throttled");
                return Err(MwsError::Overloaded { attempts: attempt });
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(cancelled(attempt)),
                () = self.clock.sleep(sleep) => {}
            }
        }
    }
}

fn cancelled(attempt: u32) -> MwsError {
    info!(attempt, "throttled send cancelled");
    MwsError::Cancelled
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::{
        clock::{ManualClock, SystemClock},
        signing::Parameters,
        transport::{MockQueue, ReplayTransport},
    };

    fn request() -> SignedRequest {
        SignedRequest {
            url: Url::parse("https://mws.amazonservices.com/Orders/2013-09-01").unwrap(),
            host: "mws.amazonservices.com".to_owned(),
            action: "ListOrders".to_owned(),
            params: Parameters::new(),
            body: String::new(),
        }
    }

    fn replay(list: &str) -> ReplayTransport {
        ReplayTransport::new("mock", MockQueue::parse(list).unwrap())
    }

    fn throttle() -> ThrottleConfig {
        ThrottleConfig::new("ListOrders", Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_retries_until_accepted() {
        let transport = replay("503,503,200");
        let clock = ManualClock::default();
        let retrier = ThrottleRetrier::new(&transport, &clock);

        let response =
            retrier.send(&request(), &throttle(), &CancellationToken::new()).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(clock.total_slept(), Duration::from_secs(120));
        assert_eq!(transport.cursor().await, 3);
    }

    #[tokio::test]
    async fn test_other_status_returned_without_retry() {
        let transport = replay("400,200");
        let clock = ManualClock::default();
        let retrier = ThrottleRetrier::new(&transport, &clock);

        let response =
            retrier.send(&request(), &throttle(), &CancellationToken::new()).await.unwrap();
        assert_eq!(response.status, 400);
        assert!(clock.sleeps().is_empty());
        assert_eq!(transport.cursor().await, 1);
    }

    #[tokio::test]
    async fn test_throttle_safe_adds_margin() {
        let transport = replay("503,200");
        let clock = ManualClock::default();
        let retrier = ThrottleRetrier::new(&transport, &clock).throttle_safe(true);

        retrier.send(&request(), &throttle(), &CancellationToken::new()).await.unwrap();
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(61)]);
    }

    #[tokio::test]
    async fn test_max_attempts_overloaded() {
        let transport = replay("503");
        let clock = ManualClock::default();
        let retrier =
            ThrottleRetrier::new(&transport, &clock).with_policy(RetryPolicy::with_max_attempts(3));

        let result = retrier.send(&request(), &throttle(), &CancellationToken::new()).await;
        assert!(matches!(result, Err(MwsError::Overloaded { attempts: 3 })));
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[tokio::test]
    async fn test_deadline_overloaded() {
        let transport = replay("503");
        let clock = ManualClock::default();
        let policy = RetryPolicy::unbounded().deadline(Duration::from_secs(150));
        let retrier = ThrottleRetrier::new(&transport, &clock).with_policy(policy);

        let result = retrier.send(&request(), &throttle(), &CancellationToken::new()).await;
        // 0s + 60s fits, 60s + 60s fits, 120s + 60s does not
        assert!(matches!(result, Err(MwsError::Overloaded { attempts: 3 })));
        assert_eq!(clock.total_slept(), Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let transport = replay("200");
        let clock = ManualClock::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = ThrottleRetrier::new(&transport, &clock).send(&request(), &throttle(), &cancel).await;
        assert!(matches!(result, Err(MwsError::Cancelled)));
        assert_eq!(transport.cursor().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_during_sleep() {
        let transport = replay("503");
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result =
            ThrottleRetrier::new(&transport, &SystemClock).send(&request(), &throttle(), &cancel).await;
        assert!(matches!(result, Err(MwsError::Cancelled)));
        assert_eq!(transport.cursor().await, 1);
    }

    #[tokio::test]
    async fn test_transport_error_not_retried() {
        let transport = ReplayTransport::new("mock", MockQueue::default());
        let clock = ManualClock::default();

        let result = ThrottleRetrier::new(&transport, &clock)
            .send(&request(), &throttle(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(MwsError::Fixture(_))));
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_throttle_config_default() {
        let config = ThrottleConfig::default();
        assert_eq!(config.group(), "default");
        assert_eq!(config.sleep(), Duration::from_secs(60));
        assert_eq!(config.effective_sleep(true), Duration::from_secs(61));
    }
}
