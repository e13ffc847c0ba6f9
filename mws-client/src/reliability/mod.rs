//! Delivery reliability.
//!
//! Throttle handling for the service's 503 overload signal, retry bounds,
//! and error classification.

mod retry;
mod throttle;

pub use retry::{RetryPolicy, is_retryable};
pub use throttle::{THROTTLE_SAFE_MARGIN, THROTTLED_STATUS, ThrottleConfig, ThrottleRetrier};
