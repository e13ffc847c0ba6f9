//! Single-call entry point.
//!
//! [`MwsClient`] binds one store's credentials to a transport, a clock and a
//! retry policy. [`MwsClient::call`] signs a request, delivers it through the
//! throttle retrier, checks the status and parses the body. Every raw
//! response is kept in a bounded history for inspection.

use std::{
    collections::VecDeque,
    fmt,
    sync::{Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, instrument, warn};
use url::Url;

use crate::{
    clock::{Clock, SystemClock},
    config::{ClientConfig, Credentials},
    error::{MwsError, Result, ServiceError},
    reliability::{RetryPolicy, ThrottleConfig, ThrottleRetrier},
    request::{RequestBuilder, RequestContext, SignedRequest},
    signing::{Parameters, SignatureMethod},
    transport::{HttpTransport, MockQueue, ReplayTransport, Transport, TransportResponse},
    xml::XmlNode,
};

/// Number of raw responses retained by the history.
pub const HISTORY_LIMIT: usize = 100;

/// A raw response together with the call that produced it.
#[derive(Debug, Clone)]
pub struct RecordedResponse {
    /// Action that was called.
    pub action: String,
    /// Parameters sent, `Signature` included.
    pub params: Parameters,
    /// When the response was received, per the client's clock.
    pub received_at: DateTime<Utc>,
    /// Status, headers and body as delivered.
    pub response: TransportResponse,
}

#[derive(Debug, Default)]
struct History {
    responses: VecDeque<RecordedResponse>,
    last_error: Option<ServiceError>,
}

/// Signs, sends and checks requests for one store.
pub struct MwsClient<T, C = SystemClock> {
    transport: T,
    clock: C,
    credentials: Credentials,
    service_url: Url,
    method: SignatureMethod,
    policy: RetryPolicy,
    throttle_safe: bool,
    history: Mutex<History>,
}

impl MwsClient<HttpTransport> {
    /// Creates a live client for `store` from a loaded configuration.
    ///
    /// # Errors
    ///
    /// - [`MwsError::Config`] for an unknown store or invalid service URL
    /// - [`MwsError::UnsupportedAlgorithm`] for a bad signature method
    /// - [`MwsError::Transport`] if the HTTP client cannot be built
    pub fn from_config(config: &ClientConfig, store: &str) -> Result<Self> {
        let transport =
            HttpTransport::with_config(&config.http)?.allow_loopback(config.allow_loopback);
        Self::configured(transport, config, store)
    }
}

impl MwsClient<ReplayTransport> {
    /// Creates a client for `store` that replays `queue` from the configured
    /// fixture directory instead of calling the service.
    ///
    /// # Errors
    ///
    /// Same as [`MwsClient::from_config`], minus transport construction.
    pub fn mock(config: &ClientConfig, store: &str, queue: MockQueue) -> Result<Self> {
        let transport = ReplayTransport::new(config.mock.fixture_dir.clone(), queue);
        Self::configured(transport, config, store)
    }
}

impl<T: Transport> MwsClient<T> {
    /// Creates a client with the default signature method, an unbounded
    /// retry policy and the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`MwsError::Config`] if `service_url` is not a valid URL.
    pub fn new(transport: T, credentials: Credentials, service_url: &str) -> Result<Self> {
        let service_url = Url::parse(service_url)
            .map_err(|e| MwsError::Config(format!("invalid service URL '{service_url}': {e}")))?;
        Ok(Self {
            transport,
            clock: SystemClock,
            credentials,
            service_url,
            method: SignatureMethod::default(),
            policy: RetryPolicy::unbounded(),
            throttle_safe: false,
            history: Mutex::new(History::default()),
        })
    }

    fn configured(transport: T, config: &ClientConfig, store: &str) -> Result<Self> {
        let credentials = config.store(store)?;
        Ok(Self {
            transport,
            clock: SystemClock,
            credentials,
            service_url: config.service_url()?,
            method: config.signature_method()?,
            policy: config.retry.policy(),
            throttle_safe: config.throttle_safe,
            history: Mutex::new(History::default()),
        })
    }
}

impl<T: Transport, C: Clock> MwsClient<T, C> {
    /// Replaces the clock.
    #[must_use]
    pub fn with_clock<C2: Clock>(self, clock: C2) -> MwsClient<T, C2> {
        MwsClient {
            transport: self.transport,
            clock,
            credentials: self.credentials,
            service_url: self.service_url,
            method: self.method,
            policy: self.policy,
            throttle_safe: self.throttle_safe,
            history: self.history,
        }
    }

    /// Sets the signature method.
    #[must_use]
    pub fn with_signature_method(mut self, method: SignatureMethod) -> Self {
        self.method = method;
        self
    }

    /// Bounds the throttle retry loop.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Adds a one-second margin to every throttle sleep.
    #[must_use]
    pub fn with_throttle_safe(mut self, enabled: bool) -> Self {
        self.throttle_safe = enabled;
        self
    }

    /// Signs a request as of the client's current time.
    ///
    /// # Errors
    ///
    /// See [`RequestBuilder::build`].
    pub fn sign(&self, context: &RequestContext) -> Result<SignedRequest> {
        RequestBuilder::new(&self.credentials, &self.service_url, self.method)
            .build(context, self.clock.now())
    }

    /// Signs, sends and parses one call.
    ///
    /// Throttled responses are retried per the client's policy. The final
    /// response is recorded in the history before its status is checked.
    ///
    /// # Errors
    ///
    /// - [`MwsError::Http`] for a non-success status, with the error
    ///   envelope's code and message verbatim
    /// - [`MwsError::Xml`] if a success body is not well-formed
    /// - every error of [`sign`](Self::sign) and
    ///   [`ThrottleRetrier::send`]
    #[instrument(skip_all, fields(action = %context.action, store = %self.credentials.store()))]
    pub async fn call(
        &self,
        context: &RequestContext,
        throttle: &ThrottleConfig,
        cancel: &CancellationToken,
    ) -> Result<XmlNode> {
        let request = self.sign(context)?;
        let response = ThrottleRetrier::new(&self.transport, &self.clock)
            .with_policy(self.policy)
            .throttle_safe(self.throttle_safe)
            .send(&request, throttle, cancel)
            .await?;

        self.record(&request, &response);

        if !response.is_success() {
            let service_error = ServiceError::from_response(response.status, &response.body);
            error!(
                status = response.status,
                code = %service_error.code,
                message = %service_error.message,
                request_id = service_error.request_id.as_deref().unwrap_or(""),
                "service returned an error"
            );
            self.lock_history().last_error = Some(service_error.clone());
            return Err(MwsError::Http(service_error));
        }

        XmlNode::parse(&response.body).inspect_err(|e| {
            warn!(status = response.status, error = %e, "malformed response body");
        })
    }

    fn record(&self, request: &SignedRequest, response: &TransportResponse) {
        let mut history = self.lock_history();
        if history.responses.len() == HISTORY_LIMIT {
            history.responses.pop_front();
        }
        history.responses.push_back(RecordedResponse {
            action: request.action.clone(),
            params: request.params.clone(),
            received_at: self.clock.now(),
            response: response.clone(),
        });
    }

    fn lock_history(&self) -> std::sync::MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Most recent raw response.
    #[must_use]
    pub fn last_response(&self) -> Option<RecordedResponse> {
        self.lock_history().responses.back().cloned()
    }

    /// Retained raw responses, oldest first.
    #[must_use]
    pub fn raw_responses(&self) -> Vec<RecordedResponse> {
        self.lock_history().responses.iter().cloned().collect()
    }

    /// Most recent service error envelope.
    #[must_use]
    pub fn last_error(&self) -> Option<ServiceError> {
        self.lock_history().last_error.clone()
    }

    /// Drops the response history and last error.
    pub fn clear_history(&self) {
        *self.lock_history() = History::default();
    }

    /// Credentials of the bound store.
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Clock used for timestamps and throttle sleeps.
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Service base URL.
    #[must_use]
    pub fn service_url(&self) -> &Url {
        &self.service_url
    }
}

impl<T: Transport, C> fmt::Debug for MwsClient<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MwsClient")
            .field("store", &self.credentials.store())
            .field("service_url", &self.service_url.as_str())
            .field("transport", &self.transport.protocol_name())
            .field("signature_method", &self.method)
            .field("policy", &self.policy)
            .field("throttle_safe", &self.throttle_safe)
            .finish_non_exhaustive()
    }
}
