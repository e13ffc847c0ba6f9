//! Transport abstraction layer.
//!
//! A sealed `Transport` trait delivers a [`SignedRequest`] and hands back the
//! raw response. Two implementations exist:
//!
//! - [`HttpTransport`]: live POST to the service over reqwest
//! - [`ReplayTransport`]: deterministic fixture replay, never touches the
//!   network
//!
//! Transports never interpret status codes and never retry; throttling is
//! handled one layer up by [`ThrottleRetrier`](crate::reliability::ThrottleRetrier).
//!
//! # Examples
//!
//! ```rust,no_run
//! use mws_client::{
//!     request::{ApiSection, RequestBuilder, RequestContext},
//!     config::{Credentials, SecretKey},
//!     signing::{Parameters, SignatureMethod},
//!     transport::{HttpTransport, Transport},
//! };
//! use url::Url;
//!
//! # async fn example() -> mws_client::error::Result<()> {
//! let transport = HttpTransport::new()?;
//! let credentials = Credentials::new("main", "A1SELLER", "AKIA", Some(SecretKey::new("secret")));
//! let url = Url::parse("https://mws.amazonservices.com").unwrap();
//!
//! let request = RequestBuilder::new(&credentials, &url, SignatureMethod::HmacSha256).build(
//!     &RequestContext::new("GetServiceStatus", ApiSection::orders(), Parameters::new()),
//!     chrono::Utc::now(),
//! )?;
//!
//! let response = transport.send(&request).await?;
//! println!("{}", response.status_line);
//! # Ok(())
//! # }
//! ```

#[allow(
    redundant_imports,
    reason = "Future needed for RPITIT despite being in Edition 2024 prelude"
)]
use std::future::Future;

use crate::{error::Result, request::SignedRequest};

pub mod config;
pub mod http;
pub mod replay;
mod sealed;

pub use config::{HttpConfig, HttpVersion};
pub use http::{FORM_CONTENT_TYPE, HttpTransport};
pub use replay::{MockEntry, MockQueue, ReplayTransport};

/// Raw response from a transport.
///
/// Returned for every status code; callers decide what a status means.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Status code with its reason phrase, e.g. `503 Service Unavailable`.
    pub status_line: String,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Response body as text.
    pub body: String,
}

impl TransportResponse {
    /// Builds a response, deriving the status line from the code.
    #[must_use]
    pub fn new(status: u16, headers: Vec<(String, String)>, body: String) -> Self {
        Self { status, status_line: status_line(status), headers, body }
    }

    /// True for 2xx and 3xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }

    /// First header with the given name, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }
}

/// Status code plus its canonical reason phrase, when it has one.
#[must_use]
pub fn status_line(status: u16) -> String {
    match reqwest::StatusCode::from_u16(status).ok().and_then(|s| s.canonical_reason()) {
        Some(reason) => format!("{status} {reason}"),
        None => status.to_string(),
    }
}

/// True for `localhost` and loopback IP literals.
pub(crate) fn is_loopback(host: &str) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']').to_lowercase();
    host == "localhost" || host == "::1" || host.starts_with("127.")
}

/// Delivery of signed requests.
///
/// This trait is sealed: only the transports in this crate implement it.
pub trait Transport: sealed::private::Sealed + Send + Sync {
    /// Sends a signed request and returns the response whatever its status.
    ///
    /// # Errors
    ///
    /// Returns [`MwsError::Transport`](crate::error::MwsError::Transport)
    /// on connection failure and
    /// [`MwsError::Fixture`](crate::error::MwsError::Fixture) when a
    /// replay fixture cannot be produced.
    fn send<'a>(
        &'a self,
        request: &'a SignedRequest,
    ) -> impl Future<Output = Result<TransportResponse>> + Send + 'a;

    /// Protocol name for logging, e.g. `http/1.1` or `replay`.
    fn protocol_name(&self) -> &'static str;
}
