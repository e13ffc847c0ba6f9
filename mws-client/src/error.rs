//! Error types for the MWS request engine.
//!
//! This module defines all error types that can occur while building, signing,
//! sending and paginating requests. All errors implement the standard
//! [`std::error::Error`] trait via [`thiserror::Error`].
//!
//! # Error Categories
//!
//! - **Configuration Errors** ([`MwsError::Config`], [`MwsError::MissingCredential`]):
//!   fatal, raised before any request leaves the process
//! - **Signing Errors** ([`MwsError::UnsupportedAlgorithm`])
//! - **Delivery Errors** ([`MwsError::Transport`], [`MwsError::Fixture`],
//!   [`MwsError::Overloaded`], [`MwsError::Cancelled`])
//! - **Service Errors** ([`MwsError::Http`]): the service answered with an error envelope
//! - **Response Errors** ([`MwsError::Xml`], [`MwsError::EchoMismatch`])
//!
//! # Examples
//!
//! ```
//! use mws_client::error::{MwsError, Result};
//!
//! fn require_seller(seller_id: &str) -> Result<&str> {
//!     if seller_id.is_empty() {
//!         return Err(MwsError::Config("seller_id must not be empty".to_owned()));
//!     }
//!     Ok(seller_id)
//! }
//!
//! assert!(require_seller("").is_err());
//! ```

use std::fmt;

use thiserror::Error;

use crate::xml::XmlNode;

/// Result type alias for engine operations.
///
/// All fallible functions in this crate return this type.
pub type Result<T> = std::result::Result<T, MwsError>;

/// Errors that can occur in the request engine.
///
/// Every variant is logged through `tracing` where it is produced, so callers
/// can treat the returned value as the failure signal without logging again.
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum MwsError {
    /// Configuration could not be loaded or is invalid.
    ///
    /// Raised when the configuration file is unreadable, is not valid TOML,
    /// names an unknown store, or carries an invalid service URL.
    #[error("configuration error: {0}")]
    Config(String),

    /// The active store has no secret key, so requests cannot be signed.
    #[error("no secret key configured for store '{store}'")]
    MissingCredential {
        /// Store whose secret key is missing.
        store: String,
    },

    /// Signature method is neither `HmacSHA1` nor `HmacSHA256`.
    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Network or connection failure.
    ///
    /// Not retried automatically; only HTTP 503 responses go through the
    /// throttle retry loop.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// Replay transport could not produce a fixture.
    ///
    /// Raised when the mock queue is empty or a fixture file cannot be read.
    #[error("fixture replay failed: {0}")]
    Fixture(String),

    /// The service kept answering 503 until the retry cap or deadline was hit.
    #[error("service overloaded after {attempts} attempts")]
    Overloaded {
        /// Number of requests sent before giving up.
        attempts: u32,
    },

    /// The service returned a non-success status with an error envelope.
    #[error("service error: {0}")]
    Http(ServiceError),

    /// A response echoed a different identifier than the one requested.
    ///
    /// Kept distinct from other response errors so callers can choose to
    /// treat it as an overload signal or as a hard failure.
    #[error("response {field} mismatch: requested '{expected}', received '{actual}'")]
    EchoMismatch {
        /// Name of the echoed element (e.g. `AmazonOrderId`).
        field: String,
        /// Identifier sent in the request.
        expected: String,
        /// Identifier found in the response.
        actual: String,
    },

    /// Response body is not well-formed XML.
    #[error("malformed XML response: {0}")]
    Xml(String),

    /// The operation was cancelled through its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// Caller input is malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<quick_xml::Error> for MwsError {
    fn from(error: quick_xml::Error) -> Self {
        Self::Xml(error.to_string())
    }
}

/// Error details parsed from the service's `ErrorResponse` envelope.
///
/// ```xml
/// <ErrorResponse xmlns="...">
///   <Error><Type>Sender</Type><Code>...</Code><Message>...</Message></Error>
///   <RequestID>...</RequestID>
/// </ErrorResponse>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    /// HTTP status code of the response.
    pub status: u16,
    /// Error type (`Sender` or `Receiver`), if present.
    pub error_type: Option<String>,
    /// Error code, verbatim.
    pub code: String,
    /// Error message, verbatim.
    pub message: String,
    /// Request id echoed by the service, if present.
    pub request_id: Option<String>,
}

impl ServiceError {
    /// Builds a service error from a response status and body.
    ///
    /// Falls back to `Unknown` and the raw body when the body is not an
    /// error envelope, so a failure is never reported without detail.
    ///
    /// # Examples
    ///
    /// ```
    /// use mws_client::error::ServiceError;
    ///
    /// let body = "<ErrorResponse><Error><Type>Sender</Type><Code>InvalidParameter</Code>\
    ///             <Message>bad input</Message></Error><RequestID>r-1</RequestID></ErrorResponse>";
    /// let error = ServiceError::from_response(400, body);
    /// assert_eq!(error.code, "InvalidParameter");
    /// assert_eq!(error.message, "bad input");
    /// assert_eq!(error.request_id.as_deref(), Some("r-1"));
    /// ```
    #[must_use]
    pub fn from_response(status: u16, body: &str) -> Self {
        match XmlNode::parse(body) {
            Ok(root) => Self::from_envelope(status, &root),
            Err(_) => Self {
                status,
                error_type: None,
                code: "Unknown".to_owned(),
                message: body.trim().to_owned(),
                request_id: None,
            },
        }
    }

    /// Builds a service error from an already parsed envelope.
    #[must_use]
    pub fn from_envelope(status: u16, root: &XmlNode) -> Self {
        let error = root.child("Error");
        let field = |name: &str| error.and_then(|e| e.child_text(name)).map(str::to_owned);

        Self {
            status,
            error_type: field("Type"),
            code: field("Code").unwrap_or_else(|| "Unknown".to_owned()),
            message: field("Message").unwrap_or_else(|| format!("HTTP status {status}")),
            request_id: root
                .child_text("RequestID")
                .or_else(|| root.child_text("RequestId"))
                .map(str::to_owned),
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.status, self.code, self.message)
    }
}

/// Compares an identifier echoed by the service with the requested one.
///
/// Resource parsers call this from [`PagedResource::parse_page`](crate::pagination::PagedResource::parse_page)
/// when the response repeats the identifier it was asked about.
///
/// # Errors
///
/// Returns [`MwsError::EchoMismatch`] when the identifiers differ.
///
/// # Examples
///
/// ```
/// use mws_client::error::{MwsError, check_echo};
///
/// assert!(check_echo("AmazonOrderId", "111-1", "111-1").is_ok());
/// assert!(matches!(
///     check_echo("AmazonOrderId", "111-1", "222-2"),
///     Err(MwsError::EchoMismatch { .. })
/// ));
/// ```
pub fn check_echo(field: &str, expected: &str, actual: &str) -> Result<()> {
    if expected == actual {
        return Ok(());
    }
    tracing::warn!(field, expected, actual, "echoed identifier does not match request");
    Err(MwsError::EchoMismatch {
        field: field.to_owned(),
        expected: expected.to_owned(),
        actual: actual.to_owned(),
    })
}
