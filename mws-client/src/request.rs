//! Request construction.
//!
//! [`RequestBuilder`] turns an action and its parameters into a
//! [`SignedRequest`]: it adds the common authentication parameters, stamps
//! the request time, signs, and renders the form-encoded POST body.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, instrument};
use url::Url;

use crate::{
    config::Credentials,
    error::{MwsError, Result},
    signing::{self, Parameters, SIGNATURE_PARAM, SIGNATURE_VERSION, SignatureMethod},
};

/// HTTP method used for every call.
pub const METHOD: &str = "POST";

/// How far the `Timestamp` parameter is set back from the current time, to
/// absorb clock skew against the service.
pub const TIMESTAMP_SKEW: TimeDelta = TimeDelta::seconds(120);

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Renders a time the way the service expects it: ISO-8601 UTC with
/// second precision.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use mws_client::request::format_timestamp;
///
/// let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
/// assert_eq!(format_timestamp(t), "2024-05-01T12:00:00Z");
/// ```
#[must_use]
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Renders `time`, or the current time minus [`TIMESTAMP_SKEW`] when `None`.
///
/// Resource builders use this for date filters such as `CreatedAfter`.
#[must_use]
pub fn gen_time(time: Option<DateTime<Utc>>) -> String {
    format_timestamp(time.unwrap_or_else(|| Utc::now() - TIMESTAMP_SKEW))
}

/// An API section: URL path plus the `Version` parameter it requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSection {
    path: String,
    version: String,
}

impl ApiSection {
    /// Section served at `/{name}/{version}`.
    ///
    /// # Examples
    ///
    /// ```
    /// use mws_client::request::ApiSection;
    ///
    /// let orders = ApiSection::new("Orders", "2013-09-01");
    /// assert_eq!(orders.path(), "/Orders/2013-09-01");
    /// ```
    #[must_use]
    pub fn new(name: &str, version: impl Into<String>) -> Self {
        let version = version.into();
        Self { path: format!("/{name}/{version}"), version }
    }

    /// Section served at an explicit path (Feeds and Reports live at `/`).
    #[must_use]
    pub fn at_path(path: impl Into<String>, version: impl Into<String>) -> Self {
        Self { path: path.into(), version: version.into() }
    }

    /// Orders API.
    #[must_use]
    pub fn orders() -> Self {
        Self::new("Orders", "2013-09-01")
    }

    /// Products API.
    #[must_use]
    pub fn products() -> Self {
        Self::new("Products", "2011-10-01")
    }

    /// Sellers API.
    #[must_use]
    pub fn sellers() -> Self {
        Self::new("Sellers", "2011-07-01")
    }

    /// Fulfillment Inbound Shipment API.
    #[must_use]
    pub fn inbound_shipments() -> Self {
        Self::new("FulfillmentInboundShipment", "2010-10-01")
    }

    /// Fulfillment Inventory API.
    #[must_use]
    pub fn inventory() -> Self {
        Self::new("FulfillmentInventory", "2010-10-01")
    }

    /// Reports API.
    #[must_use]
    pub fn reports() -> Self {
        Self::at_path("/", "2009-01-01")
    }

    /// URL path of the section.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// `Version` parameter value.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }
}

/// What a caller wants sent: the action, its section and its own
/// parameters. Common parameters are added by [`RequestBuilder`].
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Operation name, sent as `Action`.
    pub action: String,
    /// Section the action belongs to.
    pub section: ApiSection,
    /// Action-specific parameters.
    pub params: Parameters,
}

impl RequestContext {
    /// Creates a context.
    #[must_use]
    pub fn new(action: impl Into<String>, section: ApiSection, params: Parameters) -> Self {
        Self { action: action.into(), section, params }
    }
}

/// A fully signed request, ready for a transport.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    /// Target URL (service URL with the section path).
    pub url: Url,
    /// Host the signature was computed over.
    pub host: String,
    /// Operation name.
    pub action: String,
    /// Every parameter sent, `Signature` included.
    pub params: Parameters,
    /// `application/x-www-form-urlencoded` body.
    pub body: String,
}

/// Builds signed requests for one store.
#[derive(Debug, Clone)]
pub struct RequestBuilder<'a> {
    credentials: &'a Credentials,
    service_url: &'a Url,
    method: SignatureMethod,
}

impl<'a> RequestBuilder<'a> {
    /// Creates a builder signing with `credentials` against `service_url`.
    #[must_use]
    pub fn new(credentials: &'a Credentials, service_url: &'a Url, method: SignatureMethod) -> Self {
        Self { credentials, service_url, method }
    }

    /// Signs `context` as of `now`.
    ///
    /// Any `Signature` already present in the parameters is discarded and
    /// recomputed; common parameters override caller values of the same
    /// name.
    ///
    /// # Errors
    ///
    /// - [`MwsError::MissingCredential`] if the store has no secret key
    /// - [`MwsError::Config`] if the service URL has no host
    #[instrument(skip(self, context, now), fields(action = %context.action, store = %self.credentials.store()))]
    pub fn build(&self, context: &RequestContext, now: DateTime<Utc>) -> Result<SignedRequest> {
        let secret = self.credentials.secret_key()?;

        let mut url = self.service_url.clone();
        url.set_path(context.section.path());
        let host = signing_host(&url)?;

        let mut params = context.params.clone();
        params.remove(SIGNATURE_PARAM);
        params.insert("Action", context.action.as_str());
        params.insert("SellerId", self.credentials.seller_id());
        params.insert("AWSAccessKeyId", self.credentials.access_key_id());
        params.insert("SignatureVersion", SIGNATURE_VERSION);
        params.insert("SignatureMethod", self.method.as_str());
        params.insert("Version", context.section.version());
        params.insert("Timestamp", format_timestamp(now - TIMESTAMP_SKEW));
        if let Some(token) = self.credentials.auth_token() {
            params.insert("MWSAuthToken", token);
        }

        let signature =
            signing::sign(&params, secret.expose(), &host, url.path(), METHOD, self.method)?;
        params.insert(SIGNATURE_PARAM, signature);

        let body = params.canonical_query();
        debug!(url = %url, param_count = params.len(), "request signed");

        Ok(SignedRequest { url, host, action: context.action.clone(), params, body })
    }
}

/// Host as it appears in the signed string: lowercase, with the port only
/// when it is not the scheme default.
fn signing_host(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| MwsError::Config(format!("service URL has no host: {url}")))?
        .to_lowercase();
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    })
}
