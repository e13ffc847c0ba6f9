//! Live HTTP transport.
//!
//! POSTs the form-encoded body of a [`SignedRequest`] with reqwest and
//! returns the response verbatim, whatever its status.

use reqwest::{
    Client,
    header::{CONTENT_TYPE, HeaderMap},
};
use tracing::{debug, error, instrument};
use url::Url;

use super::config::{HttpConfig, HttpVersion};
use crate::{
    error::{MwsError, Result},
    request::SignedRequest,
    transport::{Transport, TransportResponse, is_loopback, sealed},
};

/// `Content-Type` of every request body.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

/// Validates the target URL.
///
/// HTTPS is required; plain HTTP is accepted only for a loopback host when
/// `allow_loopback` is set.
fn validate_url(url: &Url, allow_loopback: bool) -> Result<()> {
    let host = url
        .host_str()
        .ok_or_else(|| MwsError::InvalidInput(format!("URL missing host: {url}")))?;

    match url.scheme() {
        "https" => Ok(()),
        "http" if allow_loopback && is_loopback(host) => Ok(()),
        scheme => Err(MwsError::InvalidInput(format!(
            "refusing to send credentials over {scheme} to {host}"
        ))),
    }
}

/// Copies headers out as name/value pairs, non-UTF-8 bytes replaced lossily.
fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
        .collect()
}

/// HTTP/1.1 and HTTP/2 transport using reqwest.
///
/// Supports connection pooling and keep-alive. A transport never retries:
/// a 503 is returned like any other status.
///
/// # Examples
///
/// ```
/// use mws_client::transport::{HttpConfig, HttpTransport, HttpVersion, Transport};
///
/// let config = HttpConfig { http_version: HttpVersion::Http1, ..HttpConfig::default() };
/// let transport = HttpTransport::with_config(&config).unwrap();
/// assert_eq!(transport.protocol_name(), "http/1.1");
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    http_version: HttpVersion,
    allow_loopback: bool,
}

impl sealed::private::Sealed for HttpTransport {}

impl HttpTransport {
    /// Creates a transport with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`MwsError::Transport`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_config(&HttpConfig::default())
    }

    /// Creates a transport with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MwsError::Transport`] if the HTTP client cannot be built.
    pub fn with_config(config: &HttpConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.as_str());

        builder = match config.http_version {
            HttpVersion::Http1 => builder.http1_only(),
            HttpVersion::Http2 => builder.http2_prior_knowledge(),
            HttpVersion::Auto => builder,
        };

        let client = builder.build()?;

        Ok(Self { client, http_version: config.http_version, allow_loopback: false })
    }

    /// Permits plain HTTP to loopback hosts, for local test servers.
    #[must_use]
    pub fn allow_loopback(mut self, allow: bool) -> Self {
        self.allow_loopback = allow;
        self
    }

    #[instrument(skip(self, request), fields(action = %request.action, url = %request.url))]
    async fn execute(&self, request: &SignedRequest) -> Result<TransportResponse> {
        validate_url(&request.url, self.allow_loopback)?;

        let response = self
            .client
            .post(request.url.clone())
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "request failed");
                MwsError::Transport(e)
            })?;

        let status = response.status();
        let headers = header_pairs(response.headers());

        let body = response.text().await.map_err(|e| {
            error!(error = %e, status = status.as_u16(), "failed to read response body");
            MwsError::Transport(e)
        })?;

        debug!(status = status.as_u16(), bytes = body.len(), "response received");
        Ok(TransportResponse::new(status.as_u16(), headers, body))
    }
}

impl Transport for HttpTransport {
    async fn send<'a>(&'a self, request: &'a SignedRequest) -> Result<TransportResponse> {
        self.execute(request).await
    }

    fn protocol_name(&self) -> &'static str {
        match self.http_version {
            HttpVersion::Http1 => "http/1.1",
            HttpVersion::Http2 => "http/2",
            HttpVersion::Auto => "http",
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use reqwest::header::HeaderValue;
    use tokio::net::TcpListener;

    use super::*;
    use crate::signing::Parameters;

    fn signed_request(url: &str) -> SignedRequest {
        let url = Url::parse(url).unwrap();
        let params = Parameters::new().with("Action", "ListOrders").with("Signature", "abc=");
        SignedRequest {
            host: url.host_str().unwrap_or_default().to_owned(),
            url,
            action: "ListOrders".to_owned(),
            body: params.canonical_query(),
            params,
        }
    }

    fn loopback_transport() -> HttpTransport {
        let config = HttpConfig { http_version: HttpVersion::Http1, ..Default::default() };
        HttpTransport::with_config(&config).unwrap().allow_loopback(true)
    }

    #[test]
    fn test_http_transport_protocol_name() {
        let http1 = HttpConfig { http_version: HttpVersion::Http1, ..Default::default() };
        assert_eq!(HttpTransport::with_config(&http1).unwrap().protocol_name(), "http/1.1");

        let http2 = HttpConfig { http_version: HttpVersion::Http2, ..Default::default() };
        assert_eq!(HttpTransport::with_config(&http2).unwrap().protocol_name(), "http/2");

        assert_eq!(HttpTransport::new().unwrap().protocol_name(), "http");
    }

    #[test]
    fn test_validate_url() {
        let https = Url::parse("https://mws.amazonservices.com/Orders/2013-09-01").unwrap();
        assert!(validate_url(&https, false).is_ok());

        let http = Url::parse("http://mws.amazonservices.com/").unwrap();
        assert!(validate_url(&http, false).is_err());
        assert!(validate_url(&http, true).is_err());

        let loopback = Url::parse("http://127.0.0.1:9000/").unwrap();
        assert!(validate_url(&loopback, false).is_err());
        assert!(validate_url(&loopback, true).is_ok());
    }

    #[test]
    fn test_header_values_kept_when_not_visible_ascii() {
        let mut headers = HeaderMap::new();
        headers.insert("x-mws-note", HeaderValue::from_bytes("café".as_bytes()).unwrap());
        headers.insert("x-mws-request-id", HeaderValue::from_static("e0a1b2c3"));
        headers.insert("x-raw", HeaderValue::from_bytes(&[b'a', 0xff, b'b']).unwrap());

        let pairs = header_pairs(&headers);
        let value = |name: &str| pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str());
        assert_eq!(value("x-mws-note"), Some("café"));
        assert_eq!(value("x-mws-request-id"), Some("e0a1b2c3"));
        assert_eq!(value("x-raw"), Some("a\u{fffd}b"));
    }

    #[tokio::test]
    async fn test_plain_http_rejected_before_sending() {
        let transport = HttpTransport::new().unwrap();
        let result = transport.send(&signed_request("http://127.0.0.1:9/Orders")).await;
        assert!(matches!(result, Err(MwsError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_post_form_body_and_status_verbatim() {
        let agent = HttpConfig::default().user_agent;
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/Orders/2013-09-01")
                .header("content-type", FORM_CONTENT_TYPE)
                .header("user-agent", agent.as_str())
                .body("Action=ListOrders&Signature=abc%3D");
            then.status(503).header("content-type", "text/xml").body("throttled");
        });

        let request = signed_request(&format!("{}/Orders/2013-09-01", server.base_url()));
        let response = loopback_transport().send(&request).await.unwrap();

        assert_eq!(mock.calls(), 1);
        assert_eq!(response.status, 503);
        assert_eq!(response.status_line, "503 Service Unavailable");
        assert_eq!(response.body, "throttled");
        assert_eq!(response.header("content-type"), Some("text/xml"));
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = HttpTransport::new().unwrap().allow_loopback(true);
        let result = transport.send(&signed_request(&format!("http://127.0.0.1:{port}/"))).await;
        assert!(matches!(result, Err(MwsError::Transport(_))));
    }
}
