//! Fixture replay ("mock mode").
//!
//! [`ReplayTransport`] answers every request from an ordered queue of
//! [`MockEntry`] values instead of the network. A file entry returns the
//! fixture's contents with status 200; a status entry synthesizes a canned
//! envelope for that status. The queue wraps around to the first entry after
//! the last one, forever.

use std::{
    fmt,
    path::{Component, Path, PathBuf},
    str::FromStr,
};

use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

use crate::{
    error::{MwsError, Result},
    request::SignedRequest,
    transport::{Transport, TransportResponse, sealed},
    xml::XmlNode,
};

/// Namespace declared on synthesized envelopes.
const MOCK_NAMESPACE: &str = "https://mws.amazonservices.com/";

/// One scripted response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEntry {
    /// Fixture file, relative to the fixture directory.
    File(PathBuf),
    /// Canned response with this status.
    Status(u16),
}

impl FromStr for MockEntry {
    type Err = MwsError;

    /// A three-digit number is a status, anything else a file name.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(MwsError::InvalidInput("empty mock entry".to_owned()));
        }
        if s.len() == 3
            && s.bytes().all(|b| b.is_ascii_digit())
            && let Ok(status) = s.parse::<u16>()
            && (100..600).contains(&status)
        {
            return Ok(Self::Status(status));
        }
        Ok(Self::File(PathBuf::from(s)))
    }
}

impl fmt::Display for MockEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Status(status) => write!(f, "{status}"),
        }
    }
}

/// Ordered replay queue with a wrapping cursor.
#[derive(Debug, Clone, Default)]
pub struct MockQueue {
    entries: Vec<MockEntry>,
    cursor: usize,
}

impl MockQueue {
    /// Creates a queue positioned at its first entry.
    #[must_use]
    pub fn new(entries: Vec<MockEntry>) -> Self {
        Self { entries, cursor: 0 }
    }

    /// Parses a comma-separated list such as `orders_1.xml,503,orders_2.xml`.
    ///
    /// # Errors
    ///
    /// Returns [`MwsError::InvalidInput`] if any item is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::PathBuf;
    ///
    /// use mws_client::transport::{MockEntry, MockQueue};
    ///
    /// let queue = MockQueue::parse("page1.xml, 503").unwrap();
    /// assert_eq!(
    ///     queue.entries(),
    ///     &[MockEntry::File(PathBuf::from("page1.xml")), MockEntry::Status(503)]
    /// );
    /// ```
    pub fn parse(list: &str) -> Result<Self> {
        let entries = list.split(',').map(str::parse).collect::<Result<Vec<_>>>()?;
        Ok(Self::new(entries))
    }

    /// Scripted entries in replay order.
    #[must_use]
    pub fn entries(&self) -> &[MockEntry] {
        &self.entries
    }

    /// Index of the entry the next call returns.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns the next entry, wrapping to the first after the last.
    ///
    /// Returns `None` only for an empty queue.
    pub fn next_entry(&mut self) -> Option<MockEntry> {
        if self.entries.is_empty() {
            return None;
        }
        if self.cursor >= self.entries.len() {
            info!(entries = self.entries.len(), "mock fixture index reset");
            self.cursor = 0;
        }
        let entry = self.entries[self.cursor].clone();
        self.cursor += 1;
        Some(entry)
    }
}

/// How [`ReplayTransport::fetch_fixture`] returns a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FixtureFormat {
    /// Parsed into an [`XmlNode`] tree.
    #[default]
    Parsed,
    /// Raw file text.
    Raw,
}

/// Contents of a fixture file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fixture {
    /// Parsed document root.
    Parsed(XmlNode),
    /// Unparsed text.
    Raw(String),
}

/// Transport that replays scripted responses.
///
/// # Examples
///
/// ```
/// use mws_client::transport::{MockEntry, MockQueue, ReplayTransport, Transport};
///
/// let transport = ReplayTransport::new("mock", MockQueue::new(vec![MockEntry::Status(503)]));
/// assert_eq!(transport.protocol_name(), "replay");
/// ```
#[derive(Debug)]
pub struct ReplayTransport {
    fixture_dir: PathBuf,
    queue: Mutex<MockQueue>,
}

impl sealed::private::Sealed for ReplayTransport {}

impl ReplayTransport {
    /// Creates a transport resolving file entries against `fixture_dir`.
    #[must_use]
    pub fn new(fixture_dir: impl Into<PathBuf>, queue: MockQueue) -> Self {
        Self { fixture_dir: fixture_dir.into(), queue: Mutex::new(queue) }
    }

    /// Directory fixture paths are resolved against.
    #[must_use]
    pub fn fixture_dir(&self) -> &Path {
        &self.fixture_dir
    }

    /// Index of the next entry to be replayed.
    pub async fn cursor(&self) -> usize {
        self.queue.lock().await.cursor()
    }

    /// Loads a fixture file, parsed or raw.
    ///
    /// # Errors
    ///
    /// - [`MwsError::Fixture`] if the path escapes the fixture directory or
    ///   the file cannot be read
    /// - [`MwsError::Xml`] if a parsed fixture is malformed
    #[instrument(skip(self), fields(fixture_dir = %self.fixture_dir.display()))]
    pub async fn fetch_fixture(&self, path: &Path, format: FixtureFormat) -> Result<Fixture> {
        let text = self.read_fixture(path).await?;
        match format {
            FixtureFormat::Raw => Ok(Fixture::Raw(text)),
            FixtureFormat::Parsed => Ok(Fixture::Parsed(XmlNode::parse(&text)?)),
        }
    }

    async fn read_fixture(&self, path: &Path) -> Result<String> {
        let resolved = self.resolve(path)?;
        tokio::fs::read_to_string(&resolved).await.map_err(|e| {
            error!(path = %resolved.display(), error = %e, "cannot read mock fixture");
            MwsError::Fixture(format!("cannot read '{}': {e}", resolved.display()))
        })
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let escapes = path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
        if escapes {
            error!(path = %path.display(), "mock fixture path escapes fixture directory");
            return Err(MwsError::Fixture(format!(
                "fixture path must be relative and must not contain '..': {}",
                path.display()
            )));
        }
        Ok(self.fixture_dir.join(path))
    }

    #[instrument(skip(self, request), fields(action = %request.action))]
    async fn replay(&self, request: &SignedRequest) -> Result<TransportResponse> {
        let entry = self.queue.lock().await.next_entry().ok_or_else(|| {
            error!("mock queue is empty");
            MwsError::Fixture("mock queue is empty".to_owned())
        })?;
        debug!(entry = %entry, "replaying mock entry");

        let response = match entry {
            MockEntry::File(path) => TransportResponse::new(
                200,
                vec![("content-type".to_owned(), "text/xml".to_owned())],
                self.read_fixture(&path).await?,
            ),
            MockEntry::Status(status) => canned_response(&request.action, status),
        };
        Ok(response)
    }
}

impl Transport for ReplayTransport {
    async fn send<'a>(&'a self, request: &'a SignedRequest) -> Result<TransportResponse> {
        self.replay(request).await
    }

    fn protocol_name(&self) -> &'static str {
        "replay"
    }
}

/// Synthesizes the envelope the service would send for `status`.
fn canned_response(action: &str, status: u16) -> TransportResponse {
    let request_id = uuid::Uuid::new_v4().to_string();
    let body = if status == 200 {
        format!(
            "<?xml version=\"1.0\"?>\n<{action}Response xmlns=\"{MOCK_NAMESPACE}\">\
             <{action}Result/>\
             <ResponseMetadata><RequestId>{request_id}</RequestId></ResponseMetadata>\
             </{action}Response>"
        )
    } else {
        let (code, message) = match status {
            400 => ("InvalidParameterValue", "Invalid parameter value (mock)"),
            404 => ("NotFound", "Resource not found (mock)"),
            503 => ("RequestThrottled", "Request is throttled (mock)"),
            _ => ("MockError", "Mock error response"),
        };
        format!(
            "<?xml version=\"1.0\"?>\n<ErrorResponse xmlns=\"{MOCK_NAMESPACE}\">\
             <Error><Type>Sender</Type><Code>{code}</Code><Message>{message}</Message></Error>\
             <RequestID>{request_id}</RequestID></ErrorResponse>"
        )
    };
    TransportResponse::new(
        status,
        vec![
            ("content-type".to_owned(), "text/xml".to_owned()),
            ("x-mws-request-id".to_owned(), request_id),
        ],
        body,
    )
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;
    use url::Url;

    use super::*;
    use crate::{error::ServiceError, signing::Parameters};

    fn request(action: &str) -> SignedRequest {
        SignedRequest {
            url: Url::parse("https://mws.amazonservices.com/Orders/2013-09-01").unwrap(),
            host: "mws.amazonservices.com".to_owned(),
            action: action.to_owned(),
            params: Parameters::new(),
            body: String::new(),
        }
    }

    #[test]
    fn test_mock_entry_from_str() {
        assert_eq!("503".parse::<MockEntry>().unwrap(), MockEntry::Status(503));
        assert_eq!(" 200 ".parse::<MockEntry>().unwrap(), MockEntry::Status(200));
        assert_eq!(
            "orders.xml".parse::<MockEntry>().unwrap(),
            MockEntry::File(PathBuf::from("orders.xml"))
        );
        assert_eq!("1234".parse::<MockEntry>().unwrap(), MockEntry::File(PathBuf::from("1234")));
        assert!("".parse::<MockEntry>().is_err());
    }

    #[test]
    fn test_queue_wraps() {
        let mut queue = MockQueue::new(vec![MockEntry::Status(200), MockEntry::Status(503)]);
        let seen: Vec<_> = (0..5).filter_map(|_| queue.next_entry()).collect();
        assert_eq!(
            seen,
            vec![
                MockEntry::Status(200),
                MockEntry::Status(503),
                MockEntry::Status(200),
                MockEntry::Status(503),
                MockEntry::Status(200),
            ]
        );
        assert_eq!(queue.cursor(), 1);
    }

    #[test]
    #[traced_test]
    fn test_wraparound_is_logged() {
        let mut queue = MockQueue::parse("200").unwrap();
        queue.next_entry();
        assert!(!logs_contain("mock fixture index reset"));
        queue.next_entry();
        assert!(logs_contain("mock fixture index reset"));
    }

    #[test]
    fn test_empty_queue_yields_nothing() {
        let mut queue = MockQueue::default();
        assert!(queue.next_entry().is_none());
        assert!(MockQueue::parse("a.xml,,503").is_err());
    }

    #[tokio::test]
    async fn test_empty_queue_is_fixture_error() {
        let transport = ReplayTransport::new("mock", MockQueue::default());
        let result = transport.send(&request("ListOrders")).await;
        assert!(matches!(result, Err(MwsError::Fixture(_))));
    }

    #[tokio::test]
    async fn test_canned_success_envelope() {
        let transport = ReplayTransport::new("mock", MockQueue::new(vec![MockEntry::Status(200)]));
        let response = transport.send(&request("ListOrders")).await.unwrap();
        assert_eq!(response.status, 200);

        let root = XmlNode::parse(&response.body).unwrap();
        assert_eq!(root.name(), "ListOrdersResponse");
        assert!(root.child("ListOrdersResult").is_some());
        assert_eq!(
            root.find("ResponseMetadata/RequestId").map(XmlNode::text),
            response.header("x-mws-request-id")
        );
    }

    #[tokio::test]
    async fn test_canned_error_envelopes() {
        let queue = MockQueue::parse("400,404,503,500").unwrap();
        let transport = ReplayTransport::new("mock", queue);

        let mut codes = Vec::new();
        for expected in [400, 404, 503, 500] {
            let response = transport.send(&request("ListOrders")).await.unwrap();
            assert_eq!(response.status, expected);
            let error = ServiceError::from_response(response.status, &response.body);
            assert_eq!(error.error_type.as_deref(), Some("Sender"));
            assert!(error.request_id.is_some());
            codes.push(error.code);
        }
        assert_eq!(codes, ["InvalidParameterValue", "NotFound", "RequestThrottled", "MockError"]);
    }

    #[tokio::test]
    async fn test_file_entry_and_fetch_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let body = "<GetServiceStatusResponse><GetServiceStatusResult><Status>GREEN</Status>\
                    </GetServiceStatusResult></GetServiceStatusResponse>";
        std::fs::write(dir.path().join("status.xml"), body).unwrap();

        let transport =
            ReplayTransport::new(dir.path(), MockQueue::parse("status.xml").unwrap());
        let response = transport.send(&request("GetServiceStatus")).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, body);

        let raw = transport.fetch_fixture(Path::new("status.xml"), FixtureFormat::Raw).await.unwrap();
        assert_eq!(raw, Fixture::Raw(body.to_owned()));

        let parsed =
            transport.fetch_fixture(Path::new("status.xml"), FixtureFormat::default()).await.unwrap();
        let Fixture::Parsed(root) = parsed else { panic!("expected parsed fixture") };
        assert_eq!(root.find("GetServiceStatusResult/Status").map(XmlNode::text), Some("GREEN"));
    }

    #[tokio::test]
    async fn test_missing_fixture_file() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ReplayTransport::new(dir.path(), MockQueue::parse("absent.xml").unwrap());
        let result = transport.send(&request("ListOrders")).await;
        assert!(matches!(result, Err(MwsError::Fixture(m)) if m.contains("absent.xml")));
    }

    #[tokio::test]
    async fn test_parent_dir_rejected() {
        let transport = ReplayTransport::new("mock", MockQueue::default());
        let result = transport.fetch_fixture(Path::new("../secrets.xml"), FixtureFormat::Raw).await;
        assert!(matches!(result, Err(MwsError::Fixture(_))));
    }

    #[tokio::test]
    async fn test_absolute_path_rejected() {
        let fixtures = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let secret = outside.path().join("secret.xml");
        std::fs::write(&secret, "<Secret>outside</Secret>").unwrap();

        let transport = ReplayTransport::new(fixtures.path(), MockQueue::default());
        let result = transport.fetch_fixture(&secret, FixtureFormat::Raw).await;
        assert!(matches!(result, Err(MwsError::Fixture(m)) if m.contains("relative")));

        let queued = MockQueue::new(vec![MockEntry::File(secret)]);
        let transport = ReplayTransport::new(fixtures.path(), queued);
        let result = transport.send(&request("ListOrders")).await;
        assert!(matches!(result, Err(MwsError::Fixture(_))));
    }
}
