//! Token-based pagination.
//!
//! List operations return at most one page of records plus a `NextToken`
//! when more remain. The follow-up page is requested with a separate
//! `{Action}ByNextToken` operation that carries the token and nothing else:
//! resource filters must be dropped, the service rejects them.
//!
//! A [`Paginator`] drives that loop for one [`PagedResource`]:
//!
//! 1. **First page**: the base action with every resource parameter.
//! 2. **Continue** while a token is present and auto-continue is on: the
//!    continuation action, filters reset, `NextToken` set.
//! 3. **Stop** on a page without a token, at `max_pages`, or when
//!    auto-continue is off. In the last two cases the token is kept and
//!    [`Paginator::fetch_next_page`] resumes from it.

use std::{fmt, num::NonZeroU32};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    client::MwsClient,
    clock::Clock,
    error::{MwsError, Result},
    reliability::ThrottleConfig,
    request::{ApiSection, RequestContext},
    signing::Parameters,
    transport::Transport,
    xml::XmlNode,
};

mod generic;

pub use generic::ElementList;

/// Parameter carrying the continuation token.
pub const NEXT_TOKEN_PARAM: &str = "NextToken";

/// Base action and its continuation counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionPair {
    base: String,
    next: String,
}

impl ActionPair {
    /// Pairs `base` with `{base}ByNextToken`.
    ///
    /// # Examples
    ///
    /// ```
    /// use mws_client::pagination::ActionPair;
    ///
    /// let actions = ActionPair::new("ListOrders");
    /// assert_eq!(actions.next(), "ListOrdersByNextToken");
    /// ```
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        let next = format!("{base}ByNextToken");
        Self { base, next }
    }

    /// Pairs two explicitly named actions.
    #[must_use]
    pub fn with_next(base: impl Into<String>, next: impl Into<String>) -> Self {
        Self { base: base.into(), next: next.into() }
    }

    /// First-page action.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Continuation action.
    #[must_use]
    pub fn next(&self) -> &str {
        &self.next
    }
}

/// A listable resource: what to request and how to read a page.
///
/// Implementations supply the request side (actions, section, parameters)
/// and the response side (`parse_page`). The engine owns signing, throttling
/// and the continuation loop.
pub trait PagedResource {
    /// One parsed record.
    type Record;

    /// First-page and continuation actions.
    fn actions(&self) -> ActionPair;

    /// API section the actions belong to.
    fn section(&self) -> ApiSection;

    /// First-page parameters, filters included.
    fn parameters(&self) -> Parameters;

    /// Throttle settings of the actions' quota group.
    fn throttle(&self) -> ThrottleConfig {
        ThrottleConfig::default()
    }

    /// Converts one `{Action}Result` element into records.
    ///
    /// # Errors
    ///
    /// Implementations return [`MwsError::EchoMismatch`] (see
    /// [`check_echo`](crate::error::check_echo)) when the response is about
    /// a different identifier than the one requested, and
    /// [`MwsError::Xml`] when required elements are missing.
    fn parse_page(&mut self, result: &XmlNode) -> Result<Vec<Self::Record>>;

    /// Strips resource filters from `params` before a continuation request.
    ///
    /// The default removes everything; the engine then sets only
    /// `NextToken`.
    fn reset_filters(&self, params: &mut Parameters) {
        params.clear();
    }
}

/// Progress of a paginated fetch.
#[derive(Debug, Clone)]
pub struct PaginationState<R> {
    /// Whether the last page carried a continuation token.
    pub has_more: bool,
    /// Whether `fetch` follows tokens on its own.
    pub auto_continue: bool,
    /// Token for the next page, if any.
    pub current_token: Option<String>,
    /// Records accumulated so far, in page order.
    pub records: Vec<R>,
    /// Pages fetched since the last restart.
    pub pages_fetched: u32,
}

impl<R> Default for PaginationState<R> {
    fn default() -> Self {
        Self {
            has_more: false,
            auto_continue: true,
            current_token: None,
            records: Vec::new(),
            pages_fetched: 0,
        }
    }
}

impl<R> PaginationState<R> {
    fn restart(&mut self) {
        self.has_more = false;
        self.current_token = None;
        self.records.clear();
        self.pages_fetched = 0;
    }
}

/// Extracts the continuation token from a `{Action}Result` element.
///
/// A token is present when `NextToken` is non-empty, unless `HasNext` says
/// `false`.
///
/// # Examples
///
/// ```
/// use mws_client::{pagination::continuation_token, xml::XmlNode};
///
/// let result = XmlNode::parse("<R><NextToken>abc</NextToken></R>").unwrap();
/// assert_eq!(continuation_token(&result).as_deref(), Some("abc"));
///
/// let done = XmlNode::parse("<R><NextToken>abc</NextToken><HasNext>false</HasNext></R>").unwrap();
/// assert!(continuation_token(&done).is_none());
/// ```
#[must_use]
pub fn continuation_token(result: &XmlNode) -> Option<String> {
    if result.child_text("HasNext").is_some_and(|v| v.trim().eq_ignore_ascii_case("false")) {
        return None;
    }
    result
        .child_text(NEXT_TOKEN_PARAM)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
}

/// Drives the first-page / continuation loop for one resource.
///
/// # Examples
///
/// ```
/// use mws_client::{
///     client::MwsClient,
///     config::{Credentials, SecretKey},
///     pagination::{ElementList, Paginator},
///     request::ApiSection,
///     signing::Parameters,
///     transport::{MockQueue, ReplayTransport},
/// };
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> mws_client::error::Result<()> {
/// let transport = ReplayTransport::new("mock", MockQueue::parse("200")?);
/// let credentials = Credentials::new("main", "A1", "AKIA", Some(SecretKey::new("s")));
/// let client = MwsClient::new(transport, credentials, "https://mws.amazonservices.com")?;
///
/// let orders = ElementList::new("ListOrders", ApiSection::orders(), Parameters::new(), "Orders/Order");
/// let mut paginator = Paginator::new(&client, orders);
/// let records = paginator.fetch(&CancellationToken::new()).await?;
/// assert!(records.is_empty());
/// assert!(!paginator.has_token());
/// # Ok(())
/// # }
/// ```
pub struct Paginator<'c, P: PagedResource, T, C> {
    client: &'c MwsClient<T, C>,
    resource: P,
    state: PaginationState<P::Record>,
    max_pages: Option<NonZeroU32>,
}

impl<P: PagedResource, T, C> fmt::Debug for Paginator<'_, P, T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Paginator")
            .field("actions", &self.resource.actions())
            .field("pages_fetched", &self.state.pages_fetched)
            .field("records", &self.state.records.len())
            .field("has_more", &self.state.has_more)
            .field("auto_continue", &self.state.auto_continue)
            .field("max_pages", &self.max_pages)
            .finish_non_exhaustive()
    }
}

impl<'c, P, T, C> Paginator<'c, P, T, C>
where
    P: PagedResource,
    T: Transport,
    C: Clock,
{
    /// Creates a paginator that follows tokens until exhausted.
    #[must_use]
    pub fn new(client: &'c MwsClient<T, C>, resource: P) -> Self {
        Self { client, resource, state: PaginationState::default(), max_pages: None }
    }

    /// Turns automatic continuation on or off.
    #[must_use]
    pub fn auto_continue(mut self, enabled: bool) -> Self {
        self.state.auto_continue = enabled;
        self
    }

    /// Stops `fetch` after this many pages, keeping the token.
    ///
    /// The first page is always fetched, so the bound is at least one.
    #[must_use]
    pub fn max_pages(mut self, max_pages: NonZeroU32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    /// Fetches from the first page, discarding earlier results.
    ///
    /// Follows continuation tokens while auto-continue is on and
    /// `max_pages` is not reached.
    ///
    /// # Errors
    ///
    /// Returns the first error of any page. Records of pages fetched before
    /// the failure stay available through [`records`](Self::records).
    #[instrument(skip_all, fields(fetch_id = %Uuid::new_v4(), action = %self.resource.actions().base()))]
    pub async fn fetch(&mut self, cancel: &CancellationToken) -> Result<&[P::Record]> {
        self.state.restart();

        let actions = self.resource.actions();
        let params = self.resource.parameters();
        self.fetch_page(actions.base(), params, cancel).await?;

        while self.state.has_more && self.state.auto_continue {
            if self.max_pages.is_some_and(|max| self.state.pages_fetched >= max.get()) {
                info!(pages = self.state.pages_fetched, "page limit reached, token kept");
                break;
            }
            self.fetch_continuation(&actions, cancel).await?;
        }

        info!(
            pages = self.state.pages_fetched,
            records = self.state.records.len(),
            has_token = self.state.has_more,
            "fetch finished"
        );
        Ok(&self.state.records)
    }

    /// Fetches one more page from the stored token.
    ///
    /// Does nothing when no token remains.
    ///
    /// # Errors
    ///
    /// Returns the page's error, if any.
    #[instrument(skip_all, fields(action = %self.resource.actions().next()))]
    pub async fn fetch_next_page(&mut self, cancel: &CancellationToken) -> Result<&[P::Record]> {
        if self.state.has_more {
            let actions = self.resource.actions();
            self.fetch_continuation(&actions, cancel).await?;
        } else {
            debug!("no continuation token, nothing to fetch");
        }
        Ok(&self.state.records)
    }

    async fn fetch_continuation(
        &mut self,
        actions: &ActionPair,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let token = self.state.current_token.clone().ok_or_else(|| {
            MwsError::InvalidInput("continuation requested without a token".to_owned())
        })?;

        let mut params = self.resource.parameters();
        self.resource.reset_filters(&mut params);
        params.insert(NEXT_TOKEN_PARAM, token);

        self.fetch_page(actions.next(), params, cancel).await
    }

    async fn fetch_page(
        &mut self,
        action: &str,
        params: Parameters,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            info!(pages = self.state.pages_fetched, "fetch cancelled");
            return Err(MwsError::Cancelled);
        }

        let context = RequestContext::new(action, self.resource.section(), params);
        let root = self.client.call(&context, &self.resource.throttle(), cancel).await?;

        let result_name = format!("{action}Result");
        let result = root.child(&result_name).ok_or_else(|| {
            warn!(root = root.name(), expected = %result_name, "response has no result element");
            MwsError::Xml(format!("<{}> has no <{result_name}> element", root.name()))
        })?;

        let records = self.resource.parse_page(result).inspect_err(|e| match e {
            MwsError::EchoMismatch { .. } => warn!(error = %e, "page rejected"),
            _ => error!(error = %e, "page could not be parsed"),
        })?;

        self.state.pages_fetched += 1;
        self.state.current_token = continuation_token(result);
        self.state.has_more = self.state.current_token.is_some();

        info!(
            page = self.state.pages_fetched,
            records = records.len(),
            has_token = self.state.has_more,
            "page fetched"
        );
        self.state.records.extend(records);
        Ok(())
    }

    /// Whether a continuation token remains.
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.state.has_more
    }

    /// Stored continuation token.
    #[must_use]
    pub fn next_token(&self) -> Option<&str> {
        self.state.current_token.as_deref()
    }

    /// Records accumulated so far.
    #[must_use]
    pub fn records(&self) -> &[P::Record] {
        &self.state.records
    }

    /// Pagination progress.
    #[must_use]
    pub fn state(&self) -> &PaginationState<P::Record> {
        &self.state
    }

    /// The resource being paged.
    #[must_use]
    pub fn resource(&self) -> &P {
        &self.resource
    }

    /// Consumes the paginator, returning its records.
    #[must_use]
    pub fn into_records(self) -> Vec<P::Record> {
        self.state.records
    }
}
