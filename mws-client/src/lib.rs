//! MWS Client: Signed, Throttled, Paginating Requests for the Marketplace Web Service
//!
//! A request engine for the Marketplace Web Service (MWS) query API. It turns
//! an action name and a parameter map into a Signature Version 2 signed POST,
//! delivers it, sleeps through 503 throttling, and follows `NextToken`
//! continuations until a listing is exhausted.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  PagedResource       │  actions, filters, page parser
//! └──────────┬───────────┘
//!            │
//! ┌──────────▼───────────────────────────────────────────┐
//! │                Paginator (this crate)                │
//! │  ┌───────────────┐  ┌────────────┐  ┌─────────────┐  │
//! │  │RequestBuilder │──│   Signer   │  │ Throttle    │  │
//! │  │ common params │  │ HMAC SigV2 │  │ Retrier 503 │  │
//! │  └───────────────┘  └────────────┘  └──────┬──────┘  │
//! └────────────────────────────────────────────┼─────────┘
//!                                              │
//!                           ┌──────────────────┴─────────┐
//!                           │                            │
//!                  ┌────────▼────────┐         ┌─────────▼────────┐
//!                  │  HttpTransport  │         │ ReplayTransport  │
//!                  │  (reqwest)      │         │ (fixture files)  │
//!                  └─────────────────┘         └──────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ## 1. List Orders
//!
//! ```rust,no_run
//! use mws_client::{
//!     client::MwsClient,
//!     config::ClientConfig,
//!     pagination::{ElementList, Paginator},
//!     request::ApiSection,
//!     signing::Parameters,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> mws_client::Result<()> {
//! let config = ClientConfig::from_file("mws.toml")?;
//! let client = MwsClient::from_config(&config, "main")?;
//!
//! let orders = ElementList::new(
//!     "ListOrders",
//!     ApiSection::orders(),
//!     Parameters::new().with("CreatedAfter", "2024-01-01T00:00:00Z"),
//!     "Orders/Order",
//! );
//! let mut paginator = Paginator::new(&client, orders);
//! for order in paginator.fetch(&CancellationToken::new()).await? {
//!     println!("{:?}", order.child_text("AmazonOrderId"));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## 2. Sign a Request Directly
//!
//! ```rust
//! use mws_client::signing::{Parameters, SignatureMethod, sign};
//!
//! # fn example() -> mws_client::Result<()> {
//! let params = Parameters::new().with("Action", "GetServiceStatus");
//! let signature = sign(
//!     &params,
//!     "secret",
//!     "mws.amazonservices.com",
//!     "/Orders/2013-09-01",
//!     "POST",
//!     SignatureMethod::HmacSha256,
//! )?;
//! assert!(!signature.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! ## 3. Replay Fixtures Instead of the Network
//!
//! ```rust,no_run
//! use mws_client::{client::MwsClient, config::ClientConfig, transport::MockQueue};
//!
//! # fn example() -> mws_client::Result<()> {
//! let config = ClientConfig::from_file("mws.toml")?;
//! let queue = MockQueue::parse("orders_1.xml,503,orders_2.xml")?;
//! let client = MwsClient::mock(&config, "main", queue)?;
//! # let _ = client;
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`signing`]: canonical query, string to sign, HMAC-SHA1/SHA256 signatures
//! - [`request`]: API sections, common parameters, signed requests
//! - [`transport`]: live HTTP and fixture replay transports
//! - [`reliability`]: 503 throttle retry loop and its optional bounds
//! - [`pagination`]: `NextToken` continuation over a [`pagination::PagedResource`]
//! - [`client`]: ties the pieces together and keeps a response history
//! - [`config`]: TOML configuration and per-store credentials
//! - [`clock`]: injectable time source for timestamps and throttle sleeps
//! - [`xml`]: owned XML tree handed to response parsers
//! - [`error`]: error types
//!
//! # Error Handling
//!
//! All operations return [`Result<T, MwsError>`](error::Result):
//!
//! ```rust,no_run
//! use mws_client::{MwsError, client::MwsClient, config::ClientConfig, request::*, reliability::ThrottleConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! # let config = ClientConfig::default();
//! # let client = MwsClient::from_config(&config, "main").unwrap();
//! let context = RequestContext::new("GetServiceStatus", ApiSection::orders(), Default::default());
//! match client.call(&context, &ThrottleConfig::default(), &CancellationToken::new()).await {
//!     Ok(root) => println!("{}", root.name()),
//!     Err(MwsError::Http(error)) => eprintln!("service rejected request: {error}"),
//!     Err(MwsError::Overloaded { attempts }) => eprintln!("still throttled after {attempts} attempts"),
//!     Err(e) => eprintln!("other error: {e}"),
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from reqwest and criterion"
)]

pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod pagination;
pub mod reliability;
pub mod request;
pub mod signing;
pub mod transport;
pub mod xml;

pub use client::MwsClient;
pub use error::{MwsError, Result};
