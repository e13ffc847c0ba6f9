//! Client configuration.
//!
//! Loaded once from TOML and shared by reference. A configuration names the
//! service endpoint, the signature method, and one or more seller stores
//! whose credentials sign requests.
//!
//! ```toml
//! service_url = "https://mws.amazonservices.com"
//! signature_method = "HmacSHA256"
//! throttle_safe = false
//!
//! [stores.main]
//! seller_id = "A1SELLER"
//! access_key_id = "AKIAEXAMPLE"
//! secret_key = "..."
//! marketplace_id = "ATVPDKIKX0DER"
//!
//! [retry]
//! max_attempts = 10
//! ```

use std::{collections::BTreeMap, fmt, path::Path, path::PathBuf, time::Duration};

use serde::Deserialize;
use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    error::{MwsError, Result},
    reliability::RetryPolicy,
    signing::SignatureMethod,
    transport::{config::HttpConfig, is_loopback},
};

/// Production endpoint for the North America region.
pub const DEFAULT_SERVICE_URL: &str = "https://mws.amazonservices.com";

/// Root client configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the service; section paths are appended to it.
    #[serde(default = "default_service_url")]
    pub service_url: String,

    /// `HmacSHA256` or `HmacSHA1`.
    #[serde(default = "default_signature_method")]
    pub signature_method: String,

    /// Adds one second of margin to every throttle sleep.
    #[serde(default)]
    pub throttle_safe: bool,

    /// Permits plain-HTTP loopback service URLs, for local test servers.
    #[serde(default)]
    pub allow_loopback: bool,

    /// Seller stores by name.
    #[serde(default)]
    pub stores: BTreeMap<String, StoreConfig>,

    /// HTTP transport settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Bounds on the throttle retry loop.
    #[serde(default)]
    pub retry: RetrySettings,

    /// Fixture replay settings.
    #[serde(default)]
    pub mock: MockSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            signature_method: default_signature_method(),
            throttle_safe: false,
            allow_loopback: false,
            stores: BTreeMap::new(),
            http: HttpConfig::default(),
            retry: RetrySettings::default(),
            mock: MockSettings::default(),
        }
    }
}

impl ClientConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`MwsError::Config`] if the document is not valid TOML or
    /// fails [`validate`](Self::validate), and
    /// [`MwsError::UnsupportedAlgorithm`] for an unknown signature method.
    ///
    /// # Examples
    ///
    /// ```
    /// use mws_client::config::ClientConfig;
    ///
    /// let config = ClientConfig::from_toml(r#"
    ///     [stores.main]
    ///     seller_id = "A1SELLER"
    ///     access_key_id = "AKIAEXAMPLE"
    ///     secret_key = "secret"
    /// "#).unwrap();
    ///
    /// let store = config.store("main").unwrap();
    /// assert_eq!(store.seller_id(), "A1SELLER");
    /// assert!(config.store("eu").is_err());
    /// ```
    pub fn from_toml(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| MwsError::Config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`MwsError::Config`] if the file cannot be read, plus every
    /// error of [`from_toml`](Self::from_toml).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            MwsError::Config(format!("cannot read configuration '{}': {e}", path.display()))
        })?;
        let config = Self::from_toml(&source)?;
        tracing::info!(path = %path.display(), stores = config.stores.len(), "configuration loaded");
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks that:
    /// - the service URL parses and uses HTTPS (plain HTTP only to a
    ///   loopback host with `allow_loopback`)
    /// - the signature method is supported
    /// - every store carries a seller id and access key id
    /// - HTTP timeouts and retry bounds are sane
    ///
    /// A missing secret key is not an error here; it fails at signing time.
    ///
    /// # Errors
    ///
    /// Returns the first failing check.
    pub fn validate(&self) -> Result<()> {
        self.service_url()?;
        self.signature_method()?;

        for (name, store) in &self.stores {
            if store.seller_id.trim().is_empty() {
                return Err(MwsError::Config(format!("store '{name}': seller_id is empty")));
            }
            if store.access_key_id.trim().is_empty() {
                return Err(MwsError::Config(format!("store '{name}': access_key_id is empty")));
            }
        }

        self.http.validate()?;
        self.retry.validate()
    }

    /// Parsed service URL.
    ///
    /// # Errors
    ///
    /// Returns [`MwsError::Config`] if the URL is invalid, has no host, or
    /// is not HTTPS.
    pub fn service_url(&self) -> Result<Url> {
        let url = Url::parse(&self.service_url).map_err(|e| {
            MwsError::Config(format!("invalid service_url '{}': {e}", self.service_url))
        })?;
        let Some(host) = url.host_str() else {
            return Err(MwsError::Config(format!("service_url has no host: {}", self.service_url)));
        };

        match url.scheme() {
            "https" => Ok(url),
            "http" if self.allow_loopback && is_loopback(host) => Ok(url),
            "http" if self.allow_loopback => Err(MwsError::Config(format!(
                "plain HTTP is only allowed for loopback hosts, got: {host}"
            ))),
            scheme => Err(MwsError::Config(format!("service_url must use HTTPS, got: {scheme}"))),
        }
    }

    /// Parsed signature method.
    ///
    /// # Errors
    ///
    /// Returns [`MwsError::UnsupportedAlgorithm`] for anything other than
    /// `HmacSHA1` or `HmacSHA256`.
    pub fn signature_method(&self) -> Result<SignatureMethod> {
        self.signature_method.parse()
    }

    /// Resolves a store name to its credentials.
    ///
    /// # Errors
    ///
    /// Returns [`MwsError::Config`] if no store has that name.
    pub fn store(&self, name: &str) -> Result<Credentials> {
        let store = self.stores.get(name).ok_or_else(|| {
            MwsError::Config(format!(
                "unknown store '{name}' (configured: {})",
                self.stores.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
            ))
        })?;
        Ok(Credentials {
            store: name.to_owned(),
            seller_id: store.seller_id.clone(),
            access_key_id: store.access_key_id.clone(),
            secret_key: store.secret_key.clone(),
            auth_token: store.auth_token.clone(),
            marketplace_id: store.marketplace_id.clone(),
        })
    }
}

/// One seller account in the `[stores]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Merchant (seller) identifier.
    pub seller_id: String,
    /// Access key id sent as `AWSAccessKeyId`.
    pub access_key_id: String,
    /// Secret used to sign requests.
    #[serde(default)]
    pub secret_key: Option<SecretKey>,
    /// Default marketplace for resource builders.
    #[serde(default)]
    pub marketplace_id: Option<String>,
    /// Delegated-access token sent as `MWSAuthToken`.
    #[serde(default)]
    pub auth_token: Option<String>,
}

/// Signing secret.
///
/// `Debug` prints `[REDACTED]` and the buffer is zeroed on drop.
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecretKey(String);

impl SecretKey {
    /// Wraps a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Read-only access to the secret. Never log the returned value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Credentials of the active store.
#[derive(Debug, Clone)]
pub struct Credentials {
    store: String,
    seller_id: String,
    access_key_id: String,
    secret_key: Option<SecretKey>,
    auth_token: Option<String>,
    marketplace_id: Option<String>,
}

impl Credentials {
    /// Creates credentials without going through a configuration file.
    #[must_use]
    pub fn new(
        store: impl Into<String>,
        seller_id: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_key: Option<SecretKey>,
    ) -> Self {
        Self {
            store: store.into(),
            seller_id: seller_id.into(),
            access_key_id: access_key_id.into(),
            secret_key,
            auth_token: None,
            marketplace_id: None,
        }
    }

    /// Sets the `MWSAuthToken`.
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Sets the default marketplace.
    #[must_use]
    pub fn with_marketplace_id(mut self, marketplace_id: impl Into<String>) -> Self {
        self.marketplace_id = Some(marketplace_id.into());
        self
    }

    /// Store name these credentials came from.
    #[must_use]
    pub fn store(&self) -> &str {
        &self.store
    }

    /// Seller id.
    #[must_use]
    pub fn seller_id(&self) -> &str {
        &self.seller_id
    }

    /// Access key id.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// `MWSAuthToken`, if any.
    #[must_use]
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// Default marketplace, if any.
    #[must_use]
    pub fn marketplace_id(&self) -> Option<&str> {
        self.marketplace_id.as_deref()
    }

    /// Secret key needed for signing.
    ///
    /// # Errors
    ///
    /// Returns [`MwsError::MissingCredential`] if the store has none.
    pub fn secret_key(&self) -> Result<&SecretKey> {
        self.secret_key.as_ref().filter(|k| !k.expose().is_empty()).ok_or_else(|| {
            tracing::error!(store = %self.store, "store has no secret key");
            MwsError::MissingCredential { store: self.store.clone() }
        })
    }
}

/// `[retry]` table. Both bounds default to unset, which retries 503
/// responses forever.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySettings {
    /// Maximum number of requests per call, including the first.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// Give up once this many seconds have passed since the first attempt.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

impl RetrySettings {
    /// Validates the bounds.
    ///
    /// # Errors
    ///
    /// Returns [`MwsError::Config`] if either bound is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == Some(0) {
            return Err(MwsError::Config("retry.max_attempts must be at least 1".to_owned()));
        }
        if self.deadline_secs == Some(0) {
            return Err(MwsError::Config("retry.deadline_secs must be at least 1".to_owned()));
        }
        Ok(())
    }

    /// Converts to the retrier's policy.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            deadline: self.deadline_secs.map(Duration::from_secs),
        }
    }
}

/// `[mock]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockSettings {
    /// Directory fixture paths are resolved against.
    #[serde(default = "default_fixture_dir")]
    pub fixture_dir: PathBuf,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self { fixture_dir: default_fixture_dir() }
    }
}

fn default_service_url() -> String {
    DEFAULT_SERVICE_URL.to_owned()
}

fn default_signature_method() -> String {
    SignatureMethod::default().as_str().to_owned()
}

fn default_fixture_dir() -> PathBuf {
    PathBuf::from("mock")
}
