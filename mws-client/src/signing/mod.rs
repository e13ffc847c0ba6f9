//! Signature Version 2 request signing.
//!
//! The service authenticates every call with an HMAC over a canonical
//! rendering of the request:
//!
//! ```text
//! POST\n
//! mws.amazonservices.com\n
//! /Orders/2013-09-01\n
//! AWSAccessKeyId=...&Action=ListOrders&...&Timestamp=...&Version=2013-09-01
//! ```
//!
//! Parameters are sorted byte-wise by key and percent-encoded per RFC 3986,
//! so the signature never depends on insertion order.

use std::{collections::BTreeMap, fmt, str::FromStr};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::error::MwsError;

mod signer;

pub use signer::{sign, string_to_sign};

/// Signature version sent in the `SignatureVersion` parameter.
pub const SIGNATURE_VERSION: &str = "2";

/// Name of the parameter carrying the computed signature.
pub const SIGNATURE_PARAM: &str = "Signature";

/// Characters left unescaped: RFC 3986 unreserved set minus alphanumerics.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Percent-encodes a value per RFC 3986.
///
/// Letters, digits and `-_.~` pass through; every other byte of the UTF-8
/// encoding becomes `%XX` with uppercase hex. Space is `%20`, never `+`.
///
/// # Examples
///
/// ```
/// use mws_client::signing::percent_encode;
///
/// assert_eq!(percent_encode("a b~c*"), "a%20b~c%2A");
/// assert_eq!(percent_encode("2024-01-01T00:00:00Z"), "2024-01-01T00%3A00%3A00Z");
/// ```
#[must_use]
pub fn percent_encode(value: &str) -> String {
    utf8_percent_encode(value, UNRESERVED).to_string()
}

/// Percent-encodes a URL path, keeping `/` separators. Empty paths become `/`.
#[must_use]
pub fn encode_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_owned();
    }
    path.split('/').map(percent_encode).collect::<Vec<_>>().join("/")
}

/// HMAC algorithm named in the `SignatureMethod` parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignatureMethod {
    /// HMAC with SHA-1.
    HmacSha1,
    /// HMAC with SHA-256.
    #[default]
    HmacSha256,
}

impl SignatureMethod {
    /// Wire name of the algorithm.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::HmacSha1 => "HmacSHA1",
            Self::HmacSha256 => "HmacSHA256",
        }
    }
}

impl FromStr for SignatureMethod {
    type Err = MwsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HmacSHA1" => Ok(Self::HmacSha1),
            "HmacSHA256" => Ok(Self::HmacSha256),
            other => Err(MwsError::UnsupportedAlgorithm(other.to_owned())),
        }
    }
}

impl fmt::Display for SignatureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request parameters, kept sorted by key.
///
/// Keys are unique; inserting an existing key replaces its value. Iteration
/// is always in canonical (byte-wise ascending) key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters(BTreeMap<String, String>);

impl Parameters {
    /// Creates an empty parameter map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a parameter, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Removes a parameter, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Looks up a parameter.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns true if the parameter is set.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Keeps only the parameters for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &str) -> bool) {
        self.0.retain(|k, v| keep(k, v));
    }

    /// Removes every parameter.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no parameters are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates in canonical key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Renders `key=value` pairs in canonical order, percent-encoded and
    /// joined with `&`. Used both as the signed query string and as the
    /// form-encoded POST body.
    #[must_use]
    pub fn canonical_query(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Parameters {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(|(k, v)| (k.into(), v.into())));
    }
}

#[cfg(test)]
mod tests;
