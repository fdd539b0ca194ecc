//! Signed HTTP client for S3-compatible object storage.
//!
//! This module provides the lowest layer of the registry stack: GET and
//! LIST requests against a bucket, signed with AWS Signature V4. Transient
//! faults (transport errors, 5xx, 429) are retried locally with additive
//! backoff; everything else surfaces to the caller unchanged.

use crate::error::{Result, RgcError};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;


type HmacSha256 = Hmac<Sha256>;

const SIGNING_ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SIGNED_HEADERS: &str = "date;host;x-amz-content-sha256";

/// Configuration for the object store client.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// Use HTTPS for the derived endpoint (ignored with an explicit
    /// endpoint override).
    pub secure: bool,
    /// Full endpoint override (scheme included) for S3-compatible
    /// services.
    pub endpoint: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
    /// Maximum retries for a failed request.
    pub max_retries: u32,
    /// Additive backoff step in seconds.
    pub retry_step_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: "us-east-1".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
            secure: true,
            endpoint: None,
            timeout_seconds: 30,
            max_retries: 3,
            retry_step_seconds: 2,
        }
    }
}

/// One page of a LIST response.
#[derive(Debug, Default, PartialEq)]
pub struct ListPage {
    /// Object keys on this page.
    pub contents: Vec<String>,
    /// Common prefixes collapsed by the delimiter.
    pub common_prefixes: Vec<String>,
    /// Marker to resume from, when truncated.
    pub next_marker: Option<String>,
    /// Whether more pages follow.
    pub is_truncated: bool,
}

#[derive(Deserialize)]
struct ListBucketResult {
    #[serde(rename = "IsTruncated", default)]
    is_truncated: bool,
    #[serde(rename = "NextMarker")]
    next_marker: Option<String>,
    #[serde(rename = "Contents", default)]
    contents: Vec<ListEntry>,
    #[serde(rename = "CommonPrefixes", default)]
    common_prefixes: Vec<PrefixEntry>,
}

#[derive(Deserialize)]
struct ListEntry {
    #[serde(rename = "Key")]
    key: String,
}

#[derive(Deserialize)]
struct PrefixEntry {
    #[serde(rename = "Prefix")]
    prefix: String,
}

#[derive(Deserialize)]
struct ErrorDocument {
    #[serde(rename = "Message")]
    message: Option<String>,
}

/// Signed S3 client.
pub struct ObjectStore {
    http: reqwest::Client,
    config: StoreConfig,
    /// Derived signing keys, cached by (yyyymmdd, region). Keys expire
    /// at UTC midnight: a new date misses the cache and evicts old
    /// entries.
    signing_keys: Mutex<HashMap<(String, String), [u8; 32]>>,
}

impl ObjectStore {
    /// Creates a new client.
    ///
    /// Fails with an authentication error when credentials are missing,
    /// since every request must be signed.
    pub fn new(config: StoreConfig) -> Result<Self> {
        if config.access_key.is_empty() || config.secret_key.is_empty() {
            return Err(RgcError::auth(
                "Object store requests must be signed: access_key and secret_key are required",
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| RgcError::transport_with_source("Failed to create HTTP client", e))?;

        Ok(Self {
            http,
            config,
            signing_keys: Mutex::new(HashMap::new()),
        })
    }

    /// The endpoint this client talks to, scheme included.
    pub fn endpoint(&self) -> String {
        if let Some(ref endpoint) = self.config.endpoint {
            return endpoint.trim_end_matches('/').to_string();
        }
        let host = if self.config.region == "us-east-1" {
            "s3-external-1.amazonaws.com".to_string()
        } else {
            format!("s3-{}.amazonaws.com", self.config.region)
        };
        let scheme = if self.config.secure { "https" } else { "http" };
        format!("{}://{}", scheme, host)
    }

    /// Fetches an object by key.
    pub async fn get(&self, key: &str) -> Result<Bytes> {
        let response = self.request(key, &[]).await?;
        response
            .bytes()
            .await
            .map_err(|e| RgcError::transport_with_source("Failed to read response body", e))
    }

    /// Lists one page of keys under `prefix`.
    ///
    /// With a delimiter, keys sharing a prefix up to the delimiter
    /// collapse into `common_prefixes`. Pass the previous page's marker
    /// to resume.
    pub async fn list(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        marker: Option<&str>,
    ) -> Result<ListPage> {
        let mut query: Vec<(String, String)> = Vec::new();
        if let Some(d) = delimiter {
            query.push(("delimiter".to_string(), d.to_string()));
        }
        if let Some(m) = marker {
            query.push(("marker".to_string(), m.to_string()));
        }
        query.push(("prefix".to_string(), prefix.to_string()));

        let response = self.request("", &query).await?;
        let body = response
            .text()
            .await
            .map_err(|e| RgcError::transport_with_source("Failed to read LIST response", e))?;

        let result: ListBucketResult = quick_xml::de::from_str(&body)
            .map_err(|e| RgcError::parse_with_source("Failed to parse LIST response XML", e))?;

        Ok(ListPage {
            contents: result.contents.into_iter().map(|c| c.key).collect(),
            common_prefixes: result
                .common_prefixes
                .into_iter()
                .map(|p| p.prefix)
                .collect(),
            next_marker: result.next_marker,
            is_truncated: result.is_truncated,
        })
    }

    /// Issues one signed GET with retries.
    async fn request(
        &self,
        key: &str,
        query: &[(String, String)],
    ) -> Result<reqwest::Response> {
        let mut attempt: u32 = 0;
        loop {
            match self.execute(key, query).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < self.config.max_retries && e.is_retryable() => {
                    let delay =
                        Duration::from_secs(1 + u64::from(attempt) * self.config.retry_step_seconds);
                    tracing::warn!(
                        key,
                        attempt = attempt + 1,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "store request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// The canonical request path and full URL for an object key. The
    /// query string is in canonical (sorted, encoded) form so the signed
    /// request and the wire request always agree.
    fn object_url(&self, key: &str, query: &[(String, String)]) -> (String, String) {
        let uri = format!(
            "/{}/{}",
            uri_encode(&self.config.bucket, false),
            uri_encode(key, false)
        );
        let query_string = canonical_query(query);
        let url = if query_string.is_empty() {
            format!("{}{}", self.endpoint(), uri)
        } else {
            format!("{}{}?{}", self.endpoint(), uri, query_string)
        };
        (uri, url)
    }

    async fn execute(&self, key: &str, query: &[(String, String)]) -> Result<reqwest::Response> {
        let (uri, url) = self.object_url(key, query);

        let headers = self.signed_headers("GET", &uri, query, &[], Utc::now())?;

        let mut request = self.http.get(&url);
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| translate_reqwest_error(e, &url))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let is_xml = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/xml"));
        let body = response.text().await.unwrap_or_default();

        let message = if is_xml && !body.is_empty() {
            quick_xml::de::from_str::<ErrorDocument>(&body)
                .ok()
                .and_then(|doc| doc.message)
        } else {
            None
        };

        Err(RgcError::store(
            message.unwrap_or_else(|| {
                format!(
                    "HTTP {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("unknown")
                )
            }),
            status.as_u16(),
        ))
    }

    /// Computes the signed header set for a request at a fixed instant.
    ///
    /// Deterministic: for the same request and timestamp the resulting
    /// Authorization value is byte-identical.
    fn signed_headers(
        &self,
        method: &str,
        uri: &str,
        query: &[(String, String)],
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>> {
        let host = self
            .endpoint()
            .split("://")
            .nth(1)
            .unwrap_or_default()
            .to_string();
        let date = now.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let scope_date = now.format("%Y%m%d").to_string();
        let scope = format!("{}/{}/s3/aws4_request", scope_date, self.config.region);
        let payload_hash = hex::encode(Sha256::digest(payload));

        // Canonical headers sort by lower-cased name, values trimmed.
        let canonical_headers = format!(
            "date:{}\nhost:{}\nx-amz-content-sha256:{}\n",
            date, host, payload_hash
        );
        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method,
            uri,
            canonical_query(query),
            canonical_headers,
            SIGNED_HEADERS,
            payload_hash
        );

        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            SIGNING_ALGORITHM,
            date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let key = self.signing_key(&scope_date)?;
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            SIGNING_ALGORITHM, self.config.access_key, scope, SIGNED_HEADERS, signature
        );

        Ok(vec![
            ("Host".to_string(), host),
            ("Date".to_string(), date),
            ("x-amz-content-sha256".to_string(), payload_hash),
            ("Authorization".to_string(), authorization),
        ])
    }

    /// Derives (or fetches from cache) the signing key for a scope date.
    fn signing_key(&self, scope_date: &str) -> Result<[u8; 32]> {
        let cache_key = (scope_date.to_string(), self.config.region.clone());
        let mut cache = self
            .signing_keys
            .lock()
            .map_err(|_| RgcError::auth("Signing key cache poisoned"))?;

        if let Some(key) = cache.get(&cache_key) {
            return Ok(*key);
        }

        let mut key = hmac_sha256(
            format!("AWS4{}", self.config.secret_key).as_bytes(),
            scope_date.as_bytes(),
        );
        key = hmac_sha256(&key, self.config.region.as_bytes());
        key = hmac_sha256(&key, b"s3");
        key = hmac_sha256(&key, b"aws4_request");

        // Stale dates never match again; drop them.
        cache.retain(|(date, _), _| date == scope_date);
        cache.insert(cache_key, key);
        Ok(key)
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Sorted, URI-encoded query string, shared between the canonical request
/// and the request URL.
fn canonical_query(query: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (uri_encode(k, true), uri_encode(v, true)))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encodes a string the way Signature V4 expects: unreserved
/// characters pass through, everything else becomes `%XX`. Path encoding
/// keeps `/` literal.
fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn translate_reqwest_error(error: reqwest::Error, url: &str) -> RgcError {
    if error.is_timeout() {
        RgcError::transport(format!("Request to {} timed out", url))
    } else if error.is_connect() {
        RgcError::transport_with_source(format!("Failed to connect to {}", url), error)
    } else {
        RgcError::transport_with_source(format!("Request to {} failed", url), error)
    }
}
