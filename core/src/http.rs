//! Request and response types for the executor pipeline.
//!
//! # Design
//! `RequestSpec` describes one HTTP call as plain data: a method, a target,
//! query parameters, headers and an opaque body. It is built once through
//! consuming `with`-style methods and then only read, so the same spec can be
//! replayed by a retry loop without any chance of drift between attempts.
//!
//! `NormalizedResponse` is the transport-agnostic view of a reply. Header
//! lookup is case-insensitive (`http::HeaderMap`), the body is kept as raw
//! bytes, and JSON is parsed only when asked for, at most once.
//!
//! Query parameters and headers live in `BTreeMap`s so the serialized URL and
//! header order are identical for identical specs.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::error::{BodyParseError, TransportError};

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for http::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => http::Method::GET,
            HttpMethod::Post => http::Method::POST,
            HttpMethod::Put => http::Method::PUT,
            HttpMethod::Patch => http::Method::PATCH,
            HttpMethod::Delete => http::Method::DELETE,
        }
    }
}

/// One HTTP call described as plain data.
///
/// `target` is either an absolute `http(s)://` URL or a path that the
/// executor joins onto its base URL. Header names are stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    method: HttpMethod,
    target: String,
    query: BTreeMap<String, String>,
    headers: BTreeMap<String, String>,
    body: Option<Bytes>,
}

impl RequestSpec {
    pub fn new(method: HttpMethod, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, target)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, target)
    }

    pub fn put(target: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, target)
    }

    pub fn patch(target: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, target)
    }

    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, target)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name: String = name.into();
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Attach a session token as `Authorization: Bearer <token>`.
    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header(AUTHORIZATION.as_str(), format!("Bearer {token}"))
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Encode `pairs` as an `application/x-www-form-urlencoded` body.
    pub fn with_form<K, V>(self, pairs: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in pairs {
            serializer.append_pair(key.as_ref(), value.as_ref());
        }
        self.with_header(CONTENT_TYPE.as_str(), FORM_CONTENT_TYPE)
            .with_body(serializer.finish())
    }

    /// Serialize `payload` as a JSON body.
    pub fn with_json<T: Serialize>(self, payload: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(payload)?;
        Ok(self
            .with_header(CONTENT_TYPE.as_str(), JSON_CONTENT_TYPE)
            .with_body(body))
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Resolve the final URL: join a relative target onto `base_url`, then
    /// append query parameters in sorted key order.
    pub fn resolve_url(&self, base_url: Option<&str>) -> Result<Url, TransportError> {
        let raw = if is_absolute(&self.target) {
            self.target.clone()
        } else {
            let base = base_url.ok_or_else(|| {
                TransportError::InvalidRequest(format!(
                    "relative target `{}` without a base URL",
                    self.target
                ))
            })?;
            format!(
                "{}/{}",
                base.trim_end_matches('/'),
                self.target.trim_start_matches('/')
            )
        };

        let mut url = Url::parse(&raw)
            .map_err(|err| TransportError::InvalidRequest(format!("invalid URL `{raw}`: {err}")))?;
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Convert the header table into an `http::HeaderMap`.
    pub fn header_map(&self) -> Result<HeaderMap, TransportError> {
        let mut headers = HeaderMap::new();
        for (key, value) in &self.headers {
            if key.is_empty() {
                return Err(TransportError::InvalidRequest(
                    "empty header name".to_string(),
                ));
            }
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|err| {
                TransportError::InvalidRequest(format!("invalid header name `{key}`: {err}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|err| {
                TransportError::InvalidRequest(format!("invalid header value for `{key}`: {err}"))
            })?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

fn is_absolute(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://")
}

/// Transport-agnostic representation of an HTTP reply.
#[derive(Debug, Clone)]
pub struct NormalizedResponse {
    status: u16,
    headers: HeaderMap,
    body: Bytes,
    elapsed: Duration,
    json: OnceLock<Result<Value, BodyParseError>>,
}

impl NormalizedResponse {
    pub fn new(status: u16, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            elapsed: Duration::ZERO,
            json: OnceLock::new(),
        }
    }

    /// Add a header. Names or values that are not valid HTTP are skipped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Case-insensitive header lookup. Non-UTF-8 values read as `None`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE.as_str())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Round-trip time measured by the executor.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Parse the body as JSON. The outcome, success or failure, is cached.
    pub fn json(&self) -> Result<&Value, BodyParseError> {
        self.json
            .get_or_init(|| serde_json::from_slice(&self.body).map_err(BodyParseError::from))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// The cached JSON value, if `json()` has already succeeded.
    pub fn parsed_json(&self) -> Option<&Value> {
        self.json.get().and_then(|parsed| parsed.as_ref().ok())
    }

    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, BodyParseError> {
        let value = self.json()?;
        T::deserialize(value).map_err(BodyParseError::from)
    }
}
