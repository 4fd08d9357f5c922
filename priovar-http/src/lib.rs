//! JSON HTTP client for the portal backend with safe logging and token auth.
//!
//! - Request options: headers, `Auth`, query params, timeout, retries
//! - The `Authorization` value is never logged
//! - Retries network errors, 429 and 5xx with exponential backoff and
//!   `Retry-After` support, for idempotent methods only; a POST is sent once
//! - Paths are given as segments; each one is percent-encoded, so an id can
//!   never add or climb path levels
//! - Empty success bodies decode as JSON `null`, so `()` works as a response type
//! - Optional *raw* request/response logging via `PRIOVAR_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), priovar_http::HttpError> {
//! let client = priovar_http::HttpClient::new("https://portal.example.org/priovar/")?
//!     .with_token("0123456789abcdef");
//! let center: serde_json::Value = client
//!     .get_json(&["medicalCenter", "7"], priovar_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! Observability: `tracing` events `http.request.start`, `http.response`,
//! `http.retrying`, `http.error` and (optionally) raw lines under target
//! `http.raw`.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

const RAW_ENV: &str = "PRIOVAR_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;
const SNIPPET_MAX: usize = 500;

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

fn next_request_id() -> String {
    format!("r{}", REQUEST_SEQ.fetch_add(1, Ordering::Relaxed))
}

/// Render a best-effort curl command for repro/debug. Authorization is redacted.
fn make_curl(method: &Method, url: &Url, headers: &HeaderMap, body: Option<&[u8]>) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{}", method)];
    for (name, val) in redact_headers(headers) {
        parts.push(format!("-H '{}: {}'", name, val.replace('\'', r"'\''")));
    }
    if let Some(bytes) = body {
        match std::str::from_utf8(bytes) {
            Ok(s) => {
                let mut s = s.to_string();
                truncate_at_boundary(&mut s, RAW_MAX_BODY);
                parts.push(format!("-d '{}'", s.replace('\'', r"'\''")));
            }
            Err(_) => parts.push(format!("--data-binary @- # ({} bytes)", bytes.len())),
        }
    }
    parts.push(format!("'{}'", url.as_str()));
    parts.join(" ")
}

fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let val = if k == AUTHORIZATION {
                "<redacted>".to_string()
            } else {
                v.to_str().unwrap_or("").to_string()
            };
            (key, val)
        })
        .collect()
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

impl HttpError {
    /// HTTP status for API errors, `None` for transport failures.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Authentication strategies.
///
/// ```
/// use priovar_http::Auth;
///
/// let auth = Auth::Token("abc");
/// assert!(matches!(auth, Auth::Token("abc")));
/// ```
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// `Authorization: Token <token>`, the portal's session scheme.
    Token(&'a str),
    /// Custom header.
    Header {
        name: HeaderName,
        value: HeaderValue,
    },
    /// Send without credentials even if the client has a default token.
    None,
}

/// Per-request tuning knobs.
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    /// Overrides the client's default token when set.
    pub auth: Option<Auth<'a>>,
    pub headers: Option<HeaderMap>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
}

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    token: Option<String>,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base", &self.base.as_str())
            .field("has_token", &self.token.is_some())
            .field("default_timeout", &self.default_timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl HttpClient {
    /// Construct a client anchored to a base URL. A missing trailing slash is
    /// added so relative paths append instead of replacing the last segment.
    ///
    /// ```no_run
    /// use priovar_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://portal.example.org/priovar")?;
    /// assert_eq!(client.base().as_str(), "https://portal.example.org/priovar/");
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// assert_eq!(client.max_retries, 0);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let mut normalized = base.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base = Url::parse(&normalized).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            token: None,
            default_timeout: Duration::from_secs(15),
            max_retries: 0,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// Retry budget for idempotent requests.
    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    /// Default `Token` credential attached to every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub async fn get_json<T>(&self, path: &[&str], opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        self.request_json::<(), T>(Method::GET, path, None, opts)
            .await
    }

    pub async fn post_json<B, T>(
        &self,
        path: &[&str],
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request_json(Method::POST, path, Some(body), opts)
            .await
    }

    pub async fn delete<T>(&self, path: &[&str], opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        self.request_json::<(), T>(Method::DELETE, path, None, opts)
            .await
    }

    /// Appends `segments` to the base path, percent-encoding each one. Empty,
    /// `.` and `..` segments are rejected.
    ///
    /// ```no_run
    /// # use priovar_http::{HttpClient, HttpError};
    /// let client = HttpClient::new("https://portal.example.org/priovar")?;
    /// let url = client.resolve(&["patient", "../7?x"])?;
    /// assert_eq!(url.as_str(), "https://portal.example.org/priovar/patient/..%2F7%3Fx");
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn resolve(&self, segments: &[&str]) -> Result<Url, HttpError> {
        if let Some(bad) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
            return Err(HttpError::Url(format!("invalid path segment `{bad}`")));
        }
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| HttpError::Url(format!("{} cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request_json<B, T>(
        &self,
        method: Method,
        path: &[&str],
        body: Option<&B>,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let raw = self.execute(method, path, body, opts).await?;
        let payload: &[u8] = if raw.body.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &raw.body
        };
        serde_json::from_slice::<T>(payload).map_err(|e| {
            let snippet = snip_body(&raw.body);
            tracing::warn!(
                req_id=%raw.req_id,
                serde_line=%e.line(),
                serde_col=%e.column(),
                serde_err=%e,
                body_snippet=%snippet,
                "http.response.decode_error"
            );
            HttpError::Decode(e.to_string(), snippet)
        })
    }

    /// POST where any 2xx counts as an acknowledgement; the body is ignored.
    pub async fn post_ack<B>(
        &self,
        path: &[&str],
        body: Option<&B>,
        opts: RequestOpts<'_>,
    ) -> Result<(), HttpError>
    where
        B: Serialize + ?Sized,
    {
        self.execute(Method::POST, path, body, opts).await.map(|_| ())
    }

    /// DELETE where any 2xx counts as an acknowledgement; the body is ignored.
    pub async fn delete_ack(&self, path: &[&str], opts: RequestOpts<'_>) -> Result<(), HttpError> {
        self.execute::<()>(Method::DELETE, path, None, opts)
            .await
            .map(|_| ())
    }

    async fn execute<B>(
        &self,
        method: Method,
        path: &[&str],
        body: Option<&B>,
        opts: RequestOpts<'_>,
    ) -> Result<RawResponse, HttpError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.resolve(path)?;
        let idempotent = method != Method::POST && method != Method::PATCH;
        let max_retries = if idempotent {
            opts.retries.unwrap_or(self.max_retries)
        } else {
            0
        };
        let timeout = opts.timeout.unwrap_or(self.default_timeout);

        let request_body = match body {
            Some(b) => Some(serde_json::to_vec(b).map_err(|e| HttpError::Build(e.to_string()))?),
            None => None,
        };

        let mut headers = opts.headers.clone().unwrap_or_default();
        let auth_kind = match &opts.auth {
            Some(Auth::Token(tok)) => {
                headers.insert(AUTHORIZATION, token_header(tok)?);
                "token"
            }
            Some(Auth::Header { name, value }) => {
                headers.insert(name.clone(), value.clone());
                "header"
            }
            Some(Auth::None) => "none",
            None => match &self.token {
                Some(tok) => {
                    headers.insert(AUTHORIZATION, token_header(tok)?);
                    "token"
                }
                None => "none",
            },
        };

        let query: Vec<(&str, &str)> = opts
            .query
            .as_ref()
            .map(|q| q.iter().map(|(k, v)| (*k, v.as_ref())).collect())
            .unwrap_or_default();

        let req_id = next_request_id();
        let mut attempt = 0usize;

        loop {
            let mut rb = self
                .inner
                .request(method.clone(), url.clone())
                .timeout(timeout)
                .headers(headers.clone());
            if !query.is_empty() {
                rb = rb.query(&query);
            }
            if let Some(bytes) = &request_body {
                rb = rb
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(bytes.clone());
            }

            tracing::debug!(
                req_id=%req_id,
                attempt=attempt + 1,
                max_retries,
                method=%method,
                path=%url.path(),
                query=?query,
                timeout_ms=timeout.as_millis() as u64,
                auth_kind,
                has_body=%request_body.is_some(),
                "http.request.start"
            );

            if raw_enabled() {
                let curl = make_curl(&method, &url, &headers, request_body.as_deref());
                tracing::debug!(target: "http.raw", %req_id, %curl, "request");
            }

            let t0 = std::time::Instant::now();
            let sent = match rb.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let resp_headers = resp.headers().clone();
                    resp.bytes().await.map(|b| (status, resp_headers, b))
                }
                Err(err) => Err(err),
            };

            let (status, resp_headers, bytes) = match sent {
                Ok(parts) => parts,
                Err(err) => {
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff(attempt);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            max_retries,
                            backoff_ms=delay.as_millis() as u64,
                            message=%err,
                            "http.retrying.network"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(req_id=%req_id, attempt, message=%err, "http.network_error");
                    if err.is_timeout() {
                        return Err(HttpError::Timeout(timeout));
                    }
                    return Err(HttpError::Network(err.to_string()));
                }
            };
            let dur_ms = t0.elapsed().as_millis() as u64;

            let server_req_id = resp_headers
                .get("x-request-id")
                .or_else(|| resp_headers.get("x-correlation-id"))
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();

            tracing::debug!(
                req_id=%req_id,
                %status,
                duration_ms=dur_ms,
                body_len=bytes.len(),
                x_request_id=%server_req_id,
                "http.response"
            );

            if raw_enabled() {
                let mut text = String::from_utf8_lossy(&bytes).into_owned();
                let truncated = truncate_at_boundary(&mut text, RAW_MAX_BODY);
                tracing::info!(
                    target: "http.raw",
                    %req_id,
                    status=%status,
                    duration_ms=dur_ms,
                    headers=?redact_headers(&resp_headers),
                    body=%text,
                    truncated
                );
            }

            if status.is_success() {
                return Ok(RawResponse {
                    req_id,
                    body: bytes.to_vec(),
                });
            }

            let message = extract_error_message(&bytes);
            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();

            if retryable && attempt < max_retries {
                attempt += 1;
                let retry_after = retry_after_delay_secs(&resp_headers);
                let delay = retry_after
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| backoff(attempt));
                tracing::warn!(
                    req_id=%req_id,
                    %status,
                    attempt,
                    max_retries,
                    backoff_ms=delay.as_millis() as u64,
                    retry_after_secs=?retry_after,
                    message=%message,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(
                req_id=%req_id,
                %status,
                message=%message,
                x_request_id=%server_req_id,
                body_snippet=%snip_body(&bytes),
                "http.error"
            );
            return Err(HttpError::Api {
                status,
                message,
                request_id: server_req_id,
            });
        }
    }
}

struct RawResponse {
    req_id: String,
    body: Vec<u8>,
}

fn backoff(attempt: usize) -> Duration {
    let shift = attempt.saturating_sub(1).min(10) as u32;
    Duration::from_millis(200u64.saturating_mul(1 << shift))
}

fn token_header(raw: &str) -> Result<HeaderValue, HttpError> {
    let token = sanitize_token(raw)?;
    let mut value = HeaderValue::from_str(&format!("Token {token}"))
        .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

fn sanitize_token(raw: &str) -> Result<String, HttpError> {
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    s.retain(|ch| !ch.is_ascii_whitespace());

    if s.is_empty() {
        return Err(HttpError::Build("auth token is empty".into()));
    }
    if !s.is_ascii() {
        return Err(HttpError::Build("auth token contains non-ASCII bytes".into()));
    }
    if s.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build(
            "auth token contains control characters".into(),
        ));
    }
    Ok(s)
}

/// Pull a human readable message out of an error body.
///
/// Understands Spring-style `{"status":..,"error":..,"message":..}` bodies,
/// `{"detail":..}` and plain text; anything else is returned as a snippet.
fn extract_error_message(body: &[u8]) -> String {
    #[derive(Deserialize)]
    struct Msg {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        error: String,
    }

    if let Ok(m) = serde_json::from_slice::<Msg>(body) {
        for candidate in [m.message, m.detail, m.error] {
            if !candidate.trim().is_empty() {
                return candidate;
            }
        }
    }
    snip_body(body)
}

fn retry_after_delay_secs(h: &HeaderMap) -> Option<u64> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .trim()
        .parse()
        .ok()
}

fn truncate_at_boundary(s: &mut String, max: usize) -> bool {
    if s.len() <= max {
        return false;
    }
    let mut cut = max;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
    true
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if truncate_at_boundary(&mut snip, SNIPPET_MAX) {
        snip.push_str("...");
    }
    snip
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spring_error_prefers_message() {
        let body = br#"{"status":404,"error":"Not Found","message":"Patient 9 not found"}"#;
        assert_eq!(extract_error_message(body), "Patient 9 not found");
    }

    #[test]
    fn falls_back_to_error_field_then_snippet() {
        assert_eq!(
            extract_error_message(br#"{"error":"Forbidden","message":""}"#),
            "Forbidden"
        );
        assert_eq!(extract_error_message(b"gateway down"), "gateway down");
    }

    #[test]
    fn token_is_trimmed_and_validated() {
        assert_eq!(sanitize_token(" 'abc def' ").unwrap(), "abcdef");
        assert!(sanitize_token("   ").is_err());
        assert!(sanitize_token("tök").is_err());
    }

    #[test]
    fn authorization_is_redacted() {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_static("Token secret"));
        h.insert("x-trace", HeaderValue::from_static("t1"));
        let redacted = redact_headers(&h);
        assert!(redacted.contains(&("authorization".into(), "<redacted>".into())));
        assert!(redacted.contains(&("x-trace".into(), "t1".into())));
    }

    #[test]
    fn snippets_respect_char_boundaries() {
        let body = "é".repeat(400);
        let snip = snip_body(body.as_bytes());
        assert!(snip.ends_with("..."));
        assert!(snip.len() <= SNIPPET_MAX + 3);
    }

    #[test]
    fn segments_are_percent_encoded() {
        let client = HttpClient::new("http://localhost:8080/priovar").unwrap();
        let url = client.resolve(&["file", "vcf", "a/b c?d#e", "annotate"]).unwrap();
        assert_eq!(url.path(), "/priovar/file/vcf/a%2Fb%20c%3Fd%23e/annotate");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn backoff_doubles() {
        assert_eq!(backoff(1), Duration::from_millis(200));
        assert_eq!(backoff(2), Duration::from_millis(400));
        assert_eq!(backoff(3), Duration::from_millis(800));
    }
}
