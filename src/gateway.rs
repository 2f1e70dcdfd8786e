//! Request gateway: the single path every API call takes.
//!
//! DESIGN
//! ======
//! `Gateway::request` builds the URL from the configured base, merges JSON
//! headers with caller headers, injects the bearer token from the session,
//! and turns non-2xx responses into [`ApiError`]. Resource functions in
//! `services` are thin wrappers over it.
//!
//! ERROR HANDLING
//! ==============
//! Transport errors are returned as-is and never retried. A body that is
//! not JSON reads as `{}`. Non-2xx statuses carry the body's `message` and
//! per-field `errors`. A 401 is reported like any other failure; the
//! session is left alone.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::{Map, Value};

use crate::config::ClientConfig;
use crate::session::{SessionError, SessionStore};

/// Message used when a failed response does not carry one.
pub const DEFAULT_ERROR_MESSAGE: &str = "Request failed";

/// Per-field validation messages, in the order the API sent them.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

// =============================================================================
// ERRORS
// =============================================================================

/// A non-2xx response from the API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (status {status})")]
pub struct ApiError {
    pub message: String,
    pub status: u16,
    pub field_errors: Option<FieldErrors>,
}

impl ApiError {
    /// Build from a failed response's status and parsed body.
    #[must_use]
    pub fn from_body(status: u16, body: &Value) -> Self {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_ERROR_MESSAGE)
            .to_owned();
        let field_errors = body.get("errors").and_then(parse_field_errors);
        Self { message, status, field_errors }
    }

    /// First message for `field`, as shown under a form input.
    #[must_use]
    pub fn field_error(&self, field: &str) -> Option<&str> {
        self.field_errors
            .as_ref()
            .and_then(|errors| errors.get(field))
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }
}

/// Accepts `{field: ["msg", ...]}` or `{field: "msg"}`; anything else is `None`.
fn parse_field_errors(raw: &Value) -> Option<FieldErrors> {
    let object = raw.as_object()?;
    let mut errors = FieldErrors::new();
    for (field, messages) in object {
        let list = match messages {
            Value::String(s) => vec![s.clone()],
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect(),
            _ => continue,
        };
        errors.insert(field.clone(), list);
    }
    Some(errors)
}

/// Errors produced by gateway calls and the resource functions built on them.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The API answered with a non-2xx status.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The request never completed (DNS, connect, TLS, timeout, ...).
    #[error("http request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A header value (usually the stored token) is not valid in HTTP.
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),

    /// Persisting session state after an auth call failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A successful response did not have the expected shape.
    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),
}

impl GatewayError {
    #[must_use]
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the API rejected the credentials (401/403). Callers decide
    /// what to do; the session is not cleared automatically.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.api(), Some(ApiError { status: 401 | 403, .. }))
    }
}

// =============================================================================
// REQUEST OPTIONS
// =============================================================================

/// Method, extra headers and JSON body for one gateway call.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}

impl RequestOptions {
    #[must_use]
    pub fn get() -> Self {
        Self { method: Method::GET, headers: HeaderMap::new(), body: None }
    }

    #[must_use]
    pub fn post(body: Value) -> Self {
        Self { method: Method::POST, headers: HeaderMap::new(), body: Some(body) }
    }

    #[must_use]
    pub fn put(body: Value) -> Self {
        Self { method: Method::PUT, headers: HeaderMap::new(), body: Some(body) }
    }

    #[must_use]
    pub fn delete() -> Self {
        Self { method: Method::DELETE, headers: HeaderMap::new(), body: None }
    }

    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

// =============================================================================
// GATEWAY
// =============================================================================

pub struct Gateway {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl Gateway {
    /// Build a gateway over `session` using the timeouts from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig, session: Arc<SessionStore>) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| GatewayError::ClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.base_url.clone(), session })
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue one API call and return the parsed JSON body.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Transport`] if the request could not be completed.
    /// - [`GatewayError::Api`] if the response status is not 2xx.
    /// - [`GatewayError::InvalidHeader`] if the stored token is not a valid header value.
    pub async fn request(&self, endpoint: &str, options: RequestOptions) -> Result<Value, GatewayError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let token = self.session.token();
        let headers = merge_headers(options.headers, token.as_deref())?;

        tracing::debug!(method = %options.method, %url, authenticated = token.is_some(), "api request");

        let mut builder = self.http.request(options.method.clone(), url.as_str()).headers(headers);
        if let Some(body) = &options.body {
            builder = builder.body(serde_json::to_vec(body)?);
        }
        let response = builder.send().await?;

        let status = response.status();
        let data = match response.bytes().await {
            Ok(bytes) => parse_body(&bytes),
            Err(e) => {
                tracing::debug!(%url, error = %e, "response body unreadable; using empty object");
                Value::Object(Map::new())
            }
        };

        if !status.is_success() {
            let err = ApiError::from_body(status.as_u16(), &data);
            tracing::warn!(method = %options.method, %url, status = err.status, message = %err.message, "api request failed");
            return Err(GatewayError::Api(err));
        }
        Ok(data)
    }
}

/// JSON defaults, then caller headers, then the bearer token.
fn merge_headers(caller: HeaderMap, token: Option<&str>) -> Result<HeaderMap, GatewayError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let mut last_name = None;
    for (name, value) in caller {
        // `HeaderMap::into_iter` yields `None` names for extra values of the previous header.
        let name = match name {
            Some(name) => {
                headers.remove(&name);
                last_name = Some(name.clone());
                name
            }
            None => match &last_name {
                Some(name) => name.clone(),
                None => continue,
            },
        };
        headers.append(name, value);
    }

    if let Some(token) = token {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

fn parse_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap_or_else(|_| Value::Object(Map::new()))
}

#[cfg(test)]
#[path = "gateway_test.rs"]
mod tests;
