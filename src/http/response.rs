//! Canonical response.
//!
//! # Responsibilities
//! - Hold status, optional custom status text, headers and body
//! - Build plain-text error and redirect responses
//! - Classify responses (error, finished) for short-circuit decisions
//! - Convert into an axum response at the transport edge
//!
//! # Design Decisions
//! - Transport-neutral: nothing here writes to a socket
//! - Error bodies are plain text, never rendered content

use std::borrow::Cow;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::IntoResponse;

/// Statuses after which a controller stops processing.
const FINISHED_STATUSES: [u16; 8] = [301, 302, 303, 304, 305, 307, 401, 403];

#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    status_text: Option<String>,
    headers: HeaderMap,
    body: Bytes,
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            status_text: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// 200 with the given body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        let mut response = Self::default();
        response.set_body(body);
        response
    }

    pub fn plain_text(status: StatusCode, body: impl Into<String>) -> Self {
        let body: String = body.into();
        let mut response = Self::new(status);
        response.set_body(body);
        response.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }

    /// Redirect to `location`. Codes outside 3xx fall back to 302.
    pub fn redirect(location: &str, status: StatusCode) -> Self {
        let status = if status.is_redirection() {
            status
        } else {
            StatusCode::FOUND
        };
        let mut response = Self::new(status);
        response.set_header(header::LOCATION, location);
        response
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Custom status text, or the canonical reason phrase.
    pub fn status_text(&self) -> &str {
        self.status_text
            .as_deref()
            .or_else(|| self.status.canonical_reason())
            .unwrap_or("")
    }

    pub fn set_status_text(&mut self, text: impl Into<String>) {
        self.status_text = Some(text.into());
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set a header. Values that are not valid header text are dropped.
    pub fn set_header(&mut self, name: HeaderName, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(_) => tracing::warn!(header = %name, "Dropping invalid header value"),
        }
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    pub fn is_error(&self) -> bool {
        let code = self.status.as_u16();
        !(200..400).contains(&code)
    }

    /// True once the response should be sent as-is (redirects, auth
    /// failures).
    pub fn is_finished(&self) -> bool {
        FINISHED_STATUSES.contains(&self.status.as_u16())
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let mut response = axum::response::Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
