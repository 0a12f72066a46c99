//! Transport-neutral request.
//!
//! # Responsibilities
//! - Normalize the URL (collapse slashes, strip leading/trailing slash)
//! - Split a trailing file extension off the URL
//! - Resolve the effective HTTP method, honouring method overrides
//! - Expose GET/POST vars, headers and raw body to handlers
//!
//! # Design Decisions
//! - Immutable once built; all dispatch state lives in `RequestCursor`
//! - Override precedence: `_method` POST var, then
//!   `X-HTTP-Method-Override` header, then the transport method
//! - Overrides outside GET/POST/PUT/DELETE/HEAD are a hard input error

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};

use crate::error::DispatchError;

/// POST var carrying a method override.
pub const METHOD_OVERRIDE_FIELD: &str = "_method";

/// Header carrying a method override.
pub const METHOD_OVERRIDE_HEADER: &str = "x-http-method-override";

const OVERRIDE_TARGETS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::HEAD,
];

pub type Vars = BTreeMap<String, String>;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    url: String,
    extension: Option<String>,
    get_vars: Vars,
    post_vars: Vars,
    headers: HeaderMap,
    body: Bytes,
}

impl HttpRequest {
    pub fn builder(method: Method, url: &str) -> HttpRequestBuilder {
        HttpRequestBuilder {
            method,
            url: url.to_string(),
            get_vars: Vars::new(),
            post_vars: Vars::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Effective method after overrides.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Normalized URL without extension.
    pub fn path(&self) -> &str {
        &self.url
    }

    /// URL including the extension and, optionally, the GET vars.
    pub fn url(&self, include_get_vars: bool) -> String {
        let mut url = match &self.extension {
            Some(ext) => format!("{}.{}", self.url, ext),
            None => self.url.clone(),
        };
        if include_get_vars && !self.get_vars.is_empty() {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&self.get_vars)
                .finish();
            url.push('?');
            url.push_str(&query);
        }
        url
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// Non-empty path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.url.split('/').filter(|s| !s.is_empty())
    }

    pub fn get_var(&self, name: &str) -> Option<&str> {
        self.get_vars.get(name).map(String::as_str)
    }

    pub fn post_var(&self, name: &str) -> Option<&str> {
        self.post_vars.get(name).map(String::as_str)
    }

    /// POST var, falling back to GET var.
    pub fn request_var(&self, name: &str) -> Option<&str> {
        self.post_var(name).or_else(|| self.get_var(name))
    }

    pub fn get_vars(&self) -> &Vars {
        &self.get_vars
    }

    pub fn post_vars(&self) -> &Vars {
        &self.post_vars
    }

    /// GET and POST vars merged, POST winning.
    pub fn request_vars(&self) -> Vars {
        let mut vars = self.get_vars.clone();
        vars.extend(self.post_vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        vars
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_ajax(&self) -> bool {
        self.request_var("ajax").is_some_and(|v| !v.is_empty() && v != "0")
            || self.header("x-requested-with") == Some("XMLHttpRequest")
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    pub fn is_post(&self) -> bool {
        self.method == Method::POST
    }

    pub fn is_put(&self) -> bool {
        self.method == Method::PUT
    }

    pub fn is_delete(&self) -> bool {
        self.method == Method::DELETE
    }

    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }
}

pub struct HttpRequestBuilder {
    method: Method,
    url: String,
    get_vars: Vars,
    post_vars: Vars,
    headers: HeaderMap,
    body: Bytes,
}

impl HttpRequestBuilder {
    pub fn get_vars(mut self, vars: Vars) -> Self {
        self.get_vars = vars;
        self
    }

    pub fn get_var(mut self, name: &str, value: &str) -> Self {
        self.get_vars.insert(name.to_string(), value.to_string());
        self
    }

    pub fn post_vars(mut self, vars: Vars) -> Self {
        self.post_vars = vars;
        self
    }

    pub fn post_var(mut self, name: &str, value: &str) -> Self {
        self.post_vars.insert(name.to_string(), value.to_string());
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> Result<HttpRequest, DispatchError> {
        let method = detect_method(self.method, &self.headers, &self.post_vars)?;
        let (url, extension) = normalize_url(&self.url);
        Ok(HttpRequest {
            method,
            url,
            extension,
            get_vars: self.get_vars,
            post_vars: self.post_vars,
            headers: self.headers,
            body: self.body,
        })
    }
}

/// Resolve the effective method of a request.
pub fn detect_method(
    transport: Method,
    headers: &HeaderMap,
    post_vars: &Vars,
) -> Result<Method, DispatchError> {
    let requested = post_vars
        .get(METHOD_OVERRIDE_FIELD)
        .map(String::as_str)
        .or_else(|| {
            headers
                .get(METHOD_OVERRIDE_HEADER)
                .and_then(|v| v.to_str().ok())
        });

    let Some(raw) = requested else {
        return Ok(transport);
    };

    let upper = raw.trim().to_ascii_uppercase();
    OVERRIDE_TARGETS
        .iter()
        .find(|m| m.as_str() == upper)
        .cloned()
        .ok_or_else(|| DispatchError::MalformedMethodOverride(raw.to_string()))
}

/// Collapse repeated slashes, strip the outer ones and split off a
/// trailing `.ext` (`[A-Za-z][A-Za-z0-9]*`) from a non-empty stem.
pub fn normalize_url(raw: &str) -> (String, Option<String>) {
    let path = raw.split(['?', '#']).next().unwrap_or_default();
    let url = path
        .split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    if let Some((base, ext)) = url.rsplit_once('.') {
        let mut chars = ext.chars();
        let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric());
        if valid && !base.is_empty() && !base.ends_with('/') {
            return (base.to_string(), Some(ext.to_string()));
        }
    }
    (url, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("//admin///pages/"), ("admin/pages".into(), None));
        assert_eq!(normalize_url("/"), (String::new(), None));
        assert_eq!(
            normalize_url("/blog/feed.rss"),
            ("blog/feed".into(), Some("rss".into()))
        );
        // Dots inside earlier segments are not extensions
        assert_eq!(normalize_url("v1.2/items"), ("v1.2/items".into(), None));
        assert_eq!(normalize_url("file.2x"), ("file.2x".into(), None));
        assert_eq!(normalize_url("/search?q=a.b"), ("search".into(), None));
        // An extension needs a stem in its own segment
        assert_eq!(normalize_url("/.rss"), (".rss".into(), None));
        assert_eq!(normalize_url("/blog/.rss"), ("blog/.rss".into(), None));
    }

    #[test]
    fn test_segments() {
        let req = HttpRequest::builder(Method::GET, "/Page/save").build().unwrap();
        assert_eq!(req.segments().collect::<Vec<_>>(), vec!["Page", "save"]);

        let root = HttpRequest::builder(Method::GET, "/").build().unwrap();
        assert_eq!(root.segments().count(), 0);
    }

    #[test]
    fn test_override_precedence() {
        let req = HttpRequest::builder(Method::POST, "/")
            .post_var("_method", "delete")
            .header("X-HTTP-Method-Override", "PUT")
            .build()
            .unwrap();
        assert_eq!(req.method(), &Method::DELETE);

        let req = HttpRequest::builder(Method::POST, "/")
            .header("X-HTTP-Method-Override", "PUT")
            .build()
            .unwrap();
        assert_eq!(req.method(), &Method::PUT);

        let req = HttpRequest::builder(Method::POST, "/").build().unwrap();
        assert_eq!(req.method(), &Method::POST);
    }

    #[test]
    fn test_invalid_override_is_fatal() {
        let err = HttpRequest::builder(Method::POST, "/")
            .post_var("_method", "PATCH")
            .build()
            .unwrap_err();
        assert!(matches!(err, DispatchError::MalformedMethodOverride(m) if m == "PATCH"));
    }

    #[test]
    fn test_vars_and_url() {
        let req = HttpRequest::builder(Method::GET, "/feed.rss")
            .get_var("page", "2")
            .get_var("q", "a b")
            .post_var("page", "3")
            .build()
            .unwrap();
        assert_eq!(req.request_var("page"), Some("3"));
        assert_eq!(req.get_var("page"), Some("2"));
        assert_eq!(req.url(false), "feed.rss");
        assert_eq!(req.url(true), "feed.rss?page=2&q=a+b");
    }

    #[test]
    fn test_is_ajax() {
        let req = HttpRequest::builder(Method::GET, "/")
            .header("X-Requested-With", "XMLHttpRequest")
            .build()
            .unwrap();
        assert!(req.is_ajax());

        let req = HttpRequest::builder(Method::GET, "/").get_var("ajax", "1").build().unwrap();
        assert!(req.is_ajax());
        assert!(!HttpRequest::builder(Method::GET, "/").build().unwrap().is_ajax());
    }
}
