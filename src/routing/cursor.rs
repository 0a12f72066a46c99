//! Incremental request parsing state.
//!
//! # Responsibilities
//! - Hold the unconsumed path segments of one request
//! - Bind rule variables against those segments
//! - Shift consumed segments off the front on consuming matches
//! - Track parameters bound across the whole handler chain
//!
//! # Design Decisions
//! - One cursor per request, owned by the dispatch context and never shared
//! - `bind` is a pure probe; `match_pattern` is the only mutating match
//! - "Fully parsed" counts segments a pattern looked at without shifting

use std::collections::VecDeque;

use axum::http::Method;

use crate::http::request::HttpRequest;
use crate::routing::params::Params;
use crate::routing::pattern::{Pattern, Segment};

/// The remaining (unconsumed) part of a request URL plus bound parameters.
#[derive(Debug, Clone)]
pub struct RequestCursor {
    segments: VecDeque<String>,
    extension: Option<String>,
    method: Method,
    all_params: Params,
    latest_params: Params,
    route_params: Params,
    unshifted_but_parsed: usize,
}

impl RequestCursor {
    pub fn new<I, S>(method: Method, segments: I, extension: Option<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
            extension,
            method,
            all_params: Params::new(),
            latest_params: Params::new(),
            route_params: Params::new(),
            unshifted_but_parsed: 0,
        }
    }

    /// Cursor positioned at the start of the request's URL.
    pub fn from_request(request: &HttpRequest) -> Self {
        Self::new(
            request.method().clone(),
            request.segments(),
            request.extension().map(str::to_string),
        )
    }

    /// Bind `pattern` against the current position without changing any
    /// state.
    pub fn bind(&self, pattern: &Pattern) -> Option<Params> {
        if let Some(required) = pattern.method() {
            if *required != self.method {
                return None;
            }
        }

        // Root URL special case
        if pattern.is_empty() {
            return self.segments.is_empty().then(Params::new);
        }

        let mut bound = Params::new();
        for (i, spec) in pattern.segments().iter().enumerate() {
            let part = self.segments.get(i);
            match spec {
                Segment::Variable { name, required } => {
                    if *required && part.is_none() {
                        return None;
                    }
                    bound.insert(name.as_str(), part.cloned());
                }
                Segment::Literal(text) => {
                    if self.matches_with_extension(part, text) {
                        continue;
                    }
                    if part != Some(text) {
                        return None;
                    }
                }
            }
        }
        Some(bound)
    }

    /// Match `pattern` at the current position.
    ///
    /// On success the latest parameters are replaced by the new bindings and
    /// sticky-merged into the request-wide set. With `consume`, the
    /// pattern's shift count is taken off the front of the cursor.
    pub fn match_pattern(&mut self, pattern: &Pattern, consume: bool) -> Option<Params> {
        let bound = self.bind(pattern)?;
        if !pattern.is_empty() {
            self.commit(pattern, &bound, consume);
        }
        Some(bound)
    }

    /// Apply bindings previously produced by [`bind`](Self::bind).
    pub(crate) fn commit(&mut self, pattern: &Pattern, bound: &Params, consume: bool) {
        if consume {
            self.shift(pattern.shift_count());
            self.unshifted_but_parsed = pattern.unshifted_count();
        }
        self.latest_params = bound.clone();
        self.all_params.merge_sticky(bound);
    }

    /// Pop up to `n` leading segments.
    pub fn shift(&mut self, n: usize) -> Vec<String> {
        let n = n.min(self.segments.len());
        self.segments.drain(..n).collect()
    }

    pub fn shift_one(&mut self) -> Option<String> {
        self.segments.pop_front()
    }

    /// True once every remaining segment has been looked at by some pattern.
    pub fn all_parsed(&self) -> bool {
        self.segments.len() <= self.unshifted_but_parsed
    }

    pub fn is_fully_parsed(&self) -> bool {
        self.all_parsed()
    }

    /// True if `pattern` has no content besides its method constraint.
    pub fn is_empty_pattern(&self, pattern: &Pattern) -> bool {
        pattern.is_empty()
    }

    /// Rotate the request-wide parameter values one key to the left.
    ///
    /// The first value is returned; the last key receives the next segment
    /// that was parsed but not shifted, if there is one.
    pub fn shift_all_params(&mut self) -> Option<String> {
        let mut values = self.all_params.values();
        if values.is_empty() {
            return None;
        }
        let first = values.remove(0);
        if let Some(next) = self.segments.get(self.unshifted_but_parsed) {
            values.push(Some(next.clone()));
        }
        self.all_params.set_values(values);
        first
    }

    /// Unconsumed segments joined back into a URL.
    pub fn remaining(&self) -> String {
        self.segments.iter().map(String::as_str).collect::<Vec<_>>().join("/")
    }

    pub fn remaining_segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }

    pub fn unshifted_but_parsed(&self) -> usize {
        self.unshifted_but_parsed
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request-wide parameter, falling back to the matched global rule's
    /// static params.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.all_params
            .get(name)
            .or_else(|| self.route_params.get(name))
    }

    pub fn all_params(&self) -> &Params {
        &self.all_params
    }

    pub fn latest_param(&self, name: &str) -> Option<&str> {
        self.latest_params.get(name)
    }

    pub fn latest_params(&self) -> &Params {
        &self.latest_params
    }

    pub fn route_params(&self) -> &Params {
        &self.route_params
    }

    pub fn set_route_params(&mut self, params: Params) {
        self.route_params = params;
    }

    fn matches_with_extension(&self, part: Option<&String>, literal: &str) -> bool {
        match (part, &self.extension) {
            (Some(part), Some(ext)) => literal == format!("{part}.{ext}"),
            _ => false,
        }
    }
}
