//! Routing rule parsing.
//!
//! # Rule grammar
//! ```text
//! rule        := [method ' '+]? segment ('/' segment)*
//! method      := [A-Za-z]+
//! variable    := '$' name ['!']        ; '!' = required
//! literal     := any text without leading '$'
//! shiftmarker := '//'                  ; at most once
//! ```
//!
//! # Design Decisions
//! - Parsed once at startup, immutable afterwards
//! - Parsing only fails on malformed input; whether a request matches is
//!   the cursor's concern
//! - Empty parts from leading/trailing slashes are dropped

use std::fmt;
use std::str::FromStr;

use axum::http::Method;

use crate::error::PatternError;

/// One component of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the request segment, or `segment.extension`.
    Literal(String),
    /// Binds the request segment at this position.
    Variable { name: String, required: bool },
}

/// A parsed routing rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    method: Option<Method>,
    segments: Vec<Segment>,
    shift_count: usize,
}

impl Pattern {
    pub fn parse(rule: &str) -> Result<Self, PatternError> {
        let (method, body) = split_method(rule);
        let malformed = |reason: &'static str| PatternError::Malformed {
            rule: rule.to_string(),
            reason,
        };

        if body.contains("///") {
            return Err(malformed("'///' is not a valid shift marker"));
        }
        if body.matches("//").count() > 1 {
            return Err(malformed("more than one '//' shift marker"));
        }

        let marker_shift = body
            .find("//")
            .map(|at| body[..at].matches('/').count() + 1);

        let mut segments = Vec::new();
        for part in body.replace("//", "/").split('/') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            segments.push(parse_segment(rule, part)?);
        }

        let shift_count = marker_shift.unwrap_or(segments.len());
        let method = method
            .map(|m| Method::from_bytes(m.to_ascii_uppercase().as_bytes()))
            .transpose()
            .map_err(|_| malformed("invalid method token"))?;

        Ok(Self {
            source: rule.to_string(),
            method,
            segments,
            shift_count,
        })
    }

    /// The rule string this pattern was parsed from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segments consumed by a successful consuming match.
    pub fn shift_count(&self) -> usize {
        self.shift_count
    }

    /// Segments looked at but left on the cursor by a consuming match.
    pub fn unshifted_count(&self) -> usize {
        self.segments.len().saturating_sub(self.shift_count)
    }

    /// True when nothing but an optional method constraint remains.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl FromStr for Pattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pattern::parse(s)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Split a leading `"METHOD "` token off the rule.
fn split_method(rule: &str) -> (Option<&str>, &str) {
    if let Some((head, rest)) = rule.split_once(' ') {
        if !head.is_empty() && head.bytes().all(|b| b.is_ascii_alphabetic()) {
            return (Some(head), rest.trim_start_matches(' '));
        }
    }
    (None, rule)
}

fn parse_segment(rule: &str, part: &str) -> Result<Segment, PatternError> {
    let Some(var) = part.strip_prefix('$') else {
        return Ok(Segment::Literal(part.to_string()));
    };

    let (name, required) = match var.strip_suffix('!') {
        Some(name) => (name, true),
        None => (var, false),
    };

    if name.is_empty() {
        return Err(PatternError::Malformed {
            rule: rule.to_string(),
            reason: "variable without a name",
        });
    }
    if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return Err(PatternError::InvalidVariable {
            rule: rule.to_string(),
            name: name.to_string(),
        });
    }

    Ok(Segment::Variable {
        name: name.to_string(),
        required,
    })
}
