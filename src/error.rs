//! Error types.
//!
//! Two families live here:
//! - [`HttpError`]: the recoverable path. Carries a finished response
//!   (403, 404, ...) and is threaded through every `handle_request` as the
//!   `Err` side of a `Result`.
//! - Everything else: startup failures (bad rules, bad registry, bad
//!   config) and fatal request errors that the core hands back to the
//!   transport untouched.

use axum::http::StatusCode;
use thiserror::Error;

use crate::http::response::Response;

/// A rule string that cannot be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("malformed rule '{rule}': {reason}")]
    Malformed { rule: String, reason: &'static str },

    #[error("invalid variable name '{name}' in rule '{rule}'")]
    InvalidVariable { rule: String, name: String },
}

/// An error response raised as control flow.
///
/// Bodies are plain text so security-relevant failures never leak
/// rendered content.
#[derive(Debug, Clone, Error)]
#[error("HTTP {}: {message}", response.status().as_u16())]
pub struct HttpError {
    message: String,
    response: Response,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            response: Response::plain_text(status, message.clone()),
            message,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn into_response(self) -> Response {
        self.response
    }
}

impl From<Response> for HttpError {
    fn from(response: Response) -> Self {
        Self {
            message: response.body_text().into_owned(),
            response,
        }
    }
}

/// Fatal request errors. Not turned into responses by the core.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid method override '{0}'")]
    MalformedMethodOverride(String),

    #[error("request path '{0}' is not valid UTF-8 once decoded")]
    MalformedPath(String),

    #[error("handler type '{0}' is not registered")]
    UnknownHandler(String),

    #[error("rule '{0}' matched but names no handler")]
    MissingHandler(String),

    #[error("dispatch task failed: {0}")]
    Task(String),

    #[error("controller stack out of balance: {0}")]
    ControllerStack(#[from] StackError),
}

/// Handler registration problems, found when the registry is frozen.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("handler type '{0}' registered twice")]
    Duplicate(String),

    #[error("handler type '{child}' extends unknown type '{parent}'")]
    UnknownParent { child: String, parent: String },

    #[error("handler type '{0}' is part of an inheritance cycle")]
    Cycle(String),

    #[error("configured handler type '{0}' is not registered and names no parent")]
    MissingParent(String),

    #[error("rule '{rule}' targets unknown handler type '{controller}'")]
    UnknownController { rule: String, controller: String },

    #[error("invalid base URL '{0}'")]
    BaseUrl(String),

    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// Unpaired push/pop on the per-request controller stack.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StackError {
    #[error("popCurrent called on '{0}' with an empty controller stack")]
    Empty(String),

    #[error("popCurrent called on '{popped}' but '{top}' is at the top of the stack")]
    NotOnTop { popped: String, top: String },
}
