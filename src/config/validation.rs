//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check every rule string parses
//! - Check rule targets are unambiguous
//! - Validate addresses, URLs and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: DispatchConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - Whether handler names resolve is left to the registry build, which
//!   also knows about code-registered types

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::DispatchConfig;
use crate::routing::pattern::{Pattern, Segment};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &DispatchConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "server.request_timeout_secs",
            "must be greater than zero",
        ));
    }

    if let Some(base) = &config.director.base_url {
        if url::Url::parse(base).is_err() {
            errors.push(ValidationError::new(
                "director.base_url",
                format!("'{base}' is not an absolute URL"),
            ));
        }
    }

    for (i, rule) in config.director.rules.iter().enumerate() {
        let field = format!("director.rules[{i}]");
        let pattern = match Pattern::parse(&rule.pattern) {
            Ok(pattern) => pattern,
            Err(e) => {
                errors.push(ValidationError::new(field, e.to_string()));
                continue;
            }
        };
        match (&rule.controller, &rule.redirect) {
            (Some(_), Some(_)) => errors.push(ValidationError::new(
                field,
                "sets both 'controller' and 'redirect'",
            )),
            (None, None) if !binds_controller(&pattern) => errors.push(ValidationError::new(
                field,
                "names no controller and has no $Controller variable",
            )),
            _ => {}
        }
    }

    for (name, handler) in &config.handlers {
        for (i, url_handler) in handler.url_handlers.iter().flatten().enumerate() {
            if let Err(e) = Pattern::parse(&url_handler.rule) {
                errors.push(ValidationError::new(
                    format!("handlers.{name}.url_handlers[{i}]"),
                    e.to_string(),
                ));
            }
        }
    }

    let level = config.observability.log_level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", config.observability.log_level),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "'{}' is not a socket address",
                config.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn binds_controller(pattern: &Pattern) -> bool {
    pattern
        .segments()
        .iter()
        .any(|s| matches!(s, Segment::Variable { name, .. } if name == "Controller"))
}
