//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! dispatcher. All types derive Serde traits for deserialization from
//! config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::handler::access::{AllowList, Permission};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Listener and transport settings.
    pub server: ServerConfig,

    /// Global rule table and director options.
    pub director: DirectorConfig,

    /// Handler types declared or overridden by configuration, by name.
    pub handlers: BTreeMap<String, HandlerConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Largest request body read into memory.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Director configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct DirectorConfig {
    /// Absolute base for redirect rules, e.g. "https://example.com/".
    pub base_url: Option<String>,

    /// Deny actions on handler types that declare no allow-list.
    pub require_allowed_actions: bool,

    /// Global rules, evaluated in order.
    pub rules: Vec<RuleConfig>,
}

/// One global rule.
///
/// Exactly one of `controller` and `redirect` may be set. With neither,
/// the handler type comes from the `$Controller` variable of the pattern.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RuleConfig {
    pub pattern: String,

    /// Handler type to instantiate.
    pub controller: Option<String>,

    /// Redirect target, relative to `director.base_url`.
    pub redirect: Option<String>,

    /// Static params visible through `RequestCursor::param`.
    pub params: BTreeMap<String, String>,

    /// Segments shifted off after the rule matched.
    pub pop_tokeniser: usize,
}

/// A configured handler type.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct HandlerConfig {
    /// Parent type. Required when the name is not already registered.
    pub extends: Option<String>,

    /// Replaces the type's own url handlers when present.
    pub url_handlers: Option<Vec<UrlHandlerConfig>>,

    /// Replaces the type's own allow-list when present.
    pub allowed_actions: Option<AllowedActionsConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct UrlHandlerConfig {
    pub rule: String,
    pub action: String,
}

/// Allow-list as written in config: either a list of action names or a
/// table of action to permission.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum AllowedActionsConfig {
    List(Vec<String>),
    Map(BTreeMap<String, PermissionValue>),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum PermissionValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<&PermissionValue> for Permission {
    fn from(value: &PermissionValue) -> Self {
        match value {
            PermissionValue::Bool(allowed) => Permission::from(*allowed),
            PermissionValue::Int(n) => Permission::from(*n != 0),
            PermissionValue::Text(text) => Permission::parse(text),
        }
    }
}

impl From<&AllowedActionsConfig> for AllowList {
    fn from(config: &AllowedActionsConfig) -> Self {
        match config {
            AllowedActionsConfig::List(names) => AllowList::from_names(names),
            AllowedActionsConfig::Map(entries) => {
                let mut list = AllowList::new();
                for (action, value) in entries {
                    list.insert(action, Permission::from(value));
                }
                list
            }
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
