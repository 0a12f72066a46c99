//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DispatchConfig (validated, immutable)
//!     → Director builds a RoutingTable from it
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → Director::reload swaps the RoutingTable atomically
//!     → in-flight requests finish on the table they started with
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AllowedActionsConfig, DirectorConfig, DispatchConfig, HandlerConfig, LogFormat,
    ObservabilityConfig, RuleConfig, ServerConfig, UrlHandlerConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
