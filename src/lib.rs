//! URL routing and request dispatch.
//!
//! An incoming request is matched against a global rule table, handed to a
//! handler node, and from there progressively routed through nested
//! handlers, each consuming ("shifting") the URL segments it understands.
//!
//! ```text
//!                 ┌─────────────────────────────────────────────────┐
//!   HttpRequest   │  dispatch::Director                             │
//!   ─────────────▶│    pre-request filters                          │
//!                 │    global rules ──redirect──▶ 302               │
//!                 │        │                                        │
//!                 │        ▼                                        │
//!                 │    handler::HandlerNode ──▶ action ──▶ Outcome  │
//!                 │        │  delegate                              │
//!                 │        ▼                                        │
//!                 │    handler::HandlerNode ──▶ ...                 │
//!                 │    post-request filters                         │
//!   Response  ◀───│    normalize / render                           │
//!                 └─────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod http;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::schema::DispatchConfig;
pub use dispatch::{Director, Dispatched, RoutingTable, RuleTarget, Session};
pub use error::{DispatchError, HttpError, PatternError, RegistryError};
pub use handler::{HandlerNode, HandlerType, Outcome, RegistryBuilder};
pub use http::{DispatchServer, HttpRequest, Response};
