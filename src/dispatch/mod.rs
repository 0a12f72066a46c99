//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! HttpRequest
//!     → filters.rs (pre-request hooks; veto → 400)
//!     → director.rs (global rules: redirect, or pick a handler type)
//!     → handler::HandlerNode::handle_request (nested routing)
//!     → director.rs (normalize outcome, render via render.rs)
//!     → filters.rs (post-request hooks; veto → no output)
//!     → Dispatched { response, session }
//! ```
//!
//! # Design Decisions
//! - One `DispatchContext` per request, owned by one thread for the
//!   duration of the dispatch
//! - The global rule table is shared read-only and swapped on reload

pub mod context;
pub mod director;
pub mod filters;
pub mod render;

pub use context::{DispatchContext, Session};
pub use director::{Director, DirectorRule, Dispatched, RoutingTable, RuleTarget};
pub use filters::{RequestFilter, RequestProcessor};
pub use render::{JsonRenderer, Renderer};
