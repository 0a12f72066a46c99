//! Handler types and nodes.
//!
//! # Responsibilities
//! - Register handler types with their rule tables, actions and allow-lists
//! - Resolve inherited rule tables once, at startup
//! - Run the per-node routing state machine for each request
//! - Gate actions through allow-lists and permission codes
//!
//! # Data Flow
//! ```text
//! RegistryBuilder ──build──▶ HandlerRegistry ──instantiate──▶ HandlerNode
//!                                                               │
//!                                     DispatchContext ◀──handle_request
//! ```

pub mod access;
pub mod builtin;
pub mod node;
pub mod registry;
pub mod stack;

pub use access::{check_access_action, AllowList, Permission};
pub use node::{HandlerNode, NodeId, Outcome, ViewData};
pub use registry::{
    ActionRef, HandlerKind, HandlerRegistry, HandlerType, RegistryBuilder, ResolvedHandler,
    UrlHandler,
};
pub use stack::ControllerStack;
