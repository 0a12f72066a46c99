//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Handler action selected:
//!     → handler/access.rs (allow-list lookup)
//!     → permission.rs (permission code check against the principal)
//!     → allow, or 403 with a plain-text body
//! ```
//!
//! # Design Decisions
//! - Fail closed: unknown predicates and anonymous principals are denied
//! - No trust in client input: the principal is supplied by the host,
//!   never read from the request by the core

pub mod permission;

pub use permission::{GrantedPermissions, PermissionOracle, Principal, ADMIN_CODE};
