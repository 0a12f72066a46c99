//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Rule strings (at startup):
//!     "$Action//$ID/$OtherID"
//!     → pattern.rs (parse into segments + shift point)
//!     → frozen into immutable rule tables
//!
//! Per request:
//!     URL segments
//!     → cursor.rs (remaining segments, bound params)
//!     → matcher.rs (first matching rule, consume segments)
//!     → handler layer continues with what is left
//! ```
//!
//! # Design Decisions
//! - Rules compiled at startup, immutable at runtime
//! - No regex in the hot path (segment-wise comparison)
//! - Deterministic: same input always matches same rule
//! - First match wins (table order)

pub mod cursor;
pub mod matcher;
pub mod params;
pub mod pattern;

pub use cursor::RequestCursor;
pub use matcher::{first_match, probe, Rule, RuleMatch};
pub use params::Params;
pub use pattern::{Pattern, Segment};
