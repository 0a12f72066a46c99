//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout)
//!     → request.rs (normalize URL, resolve method override, parse vars)
//!     → dispatch::Director (routing and handlers)
//!     → response.rs (canonical response)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{HttpRequest, HttpRequestBuilder, Vars};
pub use response::Response;
pub use server::{DispatchServer, X_REQUEST_ID};
