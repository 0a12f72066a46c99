//! Per-request dispatch state.
//!
//! Everything a handler chain may touch while serving one request lives
//! here: the immutable request, the mutable cursor, the session, the
//! principal and the controller stack. A context is created by the
//! director for exactly one request and dropped once the response is
//! final.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::dispatch::render::Renderer;
use crate::error::StackError;
use crate::handler::node::HandlerNode;
use crate::handler::registry::HandlerRegistry;
use crate::handler::stack::ControllerStack;
use crate::http::request::HttpRequest;
use crate::routing::cursor::RequestCursor;
use crate::security::permission::{PermissionOracle, Principal};

/// Opaque per-request key-value store.
///
/// The dispatch core passes it through untouched; persisting it is the
/// host's job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    data: Map<String, Value>,
    changed: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: Map<String, Value>) -> Self {
        Self {
            data,
            changed: false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
        self.changed = true;
    }

    pub fn clear(&mut self, key: &str) -> Option<Value> {
        let old = self.data.remove(key);
        self.changed |= old.is_some();
        old
    }

    /// True if anything was written during this request.
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn into_data(self) -> Map<String, Value> {
        self.data
    }
}

pub struct DispatchContext {
    request: HttpRequest,
    cursor: RequestCursor,
    session: Session,
    principal: Option<Principal>,
    permissions: Arc<dyn PermissionOracle>,
    renderer: Arc<dyn Renderer>,
    registry: Arc<HandlerRegistry>,
    stack: ControllerStack,
    stack_fault: Option<StackError>,
}

impl DispatchContext {
    pub fn new(
        request: HttpRequest,
        session: Session,
        principal: Option<Principal>,
        permissions: Arc<dyn PermissionOracle>,
        renderer: Arc<dyn Renderer>,
        registry: Arc<HandlerRegistry>,
    ) -> Self {
        Self {
            cursor: RequestCursor::from_request(&request),
            request,
            session,
            principal,
            permissions,
            renderer,
            registry,
            stack: ControllerStack::default(),
            stack_fault: None,
        }
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn cursor(&self) -> &RequestCursor {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut RequestCursor {
        &mut self.cursor
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Ask the permission oracle about the current principal.
    pub fn check_permission(&self, code: &str) -> bool {
        self.permissions
            .check_permission(code, self.principal.as_ref())
    }

    pub fn renderer(&self) -> Arc<dyn Renderer> {
        Arc::clone(&self.renderer)
    }

    /// A fresh node of a registered handler type, for actions that
    /// delegate to a sub-handler.
    pub fn instantiate(&self, handler: &str) -> Option<HandlerNode> {
        self.registry.instantiate(handler)
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn controller_stack(&self) -> &ControllerStack {
        &self.stack
    }

    pub(crate) fn controller_stack_mut(&mut self) -> &mut ControllerStack {
        &mut self.stack
    }

    /// Name of the most recently entered controller still running.
    pub fn current_controller(&self) -> Option<&str> {
        self.stack.current()
    }

    /// Keep the first unbalanced push/pop seen during this dispatch.
    pub(crate) fn record_stack_fault(&mut self, err: StackError) {
        self.stack_fault.get_or_insert(err);
    }

    pub fn take_stack_fault(&mut self) -> Option<StackError> {
        self.stack_fault.take()
    }

    pub fn into_session(self) -> Session {
        self.session
    }
}

impl std::fmt::Debug for DispatchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchContext")
            .field("method", self.request.method())
            .field("url", &self.request.path())
            .field("remaining", &self.cursor.remaining())
            .field("stack", &self.stack)
            .finish_non_exhaustive()
    }
}
