//! Handler nodes and the per-node routing state machine.
//!
//! # Data Flow
//! ```text
//! handle_request(node, ctx)
//!     │
//!     ├─ Controller: push stack → init hooks → (finished? return response)
//!     │
//!     ▼
//! route: first matching url handler (own rules, then ancestors')
//!     │  none → Render ("this node")
//!     ▼
//! resolve action ($Var or literal, default "index")
//!     │  unknown → 404, not allowed → 403
//!     ▼
//! invoke action
//!     │  error response → short-circuit
//!     ├─ Handler(next) and rule made progress → next.handle_request(ctx)
//!     ├─ cursor fully parsed → outcome as-is
//!     └─ otherwise → 404 (unparsed trailing segments)
//! ```
//!
//! # Design Decisions
//! - Errors are values: every step returns `Result<Outcome, HttpError>` and
//!   the first `Err` unwinds the whole chain
//! - A delegate reached through an empty (method-only) rule is returned,
//!   never re-entered
//! - Controllers always answer with a response of their own; plain request
//!   handlers hand raw outcomes back to their caller

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{Map, Value};

use crate::dispatch::context::DispatchContext;
use crate::dispatch::render::Renderer;
use crate::error::HttpError;
use crate::handler::access::{self, Permission};
use crate::handler::registry::{ActionRef, HandlerKind, ResolvedHandler};
use crate::http::response::Response;
use crate::routing::matcher::{first_match, Rule};
use crate::routing::params::Params;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one node instance, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Structured data handed to a renderer.
pub type ViewData = Map<String, Value>;

/// What an action, or a whole node, produced.
#[derive(Debug)]
pub enum Outcome {
    Response(Response),
    Body(String),
    Data(ViewData),
    /// A further handler to delegate the rest of the URL to.
    Handler(Box<HandlerNode>),
    /// The node that produced this outcome, to be rendered as-is.
    Render,
}

impl Outcome {
    pub fn body(body: impl Into<String>) -> Self {
        Outcome::Body(body.into())
    }

    pub fn handler(node: HandlerNode) -> Self {
        Outcome::Handler(Box::new(node))
    }
}

/// One instance of a handler type, alive for one request.
pub struct HandlerNode {
    id: NodeId,
    handler: Arc<ResolvedHandler>,
    view: ViewData,
    url_params: Params,
    action: Option<String>,
    response: Response,
}

impl HandlerNode {
    pub fn new(handler: Arc<ResolvedHandler>) -> Self {
        Self {
            id: NodeId::next(),
            handler,
            view: ViewData::new(),
            url_params: Params::new(),
            action: None,
            response: Response::default(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.handler.name()
    }

    pub fn kind(&self) -> HandlerKind {
        self.handler.kind()
    }

    pub fn handler_type(&self) -> &ResolvedHandler {
        &self.handler
    }

    pub fn is_instance_of(&self, name: &str) -> bool {
        self.handler.is_subclass_of(name)
    }

    /// Action currently being handled. Only controllers record it.
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    /// Parameters seen by this controller, sticky-merged per action.
    pub fn url_params(&self) -> &Params {
        &self.url_params
    }

    pub fn url_param(&self, name: &str) -> Option<&str> {
        self.url_params.get(name)
    }

    pub fn view(&self) -> &ViewData {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewData {
        &mut self.view
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.view.insert(key.into(), value.into());
    }

    /// Merge `data` into this node's view; later keys win.
    pub fn customise(&mut self, data: ViewData) {
        self.view.extend(data);
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Turn this node's response into a 302 to `location`.
    pub fn redirect(&mut self, location: &str) -> Outcome {
        self.response = Response::redirect(location, StatusCode::FOUND);
        Outcome::Response(self.response.clone())
    }

    /// Handle the remainder of the request held by `ctx`.
    pub fn handle_request(mut self, ctx: &mut DispatchContext) -> Result<Outcome, HttpError> {
        match self.kind() {
            HandlerKind::RequestHandler => match self.route(ctx)? {
                Outcome::Render => Ok(Outcome::Handler(Box::new(self))),
                other => Ok(other),
            },
            HandlerKind::Controller => {
                ctx.controller_stack_mut().push(self.id, self.name());
                let result = self.run_controller(ctx);
                if let Err(err) = ctx.controller_stack_mut().pop(self.id, self.name()) {
                    tracing::error!(error = %err, "Controller stack out of balance");
                    ctx.record_stack_fault(err);
                }
                result
            }
        }
    }

    fn run_controller(&mut self, ctx: &mut DispatchContext) -> Result<Outcome, HttpError> {
        self.url_params = ctx.cursor().all_params().clone();
        self.response = Response::default();

        let handler = Arc::clone(&self.handler);
        for init in handler.inits() {
            init(self, ctx)?;
        }
        if self.response.is_finished() {
            tracing::debug!(
                handler = %self.name(),
                status = self.response.status().as_u16(),
                "Init finished the response"
            );
            return Ok(Outcome::Response(mem::take(&mut self.response)));
        }

        let renderer = ctx.renderer();
        match self.route(ctx)? {
            Outcome::Response(response) => self.response = response,
            Outcome::Body(body) => self.response.set_body(body),
            Outcome::Data(data) => {
                self.customise(data);
                self.render_self(renderer.as_ref());
            }
            Outcome::Handler(node) => renderer.render(&node, &mut self.response),
            Outcome::Render => self.render_self(renderer.as_ref()),
        }
        Ok(Outcome::Response(mem::take(&mut self.response)))
    }

    fn render_self(&mut self, renderer: &dyn Renderer) {
        let mut response = mem::take(&mut self.response);
        renderer.render(self, &mut response);
        self.response = response;
    }

    /// Match this node's rule table and run the selected action.
    pub(crate) fn route(&mut self, ctx: &mut DispatchContext) -> Result<Outcome, HttpError> {
        let handler = Arc::clone(&self.handler);
        let Some(matched) = first_match(handler.rules(), ctx.cursor_mut()) else {
            tracing::debug!(
                handler = %self.name(),
                remaining = %ctx.cursor().remaining(),
                "No url handler matched"
            );
            return Ok(Outcome::Render);
        };
        let rule = matched.rule;
        let action = resolve_action(rule.action(), &matched.params);
        tracing::debug!(handler = %self.name(), rule = %rule.pattern(), action = %action, "Action resolved");

        if !self.has_action(&action) {
            tracing::debug!(handler = %self.name(), action = %action, "Action not available");
            return Err(HttpError::not_found(format!(
                "Action '{action}' isn't available on class {}.",
                self.name()
            )));
        }
        if !self.check_access_action(&action, ctx) {
            tracing::warn!(handler = %self.name(), action = %action, "Action not allowed");
            return Err(HttpError::forbidden(format!(
                "Action '{action}' isn't allowed on class {}.",
                self.name()
            )));
        }

        let result = match self.handle_action(&action, ctx)? {
            Outcome::Response(response) if response.is_error() => return Err(response.into()),
            other => other,
        };

        match result {
            Outcome::Handler(next) if !ctx.cursor().is_empty_pattern(rule.pattern()) => {
                tracing::debug!(from = %self.name(), to = %next.name(), "Delegating to sub-handler");
                match next.handle_request(ctx)? {
                    Outcome::Data(data) => {
                        self.customise(data);
                        Ok(Outcome::Render)
                    }
                    other => Ok(other),
                }
            }
            result if ctx.cursor().all_parsed() => Ok(result),
            _ => {
                tracing::debug!(
                    handler = %self.name(),
                    remaining = %ctx.cursor().remaining(),
                    "Unparsed trailing segments"
                );
                Err(HttpError::not_found(format!(
                    "I can't handle sub-URLs of this {} object.",
                    self.name()
                )))
            }
        }
    }

    /// `index` always exists; anything else must be registered.
    pub fn has_action(&self, action: &str) -> bool {
        if access::is_reserved(action) {
            return false;
        }
        action.eq_ignore_ascii_case("index") || self.handler.action(action).is_some()
    }

    pub fn check_access_action(&self, action: &str, ctx: &DispatchContext) -> bool {
        let handler = &self.handler;
        access::check_access_action(
            action,
            handler.allowed_actions(),
            handler.require_allowed_actions(),
            |permission| match permission {
                Permission::Allow => true,
                Permission::Deny => false,
                Permission::Code(code) => ctx.check_permission(code),
                Permission::Predicate(name) => match handler.predicate(name) {
                    Some(predicate) => predicate(self, ctx),
                    None => {
                        tracing::warn!(handler = %handler.name(), predicate = %name, "Unknown access predicate");
                        false
                    }
                },
            },
        )
    }

    fn handle_action(&mut self, action: &str, ctx: &mut DispatchContext) -> Result<Outcome, HttpError> {
        let is_controller = self.kind() == HandlerKind::Controller;
        if is_controller {
            self.url_params.merge_sticky(ctx.cursor().latest_params());
            self.action = Some(action.to_string());
        }

        let Some(callback) = self.handler.action(action).cloned() else {
            if is_controller {
                return Ok(Outcome::Render);
            }
            return Err(HttpError::not_found(format!(
                "Action '{action}' isn't available on class {}.",
                self.name()
            )));
        };

        match callback(self, ctx)? {
            Outcome::Data(data) if is_controller => {
                self.customise(data);
                Ok(Outcome::Render)
            }
            other => Ok(other),
        }
    }
}

fn resolve_action(action: &ActionRef, bound: &Params) -> String {
    let resolved = match action {
        ActionRef::Named(name) => name.as_str(),
        ActionRef::Param(param) => bound.get(param).unwrap_or_default(),
    }
    .replace('-', "_");
    if resolved.is_empty() {
        "index".to_string()
    } else {
        resolved
    }
}

impl fmt::Debug for HandlerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerNode")
            .field("id", &self.id)
            .field("handler", &self.handler.name())
            .field("action", &self.action)
            .field("url_params", &self.url_params)
            .finish_non_exhaustive()
    }
}
