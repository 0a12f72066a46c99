//! Top-level request dispatch.
//!
//! # Responsibilities
//! - Hold the global rule table (atomically swappable on config reload)
//! - Run pre-request filters, route through global rules, run post-request
//!   filters
//! - Turn redirect rules into 302 responses
//! - Instantiate the target handler and normalize its outcome into a
//!   canonical response
//!
//! # Design Decisions
//! - The table is read through `ArcSwap`: lock-free, and a dispatch keeps
//!   the table it started with even if a reload lands mid-request
//! - `HttpError`s become responses here; `DispatchError`s go back to the
//!   transport untouched
//! - Rules without a static controller only match when `$Controller`
//!   names a routable controller, so the next rule gets a chance otherwise

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::http::StatusCode;
use serde::Serialize;
use url::Url;

use crate::config::schema::DispatchConfig;
use crate::dispatch::context::{DispatchContext, Session};
use crate::dispatch::filters::{RequestFilter, RequestProcessor};
use crate::dispatch::render::{JsonRenderer, Renderer};
use crate::error::{DispatchError, HttpError, RegistryError};
use crate::handler::node::Outcome;
use crate::handler::registry::{HandlerRegistry, RegistryBuilder};
use crate::http::request::HttpRequest;
use crate::http::response::Response;
use crate::observability::metrics;
use crate::routing::cursor::RequestCursor;
use crate::routing::matcher::{self, first_match, Rule, RuleMatch};
use crate::routing::params::Params;
use crate::routing::pattern::Pattern;
use crate::security::permission::{GrantedPermissions, PermissionOracle, Principal};

/// What a global rule leads to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleTarget {
    Handler {
        /// Static handler type; a bound `$Controller` takes precedence.
        controller: Option<String>,
        /// Exposed as route params on the cursor.
        params: Params,
        /// Extra segments shifted off after matching.
        pop_tokeniser: usize,
    },
    Redirect(String),
}

impl RuleTarget {
    pub fn controller(name: impl Into<String>) -> Self {
        RuleTarget::Handler {
            controller: Some(name.into()),
            params: Params::new(),
            pop_tokeniser: 0,
        }
    }

    /// Handler type taken from the `$Controller` variable.
    pub fn dynamic() -> Self {
        RuleTarget::Handler {
            controller: None,
            params: Params::new(),
            pop_tokeniser: 0,
        }
    }

    pub fn redirect(target: impl Into<String>) -> Self {
        RuleTarget::Redirect(target.into())
    }
}

/// One entry of the global rule table.
#[derive(Debug, Clone)]
pub struct DirectorRule {
    pattern: Pattern,
    target: RuleTarget,
    controllers: Arc<HashSet<String>>,
}

impl DirectorRule {
    pub fn target(&self) -> &RuleTarget {
        &self.target
    }
}

impl Rule for DirectorRule {
    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn accepts(&self, bound: &Params) -> bool {
        match &self.target {
            RuleTarget::Redirect(_) => true,
            RuleTarget::Handler { controller, .. } => match bound.get("Controller") {
                Some(name) => self.controllers.contains(&name.to_lowercase()),
                None => controller.is_some(),
            },
        }
    }
}

/// Frozen handler registry plus the global rules that lead into it.
#[derive(Debug)]
pub struct RoutingTable {
    registry: Arc<HandlerRegistry>,
    controllers: Arc<HashSet<String>>,
    rules: Vec<DirectorRule>,
    base_url: Option<Url>,
}

impl RoutingTable {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            controllers: Arc::new(registry.routable_controllers()),
            registry: Arc::new(registry),
            rules: Vec::new(),
            base_url: None,
        }
    }

    pub fn base_url(mut self, base: &str) -> Result<Self, RegistryError> {
        let url = Url::parse(base).map_err(|_| RegistryError::BaseUrl(base.to_string()))?;
        self.base_url = Some(url);
        Ok(self)
    }

    /// Append a global rule. Static handler names must be registered.
    pub fn rule(mut self, pattern: &str, target: RuleTarget) -> Result<Self, RegistryError> {
        let pattern = Pattern::parse(pattern)?;
        if let RuleTarget::Handler {
            controller: Some(name),
            ..
        } = &target
        {
            if !self.registry.contains(name) {
                return Err(RegistryError::UnknownController {
                    rule: pattern.as_str().to_string(),
                    controller: name.clone(),
                });
            }
        }
        self.rules.push(DirectorRule {
            pattern,
            target,
            controllers: Arc::clone(&self.controllers),
        });
        Ok(self)
    }

    /// Build the registry from `base` plus the config's handler sections,
    /// then the global rules.
    pub fn from_config(base: &RegistryBuilder, config: &DispatchConfig) -> Result<Self, RegistryError> {
        let mut builder = base.clone();
        builder.require_allowed_actions(config.director.require_allowed_actions);
        builder.apply_config(&config.handlers)?;

        let mut table = Self::new(builder.build()?);
        if let Some(base_url) = &config.director.base_url {
            table = table.base_url(base_url)?;
        }
        for rule in &config.director.rules {
            let target = match &rule.redirect {
                Some(redirect) => RuleTarget::Redirect(redirect.clone()),
                None => RuleTarget::Handler {
                    controller: rule.controller.clone(),
                    params: rule
                        .params
                        .iter()
                        .map(|(k, v)| (k.as_str(), Some(v.as_str())))
                        .collect(),
                    pop_tokeniser: rule.pop_tokeniser,
                },
            };
            table = table.rule(&rule.pattern, target)?;
        }
        tracing::info!(
            rules = table.rules.len(),
            handlers = table.registry.len(),
            "Routing table built"
        );
        Ok(table)
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn rules(&self) -> &[DirectorRule] {
        &self.rules
    }

    /// The global rule `request` would be routed through, without
    /// dispatching it.
    pub fn probe(&self, request: &HttpRequest) -> Option<RuleMatch<'_, DirectorRule>> {
        let cursor = RequestCursor::from_request(request);
        matcher::probe(&self.rules, &cursor)
    }

    /// Resolve a redirect target against the base URL.
    pub fn absolute_url(&self, target: &str) -> String {
        if Url::parse(target).is_ok() {
            return target.to_string();
        }
        match self.base_url.as_ref().map(|base| base.join(target)) {
            Some(Ok(url)) => url.to_string(),
            _ => target.to_string(),
        }
    }
}

/// Result of one dispatch.
#[derive(Debug)]
pub struct Dispatched {
    /// `None` when a post-request filter suppressed output.
    pub response: Option<Response>,
    pub session: Session,
}

/// Entry point for every request.
#[derive(Debug)]
pub struct Director {
    table: ArcSwap<RoutingTable>,
    base: RegistryBuilder,
    processor: RequestProcessor,
    permissions: Arc<dyn PermissionOracle>,
    renderer: Arc<dyn Renderer>,
}

impl Director {
    pub fn new(table: RoutingTable) -> Self {
        Self {
            table: ArcSwap::from_pointee(table),
            base: RegistryBuilder::with_builtins(),
            processor: RequestProcessor::new(),
            permissions: Arc::new(GrantedPermissions),
            renderer: Arc::new(JsonRenderer),
        }
    }

    /// A director whose table is rebuilt from `base` on every reload.
    pub fn from_config(base: RegistryBuilder, config: &DispatchConfig) -> Result<Self, RegistryError> {
        let table = RoutingTable::from_config(&base, config)?;
        let mut director = Self::new(table);
        director.base = base;
        Ok(director)
    }

    pub fn with_filter(mut self, filter: Arc<dyn RequestFilter>) -> Self {
        self.processor.push(filter);
        self
    }

    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionOracle>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn table(&self) -> Arc<RoutingTable> {
        self.table.load_full()
    }

    /// Rebuild the table from `config` and swap it in. The old table stays
    /// active if the new one fails to build.
    pub fn reload(&self, config: &DispatchConfig) -> Result<(), RegistryError> {
        let result = RoutingTable::from_config(&self.base, config);
        metrics::record_reload(result.is_ok());
        let table = result?;
        self.table.store(Arc::new(table));
        tracing::info!("Routing table reloaded");
        Ok(())
    }

    pub fn dispatch(
        &self,
        request: HttpRequest,
        mut session: Session,
        principal: Option<Principal>,
    ) -> Result<Dispatched, DispatchError> {
        let start = Instant::now();
        let span = tracing::info_span!("dispatch", method = %request.method(), url = %request.path());
        let _guard = span.enter();

        if !self.processor.pre_request(&request, &mut session) {
            tracing::info!("Request rejected by pre-request filter");
            metrics::record_dispatch(400, start);
            return Ok(Dispatched {
                response: Some(HttpError::bad_request("Invalid request").into_response()),
                session,
            });
        }

        let table = self.table.load_full();
        let mut ctx = DispatchContext::new(
            request,
            session,
            principal,
            Arc::clone(&self.permissions),
            Arc::clone(&self.renderer),
            Arc::clone(table.registry()),
        );

        let response = match self.route(&table, &mut ctx)? {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(status = err.status().as_u16(), message = %err.message(), "Request ended with an HTTP error");
                err.into_response()
            }
        };
        if let Some(fault) = ctx.take_stack_fault() {
            metrics::record_dispatch(500, start);
            return Err(fault.into());
        }

        let keep = self.processor.post_request(ctx.request(), &response);
        let session = ctx.into_session();
        let status = if keep { response.status().as_u16() } else { 0 };
        metrics::record_dispatch(status, start);
        tracing::info!(
            status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request dispatched"
        );

        Ok(Dispatched {
            response: keep.then_some(response),
            session,
        })
    }

    fn route(
        &self,
        table: &RoutingTable,
        ctx: &mut DispatchContext,
    ) -> Result<Result<Response, HttpError>, DispatchError> {
        let Some(matched) = first_match(table.rules(), ctx.cursor_mut()) else {
            tracing::debug!("No global rule matched");
            return Ok(Err(HttpError::not_found("No URL rule was matched")));
        };
        let rule = matched.rule;
        metrics::record_rule_match(rule.pattern().as_str());

        let (controller, params, pop_tokeniser) = match rule.target() {
            RuleTarget::Redirect(target) => {
                let location = table.absolute_url(target);
                tracing::debug!(rule = %rule.pattern(), location = %location, "Redirect rule matched");
                return Ok(Ok(Response::redirect(&location, StatusCode::FOUND)));
            }
            RuleTarget::Handler {
                controller,
                params,
                pop_tokeniser,
            } => (controller, params, *pop_tokeniser),
        };

        ctx.cursor_mut().set_route_params(params.clone());
        if pop_tokeniser > 0 {
            ctx.cursor_mut().shift(pop_tokeniser);
        }

        let name = matched
            .params
            .get("Controller")
            .or(controller.as_deref())
            .ok_or_else(|| DispatchError::MissingHandler(rule.pattern().to_string()))?;
        let node = table
            .registry()
            .instantiate(name)
            .ok_or_else(|| DispatchError::UnknownHandler(name.to_string()))?;
        tracing::debug!(rule = %rule.pattern(), handler = %node.name(), "Global rule matched");

        Ok(node
            .handle_request(ctx)
            .map(|outcome| self.normalize(outcome)))
    }

    /// Canonical response for whatever the handler chain produced.
    fn normalize(&self, outcome: Outcome) -> Response {
        match outcome {
            Outcome::Response(response) => response,
            Outcome::Body(body) => Response::ok(body),
            Outcome::Data(data) => {
                let mut response = Response::default();
                self.renderer.render_data(&data, &mut response);
                response
            }
            Outcome::Handler(node) => {
                let mut response = Response::default();
                self.renderer.render(&node, &mut response);
                response
            }
            Outcome::Render => Response::default(),
        }
    }
}
