//! Handler type registry.
//!
//! # Responsibilities
//! - Collect handler type definitions (rules, allow-lists, actions)
//! - Resolve each type's ancestry once, at startup
//! - Precompute the inherited rule table, merged allow-list and action
//!   table per type
//! - Instantiate fresh nodes per request
//!
//! # Design Decisions
//! - Rule tables are ordered most-derived first, root fallback last
//! - Allow-lists and action tables merge root first, so subclasses override
//! - Type names are case-insensitive
//! - Frozen after `build`; shared read-only between requests

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::config::schema::HandlerConfig;
use crate::dispatch::context::DispatchContext;
use crate::error::{HttpError, PatternError, RegistryError};
use crate::handler::access::{AllowList, Permission};
use crate::handler::node::{HandlerNode, Outcome};
use crate::routing::matcher::Rule;
use crate::routing::pattern::Pattern;

pub type ActionFn =
    Arc<dyn Fn(&mut HandlerNode, &mut DispatchContext) -> Result<Outcome, HttpError> + Send + Sync>;

pub type PredicateFn = Arc<dyn Fn(&HandlerNode, &DispatchContext) -> bool + Send + Sync>;

pub type InitFn =
    Arc<dyn Fn(&mut HandlerNode, &mut DispatchContext) -> Result<(), HttpError> + Send + Sync>;

/// How a node of this type behaves around its routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// Routes and returns raw outcomes.
    RequestHandler,
    /// Additionally runs init hooks, tracks the controller stack and wraps
    /// every outcome into its own response.
    Controller,
}

/// The action half of a url handler rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRef {
    Named(String),
    /// `$Var`: take the action from the variable just bound.
    Param(String),
}

impl ActionRef {
    pub fn parse(action: &str) -> Self {
        match action.strip_prefix('$') {
            Some(param) => ActionRef::Param(param.to_string()),
            None => ActionRef::Named(action.to_string()),
        }
    }
}

impl fmt::Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionRef::Named(name) => f.write_str(name),
            ActionRef::Param(param) => write!(f, "${param}"),
        }
    }
}

/// One `(pattern, action)` entry of a handler's rule table.
#[derive(Debug, Clone)]
pub struct UrlHandler {
    pattern: Pattern,
    action: ActionRef,
}

impl UrlHandler {
    pub fn new(rule: &str, action: &str) -> Result<Self, PatternError> {
        Ok(Self {
            pattern: Pattern::parse(rule)?,
            action: ActionRef::parse(action),
        })
    }

    pub fn action(&self) -> &ActionRef {
        &self.action
    }
}

impl Rule for UrlHandler {
    fn pattern(&self) -> &Pattern {
        &self.pattern
    }
}

/// A handler type definition, as registered.
#[derive(Clone)]
pub struct HandlerType {
    name: String,
    parent: Option<String>,
    kind: Option<HandlerKind>,
    is_abstract: bool,
    url_handlers: Vec<(String, String)>,
    allowed_actions: Option<AllowList>,
    actions: HashMap<String, ActionFn>,
    predicates: HashMap<String, PredicateFn>,
    init: Option<InitFn>,
}

impl HandlerType {
    /// A root type with no ancestors.
    pub fn new(name: impl Into<String>, kind: HandlerKind) -> Self {
        Self {
            name: name.into(),
            parent: None,
            kind: Some(kind),
            is_abstract: false,
            url_handlers: Vec::new(),
            allowed_actions: None,
            actions: HashMap::new(),
            predicates: HashMap::new(),
            init: None,
        }
    }

    /// A type inheriting kind, rules and actions from `parent`.
    pub fn derived(name: impl Into<String>, parent: impl Into<String>) -> Self {
        let mut ty = Self::new(name, HandlerKind::RequestHandler);
        ty.kind = None;
        ty.parent = Some(parent.into());
        ty
    }

    /// A controller extending the built-in `Controller` type.
    pub fn controller(name: impl Into<String>) -> Self {
        Self::derived(name, crate::handler::builtin::CONTROLLER)
    }

    /// A plain handler extending the built-in `RequestHandler` type.
    pub fn request_handler(name: impl Into<String>) -> Self {
        Self::derived(name, crate::handler::builtin::REQUEST_HANDLER)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Never selected through a `$Controller` URL variable.
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn url_handler(mut self, rule: &str, action: &str) -> Self {
        self.url_handlers.push((rule.to_string(), action.to_string()));
        self
    }

    /// Replace this type's own rules.
    pub fn set_url_handlers(&mut self, rules: Vec<(String, String)>) {
        self.url_handlers = rules;
    }

    pub fn allowed_actions(mut self, list: AllowList) -> Self {
        self.allowed_actions = Some(list);
        self
    }

    pub fn set_allowed_actions(&mut self, list: Option<AllowList>) {
        self.allowed_actions = list;
    }

    pub fn allow(mut self, action: &str, permission: Permission) -> Self {
        self.allowed_actions
            .get_or_insert_with(AllowList::new)
            .insert(action, permission);
        self
    }

    pub fn action<F>(mut self, name: &str, action: F) -> Self
    where
        F: Fn(&mut HandlerNode, &mut DispatchContext) -> Result<Outcome, HttpError>
            + Send
            + Sync
            + 'static,
    {
        self.actions.insert(name.to_lowercase(), Arc::new(action));
        self
    }

    pub fn predicate<F>(mut self, name: &str, predicate: F) -> Self
    where
        F: Fn(&HandlerNode, &DispatchContext) -> bool + Send + Sync + 'static,
    {
        self.predicates.insert(name.to_lowercase(), Arc::new(predicate));
        self
    }

    pub fn init<F>(mut self, init: F) -> Self
    where
        F: Fn(&mut HandlerNode, &mut DispatchContext) -> Result<(), HttpError>
            + Send
            + Sync
            + 'static,
    {
        self.init = Some(Arc::new(init));
        self
    }
}

impl fmt::Debug for HandlerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerType")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("kind", &self.kind)
            .field("url_handlers", &self.url_handlers)
            .field("allowed_actions", &self.allowed_actions)
            .field("actions", &sorted_keys(&self.actions))
            .finish_non_exhaustive()
    }
}

/// A handler type with its ancestry flattened.
pub struct ResolvedHandler {
    name: String,
    kind: HandlerKind,
    is_abstract: bool,
    ancestry: Vec<String>,
    rules: Vec<UrlHandler>,
    allowed_actions: Option<AllowList>,
    actions: HashMap<String, ActionFn>,
    predicates: HashMap<String, PredicateFn>,
    inits: Vec<InitFn>,
    require_allowed_actions: bool,
}

impl ResolvedHandler {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Own name first, root last.
    pub fn ancestry(&self) -> &[String] {
        &self.ancestry
    }

    pub fn is_subclass_of(&self, name: &str) -> bool {
        self.ancestry.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    /// Inherited rule table, most-derived first.
    pub fn rules(&self) -> &[UrlHandler] {
        &self.rules
    }

    /// Merged allow-list; `None` if no type in the chain declares one.
    pub fn allowed_actions(&self) -> Option<&AllowList> {
        self.allowed_actions.as_ref()
    }

    pub fn action(&self, name: &str) -> Option<&ActionFn> {
        self.actions.get(&name.to_lowercase())
    }

    pub fn predicate(&self, name: &str) -> Option<&PredicateFn> {
        self.predicates.get(&name.to_lowercase())
    }

    /// Init hooks, root first.
    pub fn inits(&self) -> &[InitFn] {
        &self.inits
    }

    pub fn require_allowed_actions(&self) -> bool {
        self.require_allowed_actions
    }
}

impl fmt::Debug for ResolvedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedHandler")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("ancestry", &self.ancestry)
            .field(
                "rules",
                &self.rules.iter().map(|r| r.pattern.as_str()).collect::<Vec<_>>(),
            )
            .field("actions", &sorted_keys(&self.actions))
            .finish_non_exhaustive()
    }
}

/// Collects handler types before they are frozen.
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    types: Vec<HandlerType>,
    require_allowed_actions: bool,
}

impl RegistryBuilder {
    /// An empty builder, without even the built-in base types.
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder holding `RequestHandler` and `Controller`.
    pub fn with_builtins() -> Self {
        let mut builder = Self::new();
        crate::handler::builtin::register_builtins(&mut builder);
        builder
    }

    pub fn register(&mut self, ty: HandlerType) -> &mut Self {
        self.types.push(ty);
        self
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut HandlerType> {
        self.types
            .iter_mut()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.iter().any(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Apply handler sections from configuration.
    ///
    /// Known types get their own rules and allow-list replaced; unknown
    /// names are registered as new types extending `extends`.
    pub fn apply_config(
        &mut self,
        handlers: &BTreeMap<String, HandlerConfig>,
    ) -> Result<(), RegistryError> {
        for (name, config) in handlers {
            if !self.contains(name) {
                let parent = config
                    .extends
                    .as_deref()
                    .ok_or_else(|| RegistryError::MissingParent(name.clone()))?;
                self.register(HandlerType::derived(name.as_str(), parent));
            }
            let Some(ty) = self.get_mut(name) else {
                continue;
            };
            if let Some(parent) = &config.extends {
                ty.parent = Some(parent.clone());
            }
            if let Some(rules) = &config.url_handlers {
                ty.set_url_handlers(
                    rules
                        .iter()
                        .map(|r| (r.rule.clone(), r.action.clone()))
                        .collect(),
                );
            }
            if let Some(allowed) = &config.allowed_actions {
                ty.set_allowed_actions(Some(AllowList::from(allowed)));
            }
            tracing::debug!(handler = %name, "Applied handler config");
        }
        Ok(())
    }

    pub fn require_allowed_actions(&mut self, required: bool) -> &mut Self {
        self.require_allowed_actions = required;
        self
    }

    pub fn build(&self) -> Result<HandlerRegistry, RegistryError> {
        let mut by_key: HashMap<String, &HandlerType> = HashMap::new();
        for ty in &self.types {
            if by_key.insert(ty.name.to_lowercase(), ty).is_some() {
                return Err(RegistryError::Duplicate(ty.name.clone()));
            }
        }

        let mut handlers = HashMap::new();
        for ty in &self.types {
            let chain = ancestry(ty, &by_key)?;
            let resolved = self.resolve(&chain)?;
            tracing::debug!(
                handler = %resolved.name,
                ancestry = ?resolved.ancestry,
                rules = resolved.rules.len(),
                "Handler type resolved"
            );
            handlers.insert(ty.name.to_lowercase(), Arc::new(resolved));
        }

        Ok(HandlerRegistry { handlers })
    }

    /// Flatten a chain (own type first) into a resolved handler.
    fn resolve(&self, chain: &[&HandlerType]) -> Result<ResolvedHandler, RegistryError> {
        let own = chain[0];
        let kind = chain
            .iter()
            .find_map(|t| t.kind)
            .unwrap_or(HandlerKind::RequestHandler);

        let mut rules = Vec::new();
        for ty in chain {
            for (rule, action) in &ty.url_handlers {
                rules.push(UrlHandler::new(rule, action)?);
            }
        }

        let mut allowed_actions: Option<AllowList> = None;
        let mut actions = HashMap::new();
        let mut predicates = HashMap::new();
        let mut inits = Vec::new();
        for ty in chain.iter().rev() {
            if let Some(list) = &ty.allowed_actions {
                allowed_actions = Some(match allowed_actions {
                    Some(parent) => parent.merged_with(list),
                    None => list.clone(),
                });
            }
            actions.extend(ty.actions.iter().map(|(k, v)| (k.clone(), Arc::clone(v))));
            predicates.extend(ty.predicates.iter().map(|(k, v)| (k.clone(), Arc::clone(v))));
            inits.extend(ty.init.iter().cloned());
        }

        Ok(ResolvedHandler {
            name: own.name.clone(),
            kind,
            is_abstract: own.is_abstract,
            ancestry: chain.iter().map(|t| t.name.clone()).collect(),
            rules,
            allowed_actions,
            actions,
            predicates,
            inits,
            require_allowed_actions: self.require_allowed_actions,
        })
    }
}

fn ancestry<'a>(
    ty: &'a HandlerType,
    by_key: &HashMap<String, &'a HandlerType>,
) -> Result<Vec<&'a HandlerType>, RegistryError> {
    let mut chain = vec![ty];
    let mut current = ty;
    while let Some(parent) = &current.parent {
        let next = by_key
            .get(&parent.to_lowercase())
            .copied()
            .ok_or_else(|| RegistryError::UnknownParent {
                child: current.name.clone(),
                parent: parent.clone(),
            })?;
        if chain.len() > by_key.len() {
            return Err(RegistryError::Cycle(ty.name.clone()));
        }
        chain.push(next);
        current = next;
    }
    Ok(chain)
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<&str> {
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}

/// Frozen set of resolved handler types.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<ResolvedHandler>>,
}

impl HandlerRegistry {
    pub fn get(&self, name: &str) -> Option<&Arc<ResolvedHandler>> {
        self.handlers.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// A fresh node of type `name`.
    pub fn instantiate(&self, name: &str) -> Option<HandlerNode> {
        self.get(name).map(|h| HandlerNode::new(Arc::clone(h)))
    }

    /// Lower-cased names of concrete controller types.
    pub fn routable_controllers(&self) -> HashSet<String> {
        self.handlers
            .iter()
            .filter(|(_, h)| h.kind == HandlerKind::Controller && !h.is_abstract)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Display names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let sorted: BTreeMap<&str, ()> = self
            .handlers
            .values()
            .map(|h| (h.name.as_str(), ()))
            .collect();
        sorted.into_keys().collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
