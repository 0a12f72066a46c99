//! Action allow-lists.
//!
//! # Responsibilities
//! - Describe which actions a handler exposes and under what condition
//! - Decide whether a resolved action may be invoked
//!
//! # Decision order
//! 1. `init` and `run` are never invocable
//! 2. exact entry for the action, then the `*` wildcard entry
//! 3. no entry: `index` is allowed, anything else denied
//! 4. no allow-list anywhere in the hierarchy: allowed unless
//!    `require_allowed_actions` is set (`index` stays allowed)

use std::collections::BTreeMap;

/// Wildcard allow-list key.
pub const WILDCARD: &str = "*";

/// Actions that are never reachable from a URL.
pub const RESERVED_ACTIONS: [&str; 2] = ["init", "run"];

/// Condition attached to one allow-list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    Allow,
    Deny,
    /// Permission code checked against the current principal.
    Code(String),
    /// Named predicate registered on the handler type (`->name`).
    Predicate(String),
}

impl Permission {
    /// Parse the string form used in configuration.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "1" | "true" => Permission::Allow,
            "" | "0" | "false" => Permission::Deny,
            v => match v.strip_prefix("->") {
                Some(predicate) => Permission::Predicate(predicate.trim().to_string()),
                None => Permission::Code(v.to_string()),
            },
        }
    }
}

impl From<bool> for Permission {
    fn from(allowed: bool) -> Self {
        if allowed {
            Permission::Allow
        } else {
            Permission::Deny
        }
    }
}

/// Action name (lower-cased) to permission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    entries: BTreeMap<String, Permission>,
}

impl AllowList {
    pub fn new() -> Self {
        Self::default()
    }

    /// List form: every named action is allowed outright.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::new();
        for name in names {
            list.insert(name.as_ref(), Permission::Allow);
        }
        list
    }

    pub fn with(mut self, action: &str, permission: Permission) -> Self {
        self.insert(action, permission);
        self
    }

    pub fn insert(&mut self, action: &str, permission: Permission) {
        self.entries.insert(action.to_lowercase(), permission);
    }

    /// Exact entry, then wildcard.
    pub fn lookup(&self, action: &str) -> Option<&Permission> {
        self.entries
            .get(&action.to_lowercase())
            .or_else(|| self.entries.get(WILDCARD))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Permission)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entries of `child` override entries of `self`.
    pub fn merged_with(&self, child: &AllowList) -> AllowList {
        let mut merged = self.clone();
        merged
            .entries
            .extend(child.entries.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

pub fn is_reserved(action: &str) -> bool {
    RESERVED_ACTIONS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(action))
}

/// Decide whether `action` may be invoked.
///
/// `evaluate` resolves permission codes and predicates; it is only called
/// for entries that are neither a plain allow nor a plain deny.
pub fn check_access_action<F>(
    action: &str,
    allowed: Option<&AllowList>,
    require_allowed_actions: bool,
    mut evaluate: F,
) -> bool
where
    F: FnMut(&Permission) -> bool,
{
    if is_reserved(action) {
        return false;
    }
    let is_index = action.is_empty() || action.eq_ignore_ascii_case("index");

    let Some(list) = allowed else {
        return is_index || !require_allowed_actions;
    };

    match list.lookup(action) {
        Some(Permission::Allow) => true,
        Some(Permission::Deny) => false,
        Some(permission) => evaluate(permission),
        None => is_index,
    }
}
