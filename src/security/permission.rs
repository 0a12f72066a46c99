//! Principals and permission checks.
//!
//! # Responsibilities
//! - Describe who is making a request
//! - Answer "does this principal hold permission code X"
//!
//! # Design Decisions
//! - The oracle is a trait so hosts can plug in their own user store
//! - The default oracle reads codes straight off the principal
//! - `ADMIN` implies every other code
//! - Fail closed: no principal means no permission

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Permission code granting everything.
pub const ADMIN_CODE: &str = "ADMIN";

/// The authenticated party behind a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            permissions: BTreeSet::new(),
        }
    }

    pub fn with_permission(mut self, code: impl Into<String>) -> Self {
        self.permissions.insert(code.into());
        self
    }
}

/// Decides whether a principal holds a permission code.
pub trait PermissionOracle: Send + Sync + fmt::Debug {
    fn check_permission(&self, code: &str, principal: Option<&Principal>) -> bool;
}

/// Checks codes carried on the principal itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct GrantedPermissions;

impl PermissionOracle for GrantedPermissions {
    fn check_permission(&self, code: &str, principal: Option<&Principal>) -> bool {
        let Some(principal) = principal else {
            return false;
        };
        principal.permissions.contains(code) || principal.permissions.contains(ADMIN_CODE)
    }
}
