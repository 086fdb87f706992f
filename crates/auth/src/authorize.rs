use thiserror::Error;

use crate::{Identity, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: requires one of roles {0:?}")]
    Forbidden(Vec<String>),
}

/// Require the identity to hold one of `allowed` roles.
///
/// - No IO
/// - No panics
/// - Pure policy check; tenant scoping is enforced by the store queries.
pub fn require_any_role(identity: &Identity, allowed: &[&str]) -> Result<(), AuthzError> {
    if allowed.iter().any(|r| identity.role.as_str() == *r) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(
            allowed.iter().map(|r| r.to_string()).collect(),
        ))
    }
}

/// Whether `actor` may hand out `target` to another user.
///
/// Only admins can create or promote admins; everyone else can grant at most
/// the non-admin roles.
pub fn may_assign_role(actor: &Identity, target: &Role) -> bool {
    actor.role.is_admin() || !target.is_admin()
}
