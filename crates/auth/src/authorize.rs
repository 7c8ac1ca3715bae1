//! Route-level access rules.
//!
//! - No IO
//! - No panics
//! - Pure policy check over the caller's role

use thiserror::Error;

use crate::Role;

/// Who may reach a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Any authenticated staff member, whatever their role.
    AnyRole,
    /// `admin` or `super_admin`.
    Admin,
    /// `super_admin` only.
    SuperAdmin,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(&'static str),
}

/// Authorize a role against a policy.
pub fn authorize(role: Role, policy: AccessPolicy) -> Result<(), AuthzError> {
    match policy {
        AccessPolicy::AnyRole => Ok(()),
        AccessPolicy::Admin if role.is_admin() => Ok(()),
        AccessPolicy::Admin => Err(AuthzError::Forbidden(
            "Access denied. Admin privileges required.",
        )),
        AccessPolicy::SuperAdmin if role == Role::SuperAdmin => Ok(()),
        AccessPolicy::SuperAdmin => Err(AuthzError::Forbidden(
            "Access denied. Super admin privileges required.",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_is_not_an_admin() {
        assert!(authorize(Role::Vendor, AccessPolicy::AnyRole).is_ok());
        assert_eq!(
            authorize(Role::Vendor, AccessPolicy::Admin),
            Err(AuthzError::Forbidden("Access denied. Admin privileges required."))
        );
    }

    #[test]
    fn only_super_admin_passes_super_admin_policy() {
        assert!(authorize(Role::SuperAdmin, AccessPolicy::SuperAdmin).is_ok());
        assert!(authorize(Role::SuperAdmin, AccessPolicy::Admin).is_ok());
        assert!(authorize(Role::Admin, AccessPolicy::SuperAdmin).is_err());
    }
}
