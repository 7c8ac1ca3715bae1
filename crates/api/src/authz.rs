//! API-side role guard.
//!
//! Roles are read from the stored user, not the token, so a demotion takes
//! effect on the next request.

use flame_auth::{authorize, AccessPolicy, AuthzError};

use crate::context::CurrentUser;

/// Check the caller against a route group's policy.
pub fn authorize_route(user: &CurrentUser, policy: AccessPolicy) -> Result<(), AuthzError> {
    authorize(user.role(), policy).inspect_err(|_| {
        tracing::debug!(user_id = %user.id(), role = user.role().as_str(), ?policy, "route denied");
    })
}
