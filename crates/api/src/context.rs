use flame_auth::{Role, User};
use flame_core::UserId;

/// The authenticated caller, as loaded by the auth middleware.
///
/// Present on every request that passed a route guard.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    user: User,
}

impl CurrentUser {
    pub fn new(user: User) -> Self {
        Self { user }
    }

    pub fn id(&self) -> UserId {
        self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn user(&self) -> &User {
        &self.user
    }
}
