//! Registration, login, token checks and the admin user directory.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use flame_auth::{
    hash_password, verify_password, Hs256Jwt, JwtValidator, NewUser, ProfileUpdate, PublicUser, User,
    UserFilter, UserUpdate,
};
use flame_core::{DomainError, Page, PageRequest, SortOrder, UserId};

use super::{sort_records, ServiceError, ServiceResult, SortKey};
use crate::store::{Repositories, StoreError};

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const EMAIL_TAKEN: &str = "User with this email already exists";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Body of a self-service profile update. `password` and `role` are only
/// captured so they can be refused.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileRequest {
    #[serde(flatten)]
    pub update: ProfileUpdate,
    #[serde(default)]
    pub password: Option<serde_json::Value>,
    #[serde(default)]
    pub role: Option<serde_json::Value>,
}

/// A signed-in user and their bearer token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub user: PublicUser,
    pub token: String,
}

fn user_sort_key(u: &User, field: &str) -> Option<SortKey> {
    Some(match field {
        "createdAt" => u.created_at.into(),
        "updatedAt" => u.updated_at.into(),
        "fullName" => u.full_name.as_str().into(),
        "email" => u.email.as_str().into(),
        "role" => u.role.as_str().into(),
        "isActive" => u.is_active.into(),
        _ => return None,
    })
}

#[derive(Clone)]
pub struct AuthService {
    repos: Repositories,
    jwt: Arc<Hs256Jwt>,
}

impl AuthService {
    pub fn new(repos: Repositories, jwt: Arc<Hs256Jwt>) -> Self {
        Self { repos, jwt }
    }

    #[instrument(skip(self, input), err)]
    pub async fn register(&self, input: NewUser) -> ServiceResult<Session> {
        let input = input.validate()?;
        if self.repos.users.find_by_email(&input.email).await?.is_some() {
            return Err(DomainError::conflict(EMAIL_TAKEN).into());
        }
        let hash = hash_password(&input.password)?;
        let now = Utc::now();
        let user = User::register(input, hash, now);
        self.repos.users.insert(&user).await.map_err(email_taken)?;
        info!(user_id = %user.id, role = user.role.as_str(), "user registered");

        let token = self.jwt.issue(user.id, user.role, now)?;
        Ok(Session {
            user: user.public(),
            token,
        })
    }

    #[instrument(skip(self, request), err)]
    pub async fn login(&self, request: LoginRequest) -> ServiceResult<Session> {
        let (Some(email), Some(password)) = (
            request.email.filter(|e| !e.trim().is_empty()),
            request.password.filter(|p| !p.is_empty()),
        ) else {
            return Err(DomainError::validation("Email and password are required").into());
        };

        let email = email.trim().to_lowercase();
        let Some(mut user) = self.repos.users.find_by_email(&email).await? else {
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS));
        };
        // Password before the active flag.
        if !verify_password(&password, &user.password_hash) {
            warn!(user_id = %user.id, "failed login");
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS));
        }
        if !user.is_active {
            return Err(ServiceError::Unauthorized(
                "Account is deactivated. Please contact administrator",
            ));
        }

        let now = Utc::now();
        user.last_login = Some(now);
        self.repos.users.update(&user).await?;
        info!(user_id = %user.id, "user logged in");

        let token = self.jwt.issue(user.id, user.role, now)?;
        Ok(Session {
            user: user.public(),
            token,
        })
    }

    /// Resolve a bearer token to a live, active account.
    pub async fn authenticate(&self, token: &str) -> ServiceResult<User> {
        let claims = self.jwt.validate(token, Utc::now())?;
        let user = self
            .repos
            .users
            .get(claims.user_id)
            .await?
            .ok_or(ServiceError::Unauthorized("User not found"))?;
        if !user.is_active {
            return Err(ServiceError::Unauthorized("Account is deactivated"));
        }
        Ok(user)
    }

    pub async fn profile(&self, id: UserId) -> ServiceResult<PublicUser> {
        Ok(self.load(id).await?.public())
    }

    #[instrument(skip(self, request), err)]
    pub async fn update_profile(&self, id: UserId, request: ProfileRequest) -> ServiceResult<PublicUser> {
        if request.password.is_some() {
            return Err(DomainError::validation("Use change password endpoint to update password").into());
        }
        if request.role.is_some() {
            return Err(ServiceError::Forbidden("You cannot change your role"));
        }
        self.update_user(id, request.update.into()).await
    }

    pub async fn list_users(&self, filter: &UserFilter, page: &PageRequest) -> ServiceResult<Page<PublicUser>> {
        let mut users: Vec<User> = self
            .repos
            .users
            .list()
            .await?
            .into_iter()
            .filter(|u| filter.matches(u))
            .collect();
        sort_records(&mut users, page, ("createdAt", SortOrder::Desc), user_sort_key);
        Ok(Page::from_sorted(users, page).map(|u| u.public()))
    }

    pub async fn get_user(&self, id: UserId) -> ServiceResult<PublicUser> {
        self.profile(id).await
    }

    #[instrument(skip(self, update), err)]
    pub async fn update_user(&self, id: UserId, update: UserUpdate) -> ServiceResult<PublicUser> {
        let mut user = self.load(id).await?;
        user.apply_update(update, Utc::now())?;
        if let Some(other) = self.repos.users.find_by_email(&user.email).await? {
            if other.id != id {
                return Err(DomainError::conflict(EMAIL_TAKEN).into());
            }
        }
        if !self.repos.users.update(&user).await.map_err(email_taken)? {
            return Err(DomainError::not_found("User").into());
        }
        info!(user_id = %id, "user updated");
        Ok(user.public())
    }

    #[instrument(skip(self), err)]
    pub async fn delete_user(&self, id: UserId) -> ServiceResult<PublicUser> {
        let user = self
            .repos
            .users
            .delete(id)
            .await?
            .ok_or_else(|| DomainError::not_found("User"))?;
        info!(user_id = %id, "user deleted");
        Ok(user.public())
    }

    async fn load(&self, id: UserId) -> ServiceResult<User> {
        Ok(self
            .repos
            .users
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("User"))?)
    }
}

/// A unique-email race lost at the store reads the same as the early check.
fn email_taken(err: StoreError) -> ServiceError {
    match err {
        StoreError::Duplicate(_) => DomainError::conflict(EMAIL_TAKEN).into(),
        other => other.into(),
    }
}
