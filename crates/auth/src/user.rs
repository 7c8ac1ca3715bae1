//! Staff user accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use flame_core::{contains_ci, DomainError, DomainResult, UserId};

use crate::Role;

pub const MIN_PASSWORD_LEN: usize = 6;

/// A stored staff account. The password hash never leaves the server; use
/// [`User::public`] for anything that is serialized to a client.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub mobile: Option<String>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client-facing view of a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub mobile: Option<String>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration input as received from the client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub mobile: Option<String>,
}

/// Validated registration fields, email normalised to lower case.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedUser {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub mobile: Option<String>,
}

impl NewUser {
    pub fn validate(self) -> DomainResult<ValidatedUser> {
        let full_name = required(self.full_name, "Full name is required")?;
        let email = normalize_email(self.email)?;
        let password = self
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| DomainError::validation("Password is required"))?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let role = match self.role.as_deref().filter(|r| !r.is_empty()) {
            Some(r) => r.parse()?,
            None => Role::default(),
        };
        Ok(ValidatedUser {
            full_name,
            email,
            password,
            role,
            mobile: self.mobile.filter(|m| !m.trim().is_empty()),
        })
    }
}

/// Self-service profile changes. Password and role are not accepted here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
}

/// Admin-side account changes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

impl From<ProfileUpdate> for UserUpdate {
    fn from(p: ProfileUpdate) -> Self {
        Self {
            full_name: p.full_name,
            email: p.email,
            mobile: p.mobile,
            role: None,
            is_active: None,
        }
    }
}

/// Filters for the admin user list.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        if self.role.is_some_and(|r| r != user.role) {
            return false;
        }
        if self.is_active.is_some_and(|a| a != user.is_active) {
            return false;
        }
        match self.search.as_deref().filter(|s| !s.is_empty()) {
            Some(q) => contains_ci(&user.full_name, q) || contains_ci(&user.email, q),
            None => true,
        }
    }
}

impl User {
    pub fn register(input: ValidatedUser, password_hash: String, now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new(),
            full_name: input.full_name,
            email: input.email,
            password_hash,
            role: input.role,
            mobile: input.mobile,
            is_active: true,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an update in place after validating every provided field.
    /// Nothing changes if any field is invalid.
    pub fn apply_update(&mut self, update: UserUpdate, now: DateTime<Utc>) -> DomainResult<()> {
        let full_name = update
            .full_name
            .map(|n| required(Some(n), "Full name cannot be empty"))
            .transpose()?;
        let email = update.email.map(|e| normalize_email(Some(e))).transpose()?;
        let role = update.role.map(|r| r.parse::<Role>()).transpose()?;

        if let Some(n) = full_name {
            self.full_name = n;
        }
        if let Some(e) = email {
            self.email = e;
        }
        if let Some(m) = update.mobile {
            self.mobile = Some(m).filter(|m| !m.trim().is_empty());
        }
        if let Some(r) = role {
            self.role = r;
        }
        if let Some(a) = update.is_active {
            self.is_active = a;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            role: self.role,
            mobile: self.mobile.clone(),
            is_active: self.is_active,
            last_login: self.last_login,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn required(value: Option<String>, msg: &str) -> DomainResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DomainError::validation(msg))
}

fn normalize_email(value: Option<String>) -> DomainResult<String> {
    let email = required(value, "Email is required")?.to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid {
        return Err(DomainError::validation("Please provide a valid email"));
    }
    Ok(email)
}
