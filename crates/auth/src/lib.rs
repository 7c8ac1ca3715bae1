//! `flame-auth`: staff authentication and role-based access rules.
//!
//! This crate is intentionally decoupled from HTTP and storage: it knows how to
//! issue and verify tokens, hash passwords and decide whether a role may reach
//! a route, but not where users live.

pub mod authorize;
pub mod claims;
pub mod password;
pub mod roles;
pub mod user;

pub use authorize::{authorize, AccessPolicy, AuthzError};
pub use claims::{parse_ttl, AuthClaims, Hs256Jwt, JwtValidator, TokenError};
pub use password::{hash_password, verify_password, PasswordError};
pub use roles::Role;
pub use user::{NewUser, ProfileUpdate, PublicUser, User, UserFilter, UserUpdate, ValidatedUser};
