//! Bearer token model, HS256 signing and verification.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use flame_core::UserId;

use crate::Role;

/// Claims carried by every staff token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClaims {
    /// Subject: the user the token was issued to.
    #[serde(rename = "userId")]
    pub user_id: UserId,

    /// Role at the time of issue. Middleware re-reads the stored role.
    pub role: Role,

    /// Issued-at, unix seconds.
    pub iat: i64,

    /// Expiry, unix seconds.
    pub exp: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Not authorized. No token provided.")]
    Missing,

    #[error("Invalid token")]
    Invalid,

    #[error("Token expired")]
    Expired,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Verifies bearer tokens for the HTTP layer.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<AuthClaims, TokenError>;
}

/// HMAC-SHA256 token issuer/validator sharing one secret.
#[derive(Clone)]
pub struct Hs256Jwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl Hs256Jwt {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for `user_id` valid from `now` for the configured lifetime.
    pub fn issue(&self, user_id: UserId, role: Role, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = AuthClaims {
            user_id,
            role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

impl core::fmt::Debug for Hs256Jwt {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256Jwt").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl JwtValidator for Hs256Jwt {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<AuthClaims, TokenError> {
        // Expiry is checked against the caller's clock below.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = jsonwebtoken::decode::<AuthClaims>(token, &self.decoding, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })?;

        if now.timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(data.claims)
    }
}

/// Parse a token lifetime such as `30d`, `12h`, `45m`, `90s` or bare seconds.
pub fn parse_ttl(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let (digits, unit) = match raw.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&raw[..idx], Some(c)),
        _ => (raw, None),
    };
    let n: i64 = digits.parse().ok().filter(|n| *n > 0)?;
    match unit {
        None | Some('s') => Some(Duration::seconds(n)),
        Some('m') => Some(Duration::minutes(n)),
        Some('h') => Some(Duration::hours(n)),
        Some('d') => Some(Duration::days(n)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt() -> Hs256Jwt {
        Hs256Jwt::new(b"test-secret", Duration::minutes(10))
    }

    #[test]
    fn issued_token_validates_and_carries_role() {
        let now = Utc::now();
        let user = UserId::new();
        let token = jwt().issue(user, Role::Vendor, now).unwrap();

        let claims = jwt().validate(&token, now).unwrap();
        assert_eq!(claims.user_id, user);
        assert_eq!(claims.role, Role::Vendor);
    }

    #[test]
    fn token_past_expiry_is_rejected_as_expired() {
        let now = Utc::now();
        let token = jwt().issue(UserId::new(), Role::Admin, now).unwrap();

        let later = now + Duration::minutes(11);
        assert_eq!(jwt().validate(&token, later), Err(TokenError::Expired));
    }

    #[test]
    fn token_signed_with_other_secret_is_invalid() {
        let now = Utc::now();
        let other = Hs256Jwt::new(b"other-secret", Duration::minutes(10));
        let token = other.issue(UserId::new(), Role::Admin, now).unwrap();

        assert_eq!(jwt().validate(&token, now), Err(TokenError::Invalid));
        assert_eq!(jwt().validate("garbage", now), Err(TokenError::Invalid));
    }

    #[test]
    fn ttl_accepts_common_suffixes() {
        assert_eq!(parse_ttl("30d"), Some(Duration::days(30)));
        assert_eq!(parse_ttl("12h"), Some(Duration::hours(12)));
        assert_eq!(parse_ttl("45m"), Some(Duration::minutes(45)));
        assert_eq!(parse_ttl("3600"), Some(Duration::seconds(3600)));
        assert_eq!(parse_ttl("0d"), None);
        assert_eq!(parse_ttl("7w"), None);
        assert_eq!(parse_ttl(""), None);
    }
}
