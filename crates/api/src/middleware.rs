use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use flame_auth::{AccessPolicy, TokenError};
use flame_infra::services::{AuthService, Services};

use crate::app::errors::ApiError;
use crate::authz::authorize_route;
use crate::context::CurrentUser;

/// State of one route guard: who verifies tokens and what the group requires.
#[derive(Clone)]
pub struct AuthState {
    pub auth: AuthService,
    pub policy: AccessPolicy,
}

impl AuthState {
    pub fn new(services: &Services, policy: AccessPolicy) -> Self {
        Self {
            auth: services.auth.clone(),
            policy,
        }
    }
}

/// Resolve the bearer token to a live user, enforce the group's policy and
/// hand the caller to the handler as a [`CurrentUser`] extension.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers())?;
    let user = CurrentUser::new(state.auth.authenticate(token).await?);
    authorize_route(&user, state.policy)?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, TokenError> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .unwrap_or_default();
    if token.is_empty() {
        return Err(TokenError::Missing);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), Err(TokenError::Missing));

        headers.insert("authorization", HeaderValue::from_static("Token abc"));
        assert_eq!(extract_bearer(&headers), Err(TokenError::Missing));

        headers.insert("authorization", HeaderValue::from_static("Bearer  "));
        assert_eq!(extract_bearer(&headers), Err(TokenError::Missing));

        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer(&headers), Ok("abc.def"));
    }
}
