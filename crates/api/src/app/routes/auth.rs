use std::sync::Arc;

use axum::{
    extract::Extension,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};

use flame_auth::{AccessPolicy, NewUser, UserUpdate};
use flame_core::UserId;
use flame_infra::services::{LoginRequest, ProfileRequest};
use flame_infra::Services;

use crate::app::dto::{Body, Id, ListQuery, Params};
use crate::app::envelope::{created, done, ok, paged, ApiResult};
use crate::context::CurrentUser;
use crate::middleware::{auth_middleware, AuthState};

pub fn router(services: &Services) -> Router {
    let guard = |policy| from_fn_with_state(AuthState::new(services, policy), auth_middleware);

    let public = Router::new()
        .route("/register", post(register))
        .route("/login", post(login));

    let signed_in = Router::new()
        .route("/profile", get(profile).put(update_profile))
        .route_layer(guard(AccessPolicy::AnyRole));

    let admin = Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user).put(update_user))
        .route_layer(guard(AccessPolicy::Admin));

    let super_admin = Router::new()
        .route("/users/:id", delete(delete_user))
        .route_layer(guard(AccessPolicy::SuperAdmin));

    public.merge(signed_in).merge(admin).merge(super_admin)
}

pub async fn register(Extension(services): Extension<Arc<Services>>, Body(input): Body<NewUser>) -> ApiResult {
    created("User registered successfully", services.auth.register(input).await?)
}

pub async fn login(Extension(services): Extension<Arc<Services>>, Body(input): Body<LoginRequest>) -> ApiResult {
    ok("Login successful", services.auth.login(input).await?)
}

pub async fn profile(Extension(services): Extension<Arc<Services>>, Extension(me): Extension<CurrentUser>) -> ApiResult {
    ok("Profile fetched successfully", services.auth.profile(me.id()).await?)
}

pub async fn update_profile(
    Extension(services): Extension<Arc<Services>>,
    Extension(me): Extension<CurrentUser>,
    Body(request): Body<ProfileRequest>,
) -> ApiResult {
    ok(
        "Profile updated successfully",
        services.auth.update_profile(me.id(), request).await?,
    )
}

pub async fn list_users(Extension(services): Extension<Arc<Services>>, Params(q): Params<ListQuery>) -> ApiResult {
    let page = services.auth.list_users(&q.user_filter()?, &q.page()).await?;
    paged("Users fetched successfully", page)
}

pub async fn get_user(Extension(services): Extension<Arc<Services>>, Id(id): Id<UserId>) -> ApiResult {
    ok("User fetched successfully", services.auth.get_user(id).await?)
}

pub async fn update_user(
    Extension(services): Extension<Arc<Services>>,
    Id(id): Id<UserId>,
    Body(update): Body<UserUpdate>,
) -> ApiResult {
    ok("User updated successfully", services.auth.update_user(id, update).await?)
}

pub async fn delete_user(Extension(services): Extension<Arc<Services>>, Id(id): Id<UserId>) -> ApiResult {
    services.auth.delete_user(id).await?;
    done("User deleted successfully")
}
