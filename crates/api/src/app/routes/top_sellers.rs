use std::sync::Arc;

use axum::{extract::Extension, middleware::from_fn_with_state, routing::get, Router};

use flame_auth::AccessPolicy;
use flame_infra::Services;

use crate::app::dto::{ListQuery, Params};
use crate::app::envelope::{ok, paged, ApiResult};
use crate::middleware::{auth_middleware, AuthState};

pub fn router(services: &Services) -> Router {
    Router::new()
        .route("/products", get(top_products))
        .route("/insights", get(insights))
        .route_layer(from_fn_with_state(
            AuthState::new(services, AccessPolicy::AnyRole),
            auth_middleware,
        ))
}

pub async fn top_products(Extension(services): Extension<Arc<Services>>, Params(q): Params<ListQuery>) -> ApiResult {
    let page = services.top_sellers.products(&q.product_filter()?, &q.page()).await?;
    paged("Top selling products fetched successfully", page)
}

pub async fn insights(Extension(services): Extension<Arc<Services>>) -> ApiResult {
    ok("Sales insights fetched successfully", services.top_sellers.insights().await?)
}
