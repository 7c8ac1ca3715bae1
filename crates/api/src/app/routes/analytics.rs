use std::sync::Arc;

use axum::{extract::Extension, middleware::from_fn_with_state, routing::get, Router};

use flame_auth::AccessPolicy;
use flame_infra::Services;

use crate::app::envelope::{ok, ApiResult};
use crate::middleware::{auth_middleware, AuthState};

pub fn router(services: &Services) -> Router {
    Router::new()
        .route("/summary", get(summary))
        .route("/sales-trend", get(sales_trend))
        .route("/stock-by-category", get(stock_by_category))
        .route("/products-by-category", get(products_by_category))
        .route("/revenue-by-category", get(revenue_by_category))
        .route_layer(from_fn_with_state(
            AuthState::new(services, AccessPolicy::AnyRole),
            auth_middleware,
        ))
}

pub async fn summary(Extension(services): Extension<Arc<Services>>) -> ApiResult {
    ok("Analytics summary fetched successfully", services.analytics.summary().await?)
}

pub async fn sales_trend(Extension(services): Extension<Arc<Services>>) -> ApiResult {
    ok("Sales trend fetched successfully", services.analytics.sales_trend().await?)
}

pub async fn stock_by_category(Extension(services): Extension<Arc<Services>>) -> ApiResult {
    ok("Stock by category fetched successfully", services.analytics.stock_by_category().await?)
}

pub async fn products_by_category(Extension(services): Extension<Arc<Services>>) -> ApiResult {
    ok(
        "Products by category fetched successfully",
        services.analytics.products_by_category().await?,
    )
}

pub async fn revenue_by_category(Extension(services): Extension<Arc<Services>>) -> ApiResult {
    ok(
        "Revenue by category fetched successfully",
        services.analytics.revenue_by_category().await?,
    )
}
