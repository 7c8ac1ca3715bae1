use std::sync::Arc;

use axum::{
    extract::Extension,
    middleware::from_fn_with_state,
    routing::{get, put},
    Router,
};

use flame_auth::AccessPolicy;
use flame_core::ProductId;
use flame_infra::Services;

use crate::app::dto::{Body, Id, ListQuery, Params, ReorderRequest, ThresholdQuery};
use crate::app::envelope::{ok, paged, ApiResult};
use crate::middleware::{auth_middleware, AuthState};

pub fn router(services: &Services) -> Router {
    Router::new()
        .route("/out-of-stock", get(out_of_stock))
        .route("/low-stock", get(low_stock))
        .route("/all", get(all_alerts))
        .route("/reorder-report", get(reorder_report))
        .route("/reorder/:id", put(reorder))
        .route_layer(from_fn_with_state(
            AuthState::new(services, AccessPolicy::AnyRole),
            auth_middleware,
        ))
}

pub async fn out_of_stock(Extension(services): Extension<Arc<Services>>, Params(q): Params<ListQuery>) -> ApiResult {
    let page = services.stock_alerts.out_of_stock(&q.product_filter()?, &q.page()).await?;
    paged("Out of stock products fetched successfully", page)
}

pub async fn low_stock(Extension(services): Extension<Arc<Services>>, Params(q): Params<ListQuery>) -> ApiResult {
    let page = services
        .stock_alerts
        .low_stock(&q.product_filter()?, q.threshold, &q.page())
        .await?;
    paged("Low stock products fetched successfully", page)
}

pub async fn all_alerts(
    Extension(services): Extension<Arc<Services>>,
    Params(q): Params<ThresholdQuery>,
) -> ApiResult {
    ok("Stock alerts fetched successfully", services.stock_alerts.all(q.threshold).await?)
}

pub async fn reorder_report(
    Extension(services): Extension<Arc<Services>>,
    Params(q): Params<ThresholdQuery>,
) -> ApiResult {
    ok(
        "Reorder report generated successfully",
        services.stock_alerts.reorder_report(q.threshold).await?,
    )
}

pub async fn reorder(
    Extension(services): Extension<Arc<Services>>,
    Id(id): Id<ProductId>,
    Body(body): Body<ReorderRequest>,
) -> ApiResult {
    ok(
        "Product stock updated successfully",
        services.stock_alerts.reorder(id, body.quantity).await?,
    )
}
