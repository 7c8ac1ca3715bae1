use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};

use flame_auth::AccessPolicy;
use flame_core::OrderId;
use flame_infra::Services;
use flame_sales::NewOrder;

use crate::app::dto::{Body, Id, ListQuery, Params, StatusRequest};
use crate::app::envelope::{created, done, ok, paged, ApiResult};
use crate::middleware::{auth_middleware, AuthState};

pub fn router(services: &Services) -> Router {
    let guard = from_fn_with_state(AuthState::new(services, AccessPolicy::AnyRole), auth_middleware);

    let public = Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
        .route("/bill/:bill_number", get(get_order_by_bill));

    let signed_in = Router::new()
        .route("/", post(create_order))
        .route("/:id", put(update_order).delete(delete_order))
        .route_layer(guard);

    public.merge(signed_in)
}

pub async fn list_orders(Extension(services): Extension<Arc<Services>>, Params(q): Params<ListQuery>) -> ApiResult {
    let page = services.orders.list(&q.order_filter()?, &q.page()).await?;
    paged("Orders fetched successfully", page)
}

pub async fn get_order(Extension(services): Extension<Arc<Services>>, Id(id): Id<OrderId>) -> ApiResult {
    ok("Order fetched successfully", services.orders.get(id).await?)
}

pub async fn get_order_by_bill(
    Extension(services): Extension<Arc<Services>>,
    Path(bill_number): Path<String>,
) -> ApiResult {
    ok("Order fetched successfully", services.orders.get_by_bill(&bill_number).await?)
}

/// Reserve stock, record the order, its payment and the staff notification.
pub async fn create_order(Extension(services): Extension<Arc<Services>>, Body(input): Body<NewOrder>) -> ApiResult {
    created("Order created successfully", services.orders.place(input).await?)
}

pub async fn update_order(
    Extension(services): Extension<Arc<Services>>,
    Id(id): Id<OrderId>,
    Body(body): Body<StatusRequest>,
) -> ApiResult {
    ok(
        "Order status updated successfully",
        services.orders.update_status(id, body.status).await?,
    )
}

pub async fn delete_order(Extension(services): Extension<Arc<Services>>, Id(id): Id<OrderId>) -> ApiResult {
    services.orders.delete(id).await?;
    done("Order deleted successfully")
}
