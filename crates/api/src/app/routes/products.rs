use std::sync::Arc;

use axum::{
    extract::Extension,
    middleware::from_fn_with_state,
    routing::{get, patch, post, put},
    Router,
};

use flame_auth::AccessPolicy;
use flame_catalog::{NewProduct, ProductPatch};
use flame_core::ProductId;
use flame_infra::Services;

use crate::app::dto::{Body, Id, ListQuery, Params, StockRequest};
use crate::app::envelope::{created, done, ok, paged, ApiResult};
use crate::middleware::{auth_middleware, AuthState};

/// Reads are public; writes need a signed-in user and repair needs an admin.
pub fn router(services: &Services) -> Router {
    let guard = |policy| from_fn_with_state(AuthState::new(services, policy), auth_middleware);

    let public = Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product));

    let signed_in = Router::new()
        .route("/", post(create_product))
        .route("/:id", put(update_product).delete(delete_product))
        .route("/:id/stock", patch(set_stock))
        .route_layer(guard(AccessPolicy::AnyRole));

    let admin = Router::new()
        .route("/:id/repair", post(repair_product))
        .route_layer(guard(AccessPolicy::Admin));

    public.merge(signed_in).merge(admin)
}

pub async fn list_products(
    Extension(services): Extension<Arc<Services>>,
    Params(q): Params<ListQuery>,
) -> ApiResult {
    let page = services.products.list(&q.product_filter()?, &q.page()).await?;
    paged("Products fetched successfully", page)
}

pub async fn get_product(Extension(services): Extension<Arc<Services>>, Id(id): Id<ProductId>) -> ApiResult {
    ok("Product fetched successfully", services.products.get(id).await?)
}

pub async fn create_product(
    Extension(services): Extension<Arc<Services>>,
    Body(input): Body<NewProduct>,
) -> ApiResult {
    created("Product created successfully", services.products.create(input).await?)
}

pub async fn update_product(
    Extension(services): Extension<Arc<Services>>,
    Id(id): Id<ProductId>,
    Body(patch): Body<ProductPatch>,
) -> ApiResult {
    ok("Product updated successfully", services.products.update(id, patch).await?)
}

pub async fn set_stock(
    Extension(services): Extension<Arc<Services>>,
    Id(id): Id<ProductId>,
    Body(body): Body<StockRequest>,
) -> ApiResult {
    ok("Product stock updated successfully", services.products.set_stock(id, body.stock).await?)
}

pub async fn delete_product(Extension(services): Extension<Arc<Services>>, Id(id): Id<ProductId>) -> ApiResult {
    services.products.delete(id).await?;
    done("Product deleted successfully")
}

pub async fn repair_product(Extension(services): Extension<Arc<Services>>, Id(id): Id<ProductId>) -> ApiResult {
    let (view, drifted) = services.products.repair(id).await?;
    let message = if drifted {
        "Product repaired successfully"
    } else {
        "Product is already consistent"
    };
    ok(message, view)
}
