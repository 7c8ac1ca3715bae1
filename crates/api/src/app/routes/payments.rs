use std::sync::Arc;

use axum::{
    extract::Extension,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};

use flame_auth::AccessPolicy;
use flame_core::PaymentId;
use flame_infra::Services;
use flame_sales::NewPayment;

use crate::app::dto::{Body, Id, ListQuery, Params, StatusRequest};
use crate::app::envelope::{created, done, ok, paged, ApiResult};
use crate::middleware::{auth_middleware, AuthState};

pub fn router(services: &Services) -> Router {
    let guard = from_fn_with_state(AuthState::new(services, AccessPolicy::AnyRole), auth_middleware);

    let public = Router::new()
        .route("/", get(list_payments))
        .route("/summary", get(payment_summary))
        .route("/:id", get(get_payment));

    let signed_in = Router::new()
        .route("/", post(create_payment))
        .route("/:id", put(update_payment).delete(delete_payment))
        .route_layer(guard);

    public.merge(signed_in)
}

pub async fn list_payments(Extension(services): Extension<Arc<Services>>, Params(q): Params<ListQuery>) -> ApiResult {
    let page = services.payments.list(&q.payment_filter()?, &q.page()).await?;
    paged("Payments fetched successfully", page)
}

pub async fn payment_summary(Extension(services): Extension<Arc<Services>>) -> ApiResult {
    ok("Payment summary fetched successfully", services.payments.summary().await?)
}

pub async fn get_payment(Extension(services): Extension<Arc<Services>>, Id(id): Id<PaymentId>) -> ApiResult {
    ok("Payment fetched successfully", services.payments.get(id).await?)
}

pub async fn create_payment(
    Extension(services): Extension<Arc<Services>>,
    Body(input): Body<NewPayment>,
) -> ApiResult {
    created("Payment created successfully", services.payments.create(input).await?)
}

pub async fn update_payment(
    Extension(services): Extension<Arc<Services>>,
    Id(id): Id<PaymentId>,
    Body(body): Body<StatusRequest>,
) -> ApiResult {
    ok(
        "Payment status updated successfully",
        services.payments.update_status(id, body.status).await?,
    )
}

pub async fn delete_payment(Extension(services): Extension<Arc<Services>>, Id(id): Id<PaymentId>) -> ApiResult {
    services.payments.delete(id).await?;
    done("Payment deleted successfully")
}
