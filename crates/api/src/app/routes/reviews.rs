use std::sync::Arc;

use axum::{
    extract::Extension,
    middleware::from_fn_with_state,
    routing::{get, put},
    Router,
};

use flame_auth::AccessPolicy;
use flame_catalog::{NewReview, ReviewPatch};
use flame_core::ReviewId;
use flame_infra::Services;

use crate::app::dto::{Body, Id, ListQuery, MostReviewedQuery, Params};
use crate::app::envelope::{created, done, ok, paged, ApiResult};
use crate::middleware::{auth_middleware, AuthState};

/// Customers may read and post reviews; editing and removal are staff-only.
pub fn router(services: &Services) -> Router {
    let guard = from_fn_with_state(AuthState::new(services, AccessPolicy::AnyRole), auth_middleware);

    let public = Router::new()
        .route("/", get(list_reviews).post(create_review))
        .route("/summary", get(review_summary))
        .route("/most-reviewed", get(most_reviewed))
        .route("/:id", get(get_review));

    let signed_in = Router::new()
        .route("/:id", put(update_review).delete(delete_review))
        .route_layer(guard);

    public.merge(signed_in)
}

pub async fn list_reviews(Extension(services): Extension<Arc<Services>>, Params(q): Params<ListQuery>) -> ApiResult {
    let page = services.reviews.list(&q.review_filter()?, &q.page()).await?;
    paged("Reviews fetched successfully", page)
}

pub async fn review_summary(Extension(services): Extension<Arc<Services>>) -> ApiResult {
    ok("Review summary fetched successfully", services.reviews.summary().await?)
}

pub async fn most_reviewed(
    Extension(services): Extension<Arc<Services>>,
    Params(q): Params<MostReviewedQuery>,
) -> ApiResult {
    ok(
        "Most reviewed products fetched successfully",
        services.reviews.most_reviewed(q.limit).await?,
    )
}

pub async fn get_review(Extension(services): Extension<Arc<Services>>, Id(id): Id<ReviewId>) -> ApiResult {
    ok("Review fetched successfully", services.reviews.get(id).await?)
}

pub async fn create_review(Extension(services): Extension<Arc<Services>>, Body(input): Body<NewReview>) -> ApiResult {
    created("Review created successfully", services.reviews.create(input).await?)
}

pub async fn update_review(
    Extension(services): Extension<Arc<Services>>,
    Id(id): Id<ReviewId>,
    Body(patch): Body<ReviewPatch>,
) -> ApiResult {
    ok("Review updated successfully", services.reviews.update(id, patch).await?)
}

pub async fn delete_review(Extension(services): Extension<Arc<Services>>, Id(id): Id<ReviewId>) -> ApiResult {
    services.reviews.delete(id).await?;
    done("Review deleted successfully")
}
