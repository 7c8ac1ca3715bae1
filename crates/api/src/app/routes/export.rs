use std::sync::Arc;

use axum::{
    extract::Extension,
    http::header,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
    Router,
};

use flame_auth::AccessPolicy;
use flame_infra::services::MonthlyExportRequest;
use flame_infra::Services;

use crate::app::dto::Params;
use crate::app::envelope::ApiResult;
use crate::middleware::{auth_middleware, AuthState};

pub fn router(services: &Services) -> Router {
    Router::new()
        .route("/monthly", get(monthly))
        .route_layer(from_fn_with_state(
            AuthState::new(services, AccessPolicy::AnyRole),
            auth_middleware,
        ))
}

/// `?year=&month=&type=excel|pdf`, answered with the file as an attachment.
pub async fn monthly(
    Extension(services): Extension<Arc<Services>>,
    Params(request): Params<MonthlyExportRequest>,
) -> ApiResult {
    let file = services.export.monthly(request).await?;
    let disposition = format!("attachment; filename={}", file.filename);
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    )
        .into_response())
}
