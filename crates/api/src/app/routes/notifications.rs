use std::sync::Arc;

use axum::{
    extract::Extension,
    middleware::from_fn_with_state,
    routing::{get, put},
    Router,
};
use serde_json::json;

use flame_auth::AccessPolicy;
use flame_core::NotificationId;
use flame_infra::services::notifications::FEED_PAGE_SIZE;
use flame_infra::Services;
use flame_notifications::NewNotification;

use crate::app::dto::{Body, Id, ListQuery, Params};
use crate::app::envelope::{created, done, ok, with_status, ApiResult, Envelope};
use crate::middleware::{auth_middleware, AuthState};

pub fn router(services: &Services) -> Router {
    Router::new()
        .route("/", get(list_notifications).post(create_notification))
        .route("/unread-count", get(unread_count))
        .route("/read-all", put(mark_all_read))
        .route("/:id", get(get_notification).delete(delete_notification))
        .route("/:id/read", put(mark_read))
        .route_layer(from_fn_with_state(
            AuthState::new(services, AccessPolicy::AnyRole),
            auth_middleware,
        ))
}

/// Newest first, 20 per page, with the global unread count alongside.
pub async fn list_notifications(
    Extension(services): Extension<Arc<Services>>,
    Params(q): Params<ListQuery>,
) -> ApiResult {
    let feed = services
        .notifications
        .list(&q.notification_filter()?, &q.page_with_default(FEED_PAGE_SIZE))
        .await?;
    let mut body = Envelope::page("Notifications fetched successfully", feed.page);
    body.unread_count = Some(feed.unread_count);
    with_status(axum::http::StatusCode::OK, body)
}

pub async fn unread_count(Extension(services): Extension<Arc<Services>>) -> ApiResult {
    let count = services.notifications.unread_count().await?;
    ok("Unread count fetched successfully", json!({ "unreadCount": count }))
}

pub async fn get_notification(
    Extension(services): Extension<Arc<Services>>,
    Id(id): Id<NotificationId>,
) -> ApiResult {
    ok("Notification fetched successfully", services.notifications.get(id).await?)
}

pub async fn create_notification(
    Extension(services): Extension<Arc<Services>>,
    Body(input): Body<NewNotification>,
) -> ApiResult {
    created("Notification created successfully", services.notifications.create(input).await?)
}

pub async fn mark_read(Extension(services): Extension<Arc<Services>>, Id(id): Id<NotificationId>) -> ApiResult {
    ok("Notification marked as read", services.notifications.mark_read(id).await?)
}

pub async fn mark_all_read(Extension(services): Extension<Arc<Services>>) -> ApiResult {
    let modified = services.notifications.mark_all_read().await?;
    ok("All notifications marked as read", json!({ "modifiedCount": modified }))
}

pub async fn delete_notification(
    Extension(services): Extension<Arc<Services>>,
    Id(id): Id<NotificationId>,
) -> ApiResult {
    services.notifications.delete(id).await?;
    done("Notification deleted successfully")
}
