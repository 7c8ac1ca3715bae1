use axum::{routing::get, Router};

use flame_infra::Services;

pub mod analytics;
pub mod auth;
pub mod export;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod stock_alerts;
pub mod system;
pub mod top_sellers;

/// Every endpoint, mounted under `/api` by the caller. Each group decides
/// which of its routes need a signed-in user and which role.
pub fn router(services: &Services) -> Router {
    Router::new()
        .route("/check", get(system::check))
        .nest("/auth", auth::router(services))
        .nest("/products", products::router(services))
        .nest("/orders", orders::router(services))
        .nest("/payments", payments::router(services))
        .nest("/reviews", reviews::router(services))
        .nest("/notifications", notifications::router(services))
        .nest("/stock-alerts", stock_alerts::router(services))
        .nest("/top-sellers", top_sellers::router(services))
        .nest("/analytics", analytics::router(services))
        .nest("/export", export::router(services))
}
