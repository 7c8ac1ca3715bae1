//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `routes/`: HTTP routes + handlers (one file per endpoint group)
//! - `dto.rs`: extractors and query DTOs
//! - `envelope.rs`: the `{success, message, data?}` response body
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use flame_auth::Hs256Jwt;
use flame_infra::{AppConfig, Repositories, Services};

pub mod dto;
pub mod envelope;
pub mod errors;
pub mod routes;

/// Wire the application services over `repos` using the token and
/// reservation settings from `config`.
pub fn build_services(config: &AppConfig, repos: Repositories) -> Arc<Services> {
    let jwt = Arc::new(Hs256Jwt::new(config.jwt_secret.as_bytes(), config.jwt_ttl));
    Arc::new(Services::new(repos, jwt, config.stock_reservation))
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<Services>) -> Router {
    Router::new()
        .nest("/api", routes::router(&services))
        .fallback(routes::system::not_found)
        .layer(Extension(services))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}
