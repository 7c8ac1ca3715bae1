use std::net::SocketAddr;

use anyhow::Context;

use flame_api::app::{build_app, build_services};
use flame_infra::{AppConfig, Repositories};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    flame_observability::init(config.log_format);

    if config.jwt_secret_is_default {
        tracing::warn!("JWT_SECRET not set; using insecure default secret");
    }

    let repos = open_store(&config).await?;
    let app = build_app(build_services(&config, repos));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, reservation = ?config.stock_reservation, "listening");

    axum::serve(listener, app).await.context("server error")
}

#[cfg(feature = "postgres")]
async fn open_store(config: &AppConfig) -> anyhow::Result<Repositories> {
    use std::sync::Arc;

    use flame_infra::store::PgStore;

    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set; using the in-memory store");
        return Ok(Repositories::in_memory());
    };
    let store = PgStore::connect(url).await.context("failed to connect to Postgres")?;
    store.migrate().await.context("failed to run migrations")?;
    tracing::info!("connected to Postgres");
    Ok(Repositories::from_store(Arc::new(store)))
}

#[cfg(not(feature = "postgres"))]
async fn open_store(config: &AppConfig) -> anyhow::Result<Repositories> {
    if config.database_url.is_some() {
        tracing::warn!("DATABASE_URL is set but this build lacks the postgres feature; using the in-memory store");
    }
    Ok(Repositories::in_memory())
}
