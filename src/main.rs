use grounded_rag::api::{create_pool, create_router, AppState};
use grounded_rag::infrastructure::{build_pipeline, init_tracing, AppConfig};
use std::net::SocketAddr;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("api=debug,grounded_rag=debug,tower_http=debug");

    let config = AppConfig::from_env()?;

    let redis_pool = create_pool(&config.config.redis_url)?;
    info!("Redis pool initialized");

    let pipeline = build_pipeline(&config).await?;

    let addr = SocketAddr::new(config.config.server.host.parse()?, config.config.server.port);
    let app = create_router(AppState::new(redis_pool, pipeline, config));

    info!("API server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
