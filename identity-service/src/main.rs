use std::net::SocketAddr;
use std::sync::Arc;

use identity_service::{
    build_router, build_state,
    config::IdentityConfig,
    services::HttpIdentityProvider,
    store::MongoStore,
};
use platform_core::error::AppError;
use platform_core::observability::init_tracing;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    let config = IdentityConfig::from_env()?;
    init_tracing("identity-service", &config.log_level);

    tracing::info!(
        environment = ?config.environment,
        port = config.server.port,
        "starting identity service"
    );

    let store = MongoStore::connect(&config.mongo.uri, &config.mongo.database).await?;
    store.initialize_indexes().await?;
    tracing::info!(database = %config.mongo.database, "store initialized");

    let provider = Arc::new(HttpIdentityProvider::new(&config.provider)?);
    let store = Arc::new(store);
    let state = build_state(config.clone(), store.clone(), store, provider);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| AppError::Config(anyhow::anyhow!("invalid bind address: {}", e)))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("bind failed: {}", e)))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("server error: {}", e)))?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut sig) = signal(SignalKind::terminate()) {
            sig.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
