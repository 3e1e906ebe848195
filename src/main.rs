use school_messaging_service::{
    config, db, error, logging, migrations, routes, state::AppState,
    websocket::{pubsub, ConnectionRegistry},
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let db = db::init_pool(&cfg.database_url)
        .await
        .map_err(|e| error::AppError::StartServer(format!("db: {e}")))?;

    // Run embedded migrations (idempotent)
    migrations::run_all(&db)
        .await
        .map_err(|e| error::AppError::StartServer(format!("migrations: {e}")))?;

    let redis = redis::Client::open(cfg.redis_url.as_str())
        .map_err(|e| error::AppError::StartServer(format!("redis: {e}")))?;
    let registry = ConnectionRegistry::new();

    // Cross-instance fan-out listener; local delivery keeps working if it dies
    let listener_client = redis.clone();
    let listener_registry = registry.clone();
    tokio::spawn(async move {
        if let Err(e) = pubsub::start_pubsub_listener(listener_client, listener_registry).await {
            tracing::error!(error = %e, "redis pubsub listener failed");
        }
    });

    let state = AppState {
        db,
        registry,
        redis,
        config: cfg.clone(),
    };

    let app = routes::build_router(state.clone()).with_state(state);

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting school-messaging-service");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| error::AppError::StartServer(e.to_string()))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| error::AppError::StartServer(e.to_string()))?;

    Ok(())
}
