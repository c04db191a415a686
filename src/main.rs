use std::sync::Arc;

use deskline_messaging::error::AppError;
use deskline_messaging::fanout::pubsub::{run_listener, RedisPublisher};
use deskline_messaging::fanout::{ConnectionRegistry, EventFanout};
use deskline_messaging::state::AppState;
use deskline_messaging::store::postgres::PgStore;
use deskline_messaging::{config, db, logging, routes};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let pool = db::init_pool(&cfg.database_url)
        .await
        .map_err(|e| AppError::StartServer(format!("db: {e}")))?;

    // Embedded migrations, idempotent. A schema mismatch is fatal.
    db::MIGRATOR
        .run(&pool)
        .await
        .map_err(|e| AppError::StartServer(format!("database migrations failed: {e}")))?;

    let redis_client = redis::Client::open(cfg.redis_url.as_str())
        .map_err(|e| AppError::StartServer(format!("redis: {e}")))?;

    let registry = ConnectionRegistry::new();
    let fanout = EventFanout::new(Arc::new(RedisPublisher::new(redis_client.clone())));

    // Cross-instance fan-out: every instance publishes to Redis and this
    // listener delivers to the local sockets.
    let listener_registry = registry.clone();
    tokio::spawn(async move {
        if let Err(e) = run_listener(redis_client, listener_registry).await {
            tracing::error!(error = %e, "redis pub/sub listener failed");
        }
    });

    let state = AppState {
        store: Arc::new(PgStore::new(pool)),
        registry,
        fanout,
        config: cfg.clone(),
    };

    let app = routes::build_router().with_state(state);

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting deskline-messaging");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| AppError::StartServer(format!("bind {bind_addr}: {e}")))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::StartServer(format!("server: {e}")))?;
    Ok(())
}
