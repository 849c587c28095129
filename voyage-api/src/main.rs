use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voyage_api::{app, AppState, AuthConfig};
use voyage_core::{InventoryStore, SeatEventPublisher, SystemClock};
use voyage_inventory::{spawn_expiry_sweeper, MemoryInventoryStore};
use voyage_store::{Config, DbClient, EventProducer, PgInventoryStore, RedisClient, StoreBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voyage_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Voyage API on port {}", config.server.port);

    let mut rules = config.inventory.clone();

    // Seat store
    let store: Arc<dyn InventoryStore> = match config.store.backend {
        StoreBackend::Postgres => {
            let db_config = config
                .database
                .as_ref()
                .context("database.url is required for the postgres backend")?;
            let db = DbClient::new(&db_config.url, db_config.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;

            match db.fetch_inventory_rules(rules.clone()).await {
                Ok(overrides) => rules = overrides,
                Err(e) => tracing::warn!("Using file inventory rules, overrides unavailable: {}", e),
            }
            Arc::new(PgInventoryStore::new(&db))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory seat store; state is lost on restart");
            Arc::new(MemoryInventoryStore::new())
        }
    };

    // Kafka seat events
    let mut publishers: Vec<Arc<dyn SeatEventPublisher>> = Vec::new();
    if let Some(kafka) = &config.kafka {
        let producer = EventProducer::new(&kafka.brokers).context("Failed to create Kafka producer")?;
        publishers.push(Arc::new(producer));
    }

    let mut app_state = AppState::new(
        store,
        Arc::new(SystemClock),
        publishers,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        rules.clone(),
    );

    // Redis rate limiting, optional
    if let Some(redis) = &config.redis {
        match RedisClient::new(&redis.url).await {
            Ok(client) => {
                app_state = app_state.with_rate_limit(Arc::new(client), redis.rate_limit_per_minute)
            }
            Err(e) => tracing::warn!("Rate limiting disabled, Redis unavailable: {}", e),
        }
    }

    let sweeper = spawn_expiry_sweeper(
        app_state.inventory.clone(),
        Duration::from_secs(rules.sweep_interval_seconds),
    );

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    tracing::info!("Voyage API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
