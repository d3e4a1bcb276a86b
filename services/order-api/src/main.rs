use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use common::database;
use order_api::{
    AppState,
    config::{AppConfig, StoreBackend},
    repositories::{CredentialStore, MemoryStore, OrderRepository, OrderStore, UserRepository},
    routes,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting order service");

    let config = AppConfig::from_env()?;

    let (users, orders): (Arc<dyn CredentialStore>, Arc<dyn OrderStore>) =
        match config.order_store {
            StoreBackend::Postgres => {
                // Initialize database connection pool
                let db_config = database::DatabaseConfig::from_env()?;
                let pool = database::init_pool(&db_config).await?;

                // Check database connectivity
                if database::health_check(&pool).await? {
                    info!("Database connection successful");
                } else {
                    anyhow::bail!("Failed to connect to database");
                }

                database::run_migrations(&pool, &sqlx::migrate!("./migrations")).await?;
                info!("Database migrations applied");

                let users: Arc<dyn CredentialStore> = Arc::new(UserRepository::new(pool.clone()));
                let orders: Arc<dyn OrderStore> = Arc::new(OrderRepository::new(pool));
                (users, orders)
            }
            StoreBackend::Memory => {
                info!("Using in-memory store; data is lost on shutdown");
                let store = Arc::new(MemoryStore::new());
                let users: Arc<dyn CredentialStore> = store.clone();
                let orders: Arc<dyn OrderStore> = store;
                (users, orders)
            }
        };

    let app_state = AppState::new(&config, users, orders).await?;

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("Order service listening on {}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
