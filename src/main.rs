use airline_reservation_system::build_rocket;
use airline_reservation_system::config::AppConfig;
use airline_reservation_system::db::MySqlStore;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "airline_reservation_system=info,rocket=warn";

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .try_init();

    let config = AppConfig::from_env()?;

    // Connect to the database
    let store = MySqlStore::new(&config.database).await?;
    store.create_schema().await?;
    tracing::info!(
        max_connections = config.database.max_connections,
        max_attempts = config.retry.max_attempts,
        "booking store ready"
    );

    let _rocket = build_rocket(Arc::new(store), config.jwt, config.retry)
        .launch()
        .await?;
    Ok(())
}
