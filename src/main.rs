use gtfs_history::config::AppConfig;
use gtfs_history::{db, poller};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting GTFS history collector...");

    // Init DB
    let pool = db::init_pool(&config.database_url).await?;
    info!("Connected to database");

    db::ensure_schema(&pool).await?;

    // Poll feeds until the process is killed
    poller::run(&config, pool).await
}
