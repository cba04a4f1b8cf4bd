use pureharvest_api::{config::AppConfig, db};

/// Applies pending SQL migrations and exits. The API server runs the same step on boot.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config = AppConfig::from_env()?;
    let orm = db::create_orm_conn(&config.database_url).await?;
    db::run_migrations(&orm).await?;

    tracing::info!("database schema is up to date");
    Ok(())
}
