use pureharvest_api::{config::AppConfig, db::create_orm_conn, services::notification_service};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Meant for cron: deletes notifications past their expiry.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let orm = create_orm_conn(&config.database_url).await?;
    let removed = notification_service::purge_expired(&orm).await?;
    tracing::info!(removed, "expired notifications purged");
    Ok(())
}
