use mimalloc::MiMalloc;
use mailvault::AccountOps;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &mailvault::config::CONFIG;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_path = %cfg.database_path.display(),
        legacy_path = %cfg.legacy_path.display(),
        loglevel = %cfg.loglevel
    );

    let ops = AccountOps::new(cfg).await?;

    let accounts = ops.list_all().await?;
    let sold = accounts.iter().filter(|a| a.is_sold).count();
    info!(
        total = accounts.len(),
        sold,
        unsold = accounts.len() - sold,
        "account store initialized"
    );
    Ok(())
}
