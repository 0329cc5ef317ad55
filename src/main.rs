use chrono::Local;
use subscrap::{info_time, process::process_site, Config, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "subscrap=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let start_time = Local::now();
    let config = Config::from_env()?;
    process_site(config).await?;
    info_time!(start_time, "Full program time:");

    Ok(())
}
