use inbox_dl::{Config, Poller, run_with_shutdown};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> inbox_dl::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,inbox_dl=debug")),
        )
        .init();

    let config = Config::from_env()?;
    if config.mailbox.username.is_empty() || config.mailbox.password.is_empty() {
        tracing::warn!("EMAIL_ADDRESS or APP_PASSWORD is not set, logins will fail");
    }
    tracing::info!(
        host = %config.mailbox.host,
        mailbox = %config.mailbox.mailbox,
        resolver = ?config.resolver.mode,
        download_dir = %config.fetch.download_dir.display(),
        "Starting inbox-dl"
    );

    let poller = Poller::from_config(&config)?;
    run_with_shutdown(poller).await;

    Ok(())
}
