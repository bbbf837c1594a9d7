//! VOffice desktop companion entry point.

mod app;
mod commands;
mod config;
mod context;
mod host;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting VOffice desktop");

    let config = config::AppConfig::load()?;
    tracing::info!(
        name = %config.display_name,
        signaling = %config.signaling_url,
        "configuration loaded"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config))?;

    tracing::info!("shut down cleanly");
    Ok(())
}
