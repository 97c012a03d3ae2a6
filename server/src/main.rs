//! culvert server entry point.
//!
//! Loads the configuration, initialises logging, and serves the tunnel
//! endpoints with the demo ping handler.

use anyhow::Result;
use culvert_server::{config::ServerConfig, run};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::var("CULVERT_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = ServerConfig::load(&config_path)?;

    init_logging(&config.logging.level);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path,
        "starting culvert server"
    );

    run(
        config,
        Box::new(|request: &str| {
            if request == "ping" {
                "pong".to_string()
            } else {
                "unknown message".to_string()
            }
        }),
    )
    .await
}

fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt().with_env_filter(filter).with_target(true).init();
}
