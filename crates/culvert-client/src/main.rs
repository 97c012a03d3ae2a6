//! culvert client CLI.
//!
//! Resumes the cached session when one exists, otherwise runs the key
//! exchange, then sends a single "ping" through the tunnel.

use anyhow::Result;
use culvert_client::Client;

fn main() -> Result<()> {
    init_logging();

    let server_url =
        std::env::var("CULVERT_SERVER").unwrap_or_else(|_| "http://localhost:8080".into());
    let cache_path =
        std::env::var("CULVERT_SESSION_FILE").unwrap_or_else(|_| "client_session.json".into());

    let mut client = Client::new(server_url, cache_path)?;
    if !client.load_session() {
        client.exchange_keys()?;
    }

    let response = client.send("ping")?;
    println!("Server response: {response}");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();
}
