//! Controller binary.
//!
//! # Environment Variables
//!
//! - `FORWARDER_IMAGE`: forwarding agent image (default: `rancher/klipper-lb:v0.4.13`)
//! - `CONTROLLER_CONCURRENCY`: services reconciled in parallel (default: 4)
//! - `LOG_JSON`: emit JSON log lines
//! - `RUST_LOG`: log filter (default: `info`)

use clap::Parser;
use host_lb_k8s::{Config, run};
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    if config.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let client = kube::Client::try_default().await?;
    run(client, config).await;

    Ok(())
}
