//! # Process Router
//!
//! Entry point: configuration from the environment, logging, then the
//! runtime with the built-in functions registered.

use anyhow::{Context, Result};
use router_runtime::{handlers, init_logging, RouterConfig, RouterRuntime};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = RouterConfig::from_env();
    init_logging(&config).context("failed to initialize logging")?;

    let runtime = RouterRuntime::new(config)?;
    let registry = handlers::with_builtins()
        .build()
        .context("failed to build function registry")?;
    runtime.start(registry).await?;

    info!("Router is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    runtime.shutdown().await;
    Ok(())
}
