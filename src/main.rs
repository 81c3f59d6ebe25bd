//! Binary entry point for the forumd daemon and its administrative commands.
//!
//! The runtime logic lives in `forumd::server`, so this binary only installs
//! logging and delegates to the shared library code.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "forumd=info";

#[tokio::main]
async fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    forumd::server::run().await
}
