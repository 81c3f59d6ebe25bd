//! Server orchestration for the `forumd` binary.
//!
//! This module exposes the command-line resolution, database bootstrap,
//! administrative subcommands and the accept loop. The binary stays a thin
//! wrapper that only needs to call [`run`].

pub mod admin;
pub mod bootstrap;
pub mod cli;
pub mod daemon;

use anyhow::Result;
pub use cli::{AppConfig, Cli, Commands, ResolvedCli, load_cli, load_cli_from};
pub use daemon::{run_daemon, serve};

/// Parse CLI arguments and execute the requested command or daemon.
///
/// # Errors
///
/// Returns any error emitted while resolving configuration, running an
/// administrative command or serving connections.
pub async fn run() -> Result<()> {
    let cli = load_cli()?;
    run_with_cli(cli).await
}

/// Execute the server logic using an already resolved [`ResolvedCli`].
///
/// # Errors
///
/// Propagates any failure reported by [`admin::run_command`] or
/// [`run_daemon`].
pub async fn run_with_cli(cli: ResolvedCli) -> Result<()> {
    let ResolvedCli { config, command } = cli;
    if let Some(command) = command {
        admin::run_command(command, &config).await
    } else {
        run_daemon(config).await
    }
}
