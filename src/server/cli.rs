//! Command-line interface resolution for the `forumd` binary.
//!
//! The clap and `OrthoConfig` types live in the `cli-defs` crate so the build
//! script can render a man page from them. This module parses the raw
//! arguments and layers the global options over defaults, `.forumd.toml` and
//! `FORUMD_*` environment variables.

use std::ffi::OsString;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use ortho_config::OrthoConfig;
pub use cli_defs::{AddMemberArgs, AppConfig, Cli, Commands, CreateCategoryArgs};

/// Parsed command line with fully layered global configuration.
#[derive(Debug, Clone)]
pub struct ResolvedCli {
    /// Global configuration after merging files, environment and flags.
    pub config: AppConfig,
    /// Administrative subcommand, if one was given.
    pub command: Option<Commands>,
}

/// Resolve the process arguments.
///
/// # Errors
/// Returns an error when the arguments do not parse or a configuration
/// source is malformed.
pub fn load_cli() -> Result<ResolvedCli> { load_cli_from(std::env::args_os()) }

/// Resolve an explicit argument list, program name first.
///
/// Arguments before the first subcommand name are global options and feed
/// the configuration layers; the subcommand and its own flags are parsed by
/// clap alone.
///
/// # Errors
/// Returns an error when the arguments do not parse or a configuration
/// source is malformed.
pub fn load_cli_from<I, T>(args: I) -> Result<ResolvedCli>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let cli = Cli::try_parse_from(&args).context("invalid command line")?;
    let global = global_args(&args);
    let config = AppConfig::load_from_iter(global).context("failed to load configuration")?;
    Ok(ResolvedCli {
        config,
        command: cli.command,
    })
}

fn global_args(args: &[OsString]) -> Vec<OsString> {
    let command = Cli::command();
    let names: Vec<&str> = command.get_subcommands().map(clap::Command::get_name).collect();
    args.iter()
        .take_while(|arg| !arg.to_str().is_some_and(|arg| names.contains(&arg)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use figment::Jail;
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn daemon_invocation_has_no_command() {
        Jail::expect_with(|_j| {
            let cli = load_cli_from(["forumd", "--pool-size", "3"]).expect("load");
            assert!(cli.command.is_none());
            assert_eq!(cli.config.pool_size, 3);
            Ok(())
        });
    }

    #[rstest]
    fn subcommand_flags_do_not_reach_global_config() {
        Jail::expect_with(|j| {
            j.set_env("FORUMD_DATABASE", "env.db");
            let cli = load_cli_from([
                "forumd",
                "--bind",
                "127.0.0.1:9100",
                "create-category",
                "--slug",
                "quality",
                "--name",
                "Quality",
            ])
            .expect("load");
            assert_eq!(cli.config.bind, "127.0.0.1:9100");
            assert_eq!(cli.config.database, "env.db");
            let Some(Commands::CreateCategory(args)) = cli.command else {
                panic!("expected create-category");
            };
            assert_eq!(args.slug.as_deref(), Some("quality"));
            Ok(())
        });
    }

    #[rstest]
    fn dotfile_applies_to_stats_settings() {
        Jail::expect_with(|j| {
            j.create_file(".forumd.toml", "best_answer_bonus = 25\nstats_cache_secs = 0")?;
            let cli = load_cli_from(["forumd", "recount"]).expect("load");
            assert_eq!(cli.config.best_answer_bonus, 25);
            assert_eq!(cli.config.stats_cache_secs, 0);
            assert!(matches!(cli.command, Some(Commands::Recount)));
            Ok(())
        });
    }

    #[rstest]
    fn unknown_flag_is_rejected() {
        assert!(load_cli_from(["forumd", "--no-such-flag"]).is_err());
    }
}
