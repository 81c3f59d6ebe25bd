//! Shared CLI type definitions for forumd build and runtime.
//!
//! This crate provides CLI argument and configuration types used by both the
//! `build.rs` script (for man page generation) and the runtime binary.
//! Extracting these types into a separate crate avoids brittle `#[path = ...]`
//! includes and keeps build-time and runtime dependencies cleanly separated.

// FIXME: File-wide suppressions are unavoidable here. Clap and OrthoConfig derive macros
// inject generated code throughout the module, and there is no mechanism to narrow
// the scope without restructuring the crate.
#![allow(
    non_snake_case,
    reason = "Clap/OrthoConfig derive macros generate helper modules with uppercase names"
)]
#![allow(
    missing_docs,
    reason = "OrthoConfig and Clap derive macros generate items that cannot be documented"
)]

use clap::{Args, Parser, Subcommand};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

/// Default listen address for the daemon.
pub const DEFAULT_BIND: &str = "127.0.0.1:7800";
/// Default `SQLite` database path.
pub const DEFAULT_DATABASE: &str = "forumd.db";
/// Default number of pooled database connections.
pub const DEFAULT_POOL_SIZE: u32 = 8;
/// Trailing window, in days, used to count active members.
pub const DEFAULT_ACTIVE_WINDOW_DAYS: u32 = 30;
/// Points awarded per accepted best answer on the contributor leaderboard.
pub const DEFAULT_BEST_ANSWER_BONUS: u32 = 10;
/// Seconds that platform statistics and the leaderboard may be served stale.
pub const DEFAULT_STATS_CACHE_SECS: u64 = 60;

/// Arguments for the `add-member` administrative subcommand.
#[derive(Parser, OrthoConfig, Deserialize, Serialize, Default, Debug, Clone)]
#[ortho_config(prefix = "FORUMD_")]
pub struct AddMemberArgs {
    /// Identifier issued by the identity provider.
    #[arg(long)]
    pub id: Option<i32>,
    /// Name shown on leaderboards.
    #[arg(long)]
    pub display_name: Option<String>,
}

/// Arguments for the `create-category` administrative subcommand.
#[derive(Parser, OrthoConfig, Deserialize, Serialize, Default, Debug, Clone)]
#[ortho_config(prefix = "FORUMD_")]
pub struct CreateCategoryArgs {
    /// Stable identifier used by clients when filing topics.
    #[arg(long)]
    pub slug: Option<String>,
    /// Human readable category name.
    #[arg(long)]
    pub name: Option<String>,
}

/// CLI subcommands exposed by `forumd`.
#[derive(Subcommand, Deserialize, Serialize, Debug, Clone)]
pub enum Commands {
    /// Register or rename a member in the display-name directory.
    #[command(name = "add-member")]
    AddMember(AddMemberArgs),
    /// Create a new discussion category.
    #[command(name = "create-category")]
    CreateCategory(CreateCategoryArgs),
    /// Recompute every denormalised counter from the stored records.
    #[command(name = "recount")]
    Recount,
}

/// Runtime configuration shared by the daemon and administrative commands.
///
/// The default bind address only listens on loopback; the daemon is meant to
/// sit behind the identity gateway that asserts caller identities.
#[derive(Args, OrthoConfig, Serialize, Deserialize, Default, Debug, Clone)]
#[ortho_config(prefix = "FORUMD_")]
pub struct AppConfig {
    /// Server bind address.
    #[ortho_config(default = DEFAULT_BIND.to_owned())]
    #[arg(long, default_value_t = String::from(DEFAULT_BIND))]
    pub bind: String,
    /// Database connection string or path.
    #[ortho_config(default = DEFAULT_DATABASE.to_owned())]
    #[arg(long, default_value_t = String::from(DEFAULT_DATABASE))]
    pub database: String,
    /// Maximum number of pooled database connections.
    #[ortho_config(default = DEFAULT_POOL_SIZE)]
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE)]
    pub pool_size: u32,
    /// Trailing window, in days, for the active member count.
    #[ortho_config(default = DEFAULT_ACTIVE_WINDOW_DAYS)]
    #[arg(long, default_value_t = DEFAULT_ACTIVE_WINDOW_DAYS)]
    pub active_window_days: u32,
    /// Leaderboard points per best answer.
    #[ortho_config(default = DEFAULT_BEST_ANSWER_BONUS)]
    #[arg(long, default_value_t = DEFAULT_BEST_ANSWER_BONUS)]
    pub best_answer_bonus: u32,
    /// Lifetime of cached statistics, in seconds. Zero disables caching.
    #[ortho_config(default = DEFAULT_STATS_CACHE_SECS)]
    #[arg(long, default_value_t = DEFAULT_STATS_CACHE_SECS)]
    pub stats_cache_secs: u64,
}

/// Top-level CLI entry point consumed by binaries.
#[derive(Parser, Deserialize, Serialize, Debug, Clone)]
#[command(name = "forumd", about = "Threaded discussion engine daemon")]
pub struct Cli {
    /// Application configuration.
    #[command(flatten)]
    pub config: AppConfig,
    /// Optional subcommand.
    #[command(subcommand)]
    pub command: Option<Commands>,
}
