//! Administrative command handlers.
//!
//! Operator tasks that have no place on the wire protocol: seeding the member
//! directory, creating categories and reconciling counters. Each opens the
//! configured database the same way the daemon does.

#![expect(
    clippy::print_stdout,
    reason = "intentional user output for CLI commands"
)]

use anyhow::{Context, Result, anyhow};
use ortho_config::load_and_merge_subcommand_for;

use super::{
    bootstrap,
    cli::{AddMemberArgs, AppConfig, Commands, CreateCategoryArgs},
};

/// Execute an administrative command.
///
/// # Errors
///
/// Propagates failures from configuration merging, argument validation or
/// database operations.
pub async fn run_command(command: Commands, cfg: &AppConfig) -> Result<()> {
    match command {
        Commands::AddMember(args) => {
            let args = load_and_merge_subcommand_for::<AddMemberArgs>(&args)?;
            run_add_member(args, cfg).await
        }
        Commands::CreateCategory(args) => {
            let args = load_and_merge_subcommand_for::<CreateCategoryArgs>(&args)?;
            run_create_category(args, cfg).await
        }
        Commands::Recount => run_recount(cfg).await,
    }
}

fn member_fields(args: AddMemberArgs) -> Result<(i32, String)> {
    let id = args.id.ok_or_else(|| anyhow!("missing member id"))?;
    let name = args
        .display_name
        .ok_or_else(|| anyhow!("missing display name"))?;
    Ok((id, name))
}

fn category_fields(args: CreateCategoryArgs) -> Result<(String, String)> {
    let slug = args.slug.ok_or_else(|| anyhow!("missing category slug"))?;
    let name = args.name.ok_or_else(|| anyhow!("missing category name"))?;
    Ok((slug, name))
}

async fn run_add_member(args: AddMemberArgs, cfg: &AppConfig) -> Result<()> {
    let (id, name) = member_fields(args)?;
    let forum = bootstrap::open_forum(cfg).await?;
    let member = forum
        .upsert_member(id, name)
        .await
        .with_context(|| format!("failed to record member {id}"))?;
    println!("Member {} is now '{}'", member.id, member.display_name);
    Ok(())
}

async fn run_create_category(args: CreateCategoryArgs, cfg: &AppConfig) -> Result<()> {
    let (slug, name) = category_fields(args)?;
    let forum = bootstrap::open_forum(cfg).await?;
    let category = forum
        .create_category(slug, name)
        .await
        .context("failed to create category")?;
    println!("Category {} created ({})", category.slug, category.name);
    Ok(())
}

async fn run_recount(cfg: &AppConfig) -> Result<()> {
    let forum = bootstrap::open_forum(cfg).await?;
    let report = forum.recount_all().await.context("recount failed")?;
    println!(
        "Recounted {} topics, {} replies and {} categories",
        report.topics, report.replies, report.categories
    );
    Ok(())
}
