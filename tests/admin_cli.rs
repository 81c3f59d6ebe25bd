//! Administrative subcommands driven through the compiled binary.

use std::process::{Command, Output};

use forumd::models::{EngagementKind, Target};
use rstest::rstest;
use tempfile::TempDir;
use test_util::{AnyError, TempDatabase, draft, member, uncached};

fn forumd(workdir: &TempDir, db: &TempDatabase, args: &[&str]) -> Result<Output, AnyError> {
    let output = Command::new(env!("CARGO_BIN_EXE_forumd"))
        .current_dir(workdir.path())
        .env_remove("FORUMD_DATABASE")
        .env("RUST_LOG", "off")
        .arg("--database")
        .arg(db.url())
        .args(args)
        .output()?;
    Ok(output)
}

#[rstest]
#[tokio::test]
async fn categories_and_members_are_seeded_from_the_command_line() -> Result<(), AnyError> {
    let workdir = TempDir::new()?;
    let db = TempDatabase::new()?;

    let out = forumd(
        &workdir,
        &db,
        &["create-category", "--slug", "quality", "--name", "Quality"],
    )?;
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8_lossy(&out.stdout).contains("Category quality created"));

    let out = forumd(
        &workdir,
        &db,
        &["add-member", "--id", "2", "--display-name", "Grace"],
    )?;
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let forum = db.forum(uncached()).await?;
    let topic = forum
        .create_topic(&member(2), draft("Gauge drift", "notes", "quality"))
        .await?;
    forum
        .toggle(&member(3), Target::topic(topic.id), EngagementKind::Like)
        .await?;
    let board = forum.top_contributors(&member(3), 5).await?;
    assert_eq!(
        board.first().map(|c| c.display_name.as_str()),
        Some("Grace")
    );
    Ok(())
}

#[rstest]
#[tokio::test]
async fn duplicate_category_fails() -> Result<(), AnyError> {
    let workdir = TempDir::new()?;
    let db = TempDatabase::new()?;
    let args = ["create-category", "--slug", "safety", "--name", "Safety"];
    assert!(forumd(&workdir, &db, &args)?.status.success());
    let again = forumd(&workdir, &db, &args)?;
    assert!(!again.status.success());
    Ok(())
}

#[rstest]
#[tokio::test]
async fn recount_reports_rebuilt_rows() -> Result<(), AnyError> {
    let workdir = TempDir::new()?;
    let db = TempDatabase::new()?;
    let out = forumd(
        &workdir,
        &db,
        &["create-category", "--slug", "quality", "--name", "Quality"],
    )?;
    assert!(out.status.success());

    let forum = db.forum(uncached()).await?;
    let topic = forum
        .create_topic(&member(1), draft("Defect rates", "numbers", "quality"))
        .await?;
    forum
        .add_reply(&member(2), topic.id, "Check calibration".to_owned(), None)
        .await?;
    drop(forum);

    let out = forumd(&workdir, &db, &["recount"])?;
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(
        String::from_utf8_lossy(&out.stdout)
            .contains("Recounted 1 topics, 1 replies and 1 categories")
    );
    Ok(())
}
