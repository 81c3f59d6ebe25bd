//! Aggregation service: platform totals, the contributor leaderboard and the
//! statistics cache.

use std::time::Duration;

use forumd::{
    ForumError,
    forum::ForumConfig,
    models::{EngagementKind, Target},
};
use rstest::rstest;
use test_util::{AnyError, QUALITY, SAFETY, admin, draft, member, seeded_forum, uncached};

#[rstest]
#[tokio::test]
async fn three_topics_five_replies_two_answers() -> Result<(), AnyError> {
    let (_db, forum) = seeded_forum(uncached()).await?;
    let mut answers = Vec::new();
    for (n, category) in [(1, QUALITY.0), (2, QUALITY.0), (3, SAFETY.0)] {
        let author = member(n);
        let topic = forum
            .create_topic(&author, draft(&format!("Topic {n}"), "body", category))
            .await?;
        let reply = forum
            .add_reply(&member(10), topic.id, "first".to_owned(), None)
            .await?;
        if n < 3 {
            answers.push((author, topic.id, reply.id));
        }
    }
    let spare = forum
        .list_topics(&member(1), forumd::db::TopicQuery::default())
        .await?
        .items
        .first()
        .map(|t| t.id)
        .ok_or("no topics")?;
    for user in [11, 12] {
        forum
            .add_reply(&member(user), spare, "me too".to_owned(), None)
            .await?;
    }
    for (author, topic_id, reply_id) in &answers {
        forum.mark_best_answer(author, *topic_id, *reply_id).await?;
    }

    let stats = forum.platform_stats(&member(1)).await?;
    assert_eq!(stats.total_topics, 3);
    assert_eq!(stats.helpful_answers, 2);
    assert_eq!(stats.active_members, 6);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn leaderboard_ranks_likes_plus_answer_bonus() -> Result<(), AnyError> {
    let (_db, forum) = seeded_forum(uncached()).await?;
    forum.upsert_member(2, "Grace".to_owned()).await?;
    let asker = member(1);
    let topic = forum
        .create_topic(&asker, draft("Gauge drift", "help", QUALITY.0))
        .await?;
    let answer = forum
        .add_reply(&member(2), topic.id, "recalibrate".to_owned(), None)
        .await?;
    forum
        .add_reply(&member(3), topic.id, "no idea".to_owned(), None)
        .await?;
    for fan in [4, 5] {
        forum
            .toggle(&member(fan), Target::topic(topic.id), EngagementKind::Like)
            .await?;
    }
    forum.mark_best_answer(&asker, topic.id, answer.id).await?;

    let board = forum.top_contributors(&member(9), 10).await?;
    let rows: Vec<(u32, i32, &str, i64)> = board
        .iter()
        .map(|c| (c.rank, c.user_id, c.display_name.as_str(), c.points))
        .collect();
    assert_eq!(
        rows,
        vec![
            (1, 2, "Grace", 10),
            (2, 1, "member #1", 2),
            (3, 3, "member #3", 0),
        ]
    );

    let top = forum.top_contributors(&member(9), 1).await?;
    assert_eq!(top.len(), 1);
    Ok(())
}

#[rstest]
#[case(0)]
#[case(101)]
#[tokio::test]
async fn leaderboard_limit_is_bounded(#[case] limit: u32) -> Result<(), AnyError> {
    let (_db, forum) = seeded_forum(uncached()).await?;
    let err = forum.top_contributors(&member(1), limit).await.err();
    assert!(matches!(err, Some(ForumError::Validation(_))), "{err:?}");
    Ok(())
}

#[rstest]
#[tokio::test]
async fn cached_stats_are_refreshed_by_recount() -> Result<(), AnyError> {
    let config = ForumConfig {
        stats_ttl: Duration::from_secs(600),
        ..ForumConfig::default()
    };
    let (_db, forum) = seeded_forum(config).await?;
    let alice = member(1);
    forum
        .create_topic(&alice, draft("One", "body", QUALITY.0))
        .await?;
    assert_eq!(forum.platform_stats(&alice).await?.total_topics, 1);

    let two = forum
        .create_topic(&alice, draft("Two", "body", QUALITY.0))
        .await?;
    assert_eq!(forum.platform_stats(&alice).await?.total_topics, 1);

    let err = forum.recount_topic(&alice, two.id).await.err();
    assert!(matches!(err, Some(ForumError::Authorization(_))));
    forum.recount_topic(&admin(9), two.id).await?;
    assert_eq!(forum.platform_stats(&alice).await?.total_topics, 2);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn recount_all_repairs_nothing_on_a_consistent_store() -> Result<(), AnyError> {
    let (_db, forum) = seeded_forum(uncached()).await?;
    let alice = member(1);
    let topic = forum
        .create_topic(&alice, draft("One", "body", QUALITY.0))
        .await?;
    forum
        .add_reply(&member(2), topic.id, "reply".to_owned(), None)
        .await?;
    forum
        .toggle(&member(3), Target::topic(topic.id), EngagementKind::Like)
        .await?;

    let report = forum.recount_all().await?;
    assert_eq!(report.topics, 1);
    assert_eq!(report.replies, 1);
    assert_eq!(report.categories, 2);

    let detail = forum.get_topic(&alice, topic.id).await?;
    assert_eq!(detail.topic.reply_count, 1);
    assert_eq!(detail.topic.like_count, 1);
    Ok(())
}
