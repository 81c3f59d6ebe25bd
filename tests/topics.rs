//! Topic store behaviour through the forum façade.
//!
//! Covers listing order, filters and paging, author-only edits with category
//! moves, and the soft/hard delete split.

use forumd::{
    ForumError,
    db::{DeleteOutcome, TopicEdit, TopicQuery},
    error::NOT_FOUND_MESSAGE,
    models::TopicSort,
};
use rstest::rstest;
use test_util::{AnyError, QUALITY, SAFETY, admin, draft, member, seeded_forum, uncached};

fn ids(page: &forumd::db::TopicPage) -> Vec<i32> { page.items.iter().map(|t| t.id).collect() }

#[rstest]
#[tokio::test]
async fn pinned_topics_lead_every_ordering() -> Result<(), AnyError> {
    let (_db, forum) = seeded_forum(uncached()).await?;
    let alice = member(1);
    let rates = forum
        .create_topic(&alice, draft("Defect rates", "weekly numbers", QUALITY.0))
        .await?;
    let drift = forum
        .create_topic(&alice, draft("Gauge drift", "calibration notes", QUALITY.0))
        .await?;
    let zones = forum
        .create_topic(&alice, draft("Forklift zones", "floor markings", SAFETY.0))
        .await?;
    forum.record_view(&alice, rates.id).await?;
    forum.record_view(&alice, rates.id).await?;
    forum.pin_topic(&admin(9), zones.id, true).await?;

    let by_views = forum
        .list_topics(
            &alice,
            TopicQuery {
                sort: TopicSort::MostViewed,
                ..TopicQuery::default()
            },
        )
        .await?;
    assert_eq!(ids(&by_views), vec![zones.id, rates.id, drift.id]);
    assert_eq!(by_views.total, 3);

    let newest = forum.list_topics(&alice, TopicQuery::default()).await?;
    assert_eq!(ids(&newest), vec![zones.id, drift.id, rates.id]);
    assert!(newest.items.first().is_some_and(|t| t.pinned));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn members_cannot_pin() -> Result<(), AnyError> {
    let (_db, forum) = seeded_forum(uncached()).await?;
    let alice = member(1);
    let topic = forum
        .create_topic(&alice, draft("Defect rates", "weekly numbers", QUALITY.0))
        .await?;
    let err = forum.pin_topic(&alice, topic.id, true).await.err();
    assert!(matches!(err, Some(ForumError::Authorization(_))));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn filters_search_and_paging() -> Result<(), AnyError> {
    let (_db, forum) = seeded_forum(uncached()).await?;
    let alice = member(1);
    for (title, body, category) in [
        ("Defect rates", "weekly numbers", QUALITY.0),
        ("Gauge drift", "Calibration notes", QUALITY.0),
        ("Forklift zones", "floor markings", SAFETY.0),
        ("100% inspection", "is it worth it", QUALITY.0),
    ] {
        forum.create_topic(&alice, draft(title, body, category)).await?;
    }

    let searched = forum
        .list_topics(
            &alice,
            TopicQuery {
                search: Some("CALIBRATION".to_owned()),
                ..TopicQuery::default()
            },
        )
        .await?;
    assert_eq!(searched.total, 1);
    assert_eq!(
        searched.items.first().map(|t| t.title.as_str()),
        Some("Gauge drift")
    );

    let percent = forum
        .list_topics(
            &alice,
            TopicQuery {
                search: Some("100%".to_owned()),
                ..TopicQuery::default()
            },
        )
        .await?;
    assert_eq!(percent.total, 1);

    let safety = forum
        .list_topics(
            &alice,
            TopicQuery {
                category: Some(SAFETY.0.to_owned()),
                ..TopicQuery::default()
            },
        )
        .await?;
    assert_eq!(safety.total, 1);

    let second = forum
        .list_topics(
            &alice,
            TopicQuery {
                category: Some(QUALITY.0.to_owned()),
                page: 2,
                page_size: 2,
                ..TopicQuery::default()
            },
        )
        .await?;
    assert_eq!(second.total, 3);
    assert_eq!(second.items.len(), 1);
    Ok(())
}

#[rstest]
#[case(draft("", "body", "quality"))]
#[case(draft("   ", "body", "quality"))]
#[case(draft("title", "", "quality"))]
#[case(draft("title", "body", "no-such-category"))]
#[tokio::test]
async fn invalid_drafts_are_rejected(#[case] bad: forumd::db::TopicDraft) -> Result<(), AnyError> {
    let (_db, forum) = seeded_forum(uncached()).await?;
    let err = forum.create_topic(&member(1), bad).await.err();
    assert!(matches!(err, Some(ForumError::Validation(_))), "{err:?}");
    Ok(())
}

#[rstest]
#[case(0, 20)]
#[case(1, 0)]
#[case(1, 101)]
#[tokio::test]
async fn paging_bounds_are_validated(
    #[case] page: u32,
    #[case] page_size: u32,
) -> Result<(), AnyError> {
    let (_db, forum) = seeded_forum(uncached()).await?;
    let query = TopicQuery {
        page,
        page_size,
        ..TopicQuery::default()
    };
    let err = forum.list_topics(&member(1), query).await.err();
    assert!(matches!(err, Some(ForumError::Validation(_))), "{err:?}");
    Ok(())
}

#[rstest]
#[tokio::test]
async fn only_the_author_edits_and_moves_keep_counts() -> Result<(), AnyError> {
    let (_db, forum) = seeded_forum(uncached()).await?;
    let alice = member(1);
    let topic = forum
        .create_topic(&alice, draft("Defect rates", "weekly numbers", QUALITY.0))
        .await?;
    let move_to_safety = TopicEdit {
        category: Some(SAFETY.0.to_owned()),
        ..TopicEdit::default()
    };

    for intruder in [member(2), admin(9)] {
        let err = forum
            .edit_topic(&intruder, topic.id, move_to_safety.clone())
            .await
            .err();
        assert!(matches!(err, Some(ForumError::Authorization(_))), "{err:?}");
    }

    let edited = forum
        .edit_topic(&alice, topic.id, move_to_safety)
        .await?;
    assert_ne!(edited.category_id, topic.category_id);

    let counts: Vec<(String, i32)> = forum
        .list_categories(&alice)
        .await?
        .into_iter()
        .map(|c| (c.slug, c.topic_count))
        .collect();
    assert!(counts.contains(&(QUALITY.0.to_owned(), 0)));
    assert!(counts.contains(&(SAFETY.0.to_owned(), 1)));

    let err = forum
        .edit_topic(&alice, topic.id, TopicEdit::default())
        .await
        .err();
    assert!(matches!(err, Some(ForumError::Validation(_))));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn delete_is_hard_without_replies_and_soft_with_them() -> Result<(), AnyError> {
    let (_db, forum) = seeded_forum(uncached()).await?;
    let alice = member(1);
    let bob = member(2);
    let lonely = forum
        .create_topic(&alice, draft("Lonely", "nobody answers", QUALITY.0))
        .await?;
    let busy = forum
        .create_topic(&alice, draft("Busy", "everyone answers", QUALITY.0))
        .await?;
    forum
        .add_reply(&bob, busy.id, "me too".to_owned(), None)
        .await?;

    let err = forum.delete_topic(&bob, busy.id).await.err();
    assert!(matches!(err, Some(ForumError::Authorization(_))));

    assert_eq!(forum.delete_topic(&alice, lonely.id).await?, DeleteOutcome::Hard);
    assert_eq!(forum.delete_topic(&admin(9), busy.id).await?, DeleteOutcome::Soft);

    let page = forum.list_topics(&alice, TopicQuery::default()).await?;
    assert_eq!(page.total, 0);
    let quality = forum
        .list_categories(&alice)
        .await?
        .into_iter()
        .find(|c| c.slug == QUALITY.0)
        .map(|c| c.topic_count);
    assert_eq!(quality, Some(0));

    for id in [lonely.id, busy.id] {
        let err = forum.get_topic(&alice, id).await.err();
        assert!(matches!(err, Some(ForumError::NotFound(_))));
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some(NOT_FOUND_MESSAGE)
        );
    }
    Ok(())
}

#[rstest]
#[tokio::test]
async fn get_topic_counts_one_view_per_call() -> Result<(), AnyError> {
    let (_db, forum) = seeded_forum(uncached()).await?;
    let alice = member(1);
    let topic = forum
        .create_topic(&alice, draft("Defect rates", "weekly numbers", QUALITY.0))
        .await?;
    let first = forum.get_topic(&alice, topic.id).await?;
    let second = forum.get_topic(&member(2), topic.id).await?;
    assert_eq!(first.topic.view_count, 1);
    assert_eq!(second.topic.view_count, 2);
    assert_eq!(second.category.slug, QUALITY.0);
    assert!(second.thread.is_empty());
    Ok(())
}
