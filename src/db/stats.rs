//! Aggregation queries: platform totals and the contributor leaderboard.
//!
//! These read the stores and never write; deleted topics and replies are
//! left out of every figure.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use diesel::{
    dsl::{count_star, min, sum},
    prelude::*,
};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};

use super::{
    connection::DbConnection,
    members::{display_names, fallback_name},
};
use crate::error::ForumResult;

/// Platform-wide totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformStats {
    /// Live topics.
    pub total_topics: i64,
    /// Distinct authors of live topics or replies created in the window.
    pub active_members: i64,
    /// Live topics with an accepted answer.
    pub helpful_answers: i64,
}

/// One leaderboard row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    /// One-based position.
    pub rank: u32,
    /// Member identifier.
    pub user_id: i32,
    /// Directory name, or a placeholder for unknown members.
    pub display_name: String,
    /// Likes received plus the best answer bonus.
    pub points: i64,
}

/// Compute [`PlatformStats`] counting activity since `active_since`.
///
/// # Errors
/// Returns any database error.
#[must_use = "handle the result"]
pub async fn platform_stats(
    conn: &mut DbConnection,
    active_since: NaiveDateTime,
) -> ForumResult<PlatformStats> {
    use crate::schema::{replies::dsl as r, topics::dsl as t};
    let total_topics: i64 = t::topics
        .filter(t::deleted.eq(false))
        .count()
        .get_result(conn)
        .await?;
    let helpful_answers: i64 = t::topics
        .filter(t::deleted.eq(false))
        .filter(t::best_answer_reply_id.is_not_null())
        .count()
        .get_result(conn)
        .await?;
    let topic_authors: Vec<i32> = t::topics
        .filter(t::deleted.eq(false))
        .filter(t::created_at.ge(active_since))
        .select(t::author_id)
        .distinct()
        .load(conn)
        .await?;
    let reply_authors: Vec<i32> = r::replies
        .filter(r::deleted.eq(false))
        .filter(r::created_at.ge(active_since))
        .select(r::author_id)
        .distinct()
        .load(conn)
        .await?;
    let active: HashSet<i32> = topic_authors.into_iter().chain(reply_authors).collect();
    Ok(PlatformStats {
        total_topics,
        active_members: i64::try_from(active.len()).unwrap_or(i64::MAX),
        helpful_answers,
    })
}

#[derive(Debug, Clone, Copy)]
struct Tally {
    likes: i64,
    best_answers: i64,
    first_contribution: Option<NaiveDateTime>,
}

impl Tally {
    const EMPTY: Self = Self {
        likes: 0,
        best_answers: 0,
        first_contribution: None,
    };

    fn add_posts(&mut self, likes: Option<i64>, first: Option<NaiveDateTime>) {
        self.likes += likes.unwrap_or(0);
        self.first_contribution = match (self.first_contribution, first) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }

    fn points(&self, bonus: i64) -> i64 { self.likes + self.best_answers * bonus }
}

/// Order tallies by points, then earliest first contribution, then id.
fn rank(tallies: HashMap<i32, Tally>, bonus: i64, limit: usize) -> Vec<(i32, i64)> {
    let mut rows: Vec<(i32, i64, Option<NaiveDateTime>)> = tallies
        .into_iter()
        .map(|(user_id, tally)| (user_id, tally.points(bonus), tally.first_contribution))
        .collect();
    rows.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then_with(|| match (a.2, b.2) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
            .then_with(|| a.0.cmp(&b.0))
    });
    rows.into_iter()
        .take(limit)
        .map(|(user_id, points, _)| (user_id, points))
        .collect()
}

/// Rank authors of live content by likes received plus `bonus` per best
/// answer.
///
/// # Errors
/// Returns any database error.
#[must_use = "handle the result"]
pub async fn top_contributors(
    conn: &mut DbConnection,
    limit: u32,
    bonus: u32,
) -> ForumResult<Vec<Contributor>> {
    use crate::schema::{replies::dsl as r, topics::dsl as t};
    let topic_rows: Vec<(i32, Option<i64>, Option<NaiveDateTime>)> = t::topics
        .filter(t::deleted.eq(false))
        .group_by(t::author_id)
        .select((t::author_id, sum(t::like_count), min(t::created_at)))
        .load(conn)
        .await?;
    let reply_rows: Vec<(i32, Option<i64>, Option<NaiveDateTime>)> = r::replies
        .filter(r::deleted.eq(false))
        .group_by(r::author_id)
        .select((r::author_id, sum(r::like_count), min(r::created_at)))
        .load(conn)
        .await?;
    let answer_rows: Vec<(i32, i64)> = r::replies
        .filter(r::deleted.eq(false))
        .filter(
            r::id.nullable().eq_any(
                t::topics
                    .filter(t::deleted.eq(false))
                    .filter(t::best_answer_reply_id.is_not_null())
                    .select(t::best_answer_reply_id),
            ),
        )
        .group_by(r::author_id)
        .select((r::author_id, count_star()))
        .load(conn)
        .await?;

    let mut tallies: HashMap<i32, Tally> = HashMap::new();
    for (author, likes, first) in topic_rows.into_iter().chain(reply_rows) {
        tallies.entry(author).or_insert(Tally::EMPTY).add_posts(likes, first);
    }
    for (author, answers) in answer_rows {
        tallies.entry(author).or_insert(Tally::EMPTY).best_answers += answers;
    }

    let ranked = rank(
        tallies,
        i64::from(bonus),
        usize::try_from(limit).unwrap_or(usize::MAX),
    );
    let ids: Vec<i32> = ranked.iter().map(|(id, _)| *id).collect();
    let mut names = display_names(conn, &ids).await?;
    Ok(ranked
        .into_iter()
        .zip(1_u32..)
        .map(|((user_id, points), rank)| Contributor {
            rank,
            user_id,
            display_name: names.remove(&user_id).unwrap_or_else(|| fallback_name(user_id)),
            points,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use rstest::rstest;

    use super::*;

    fn at(secs: i64) -> Option<NaiveDateTime> {
        DateTime::from_timestamp(secs, 0).map(|d| d.naive_utc())
    }

    fn tally(likes: i64, best_answers: i64, first: i64) -> Tally {
        Tally {
            likes,
            best_answers,
            first_contribution: at(first),
        }
    }

    #[rstest]
    fn ranks_by_points_then_earliest_contribution() {
        let tallies = HashMap::from([
            (1, tally(5, 0, 300)),
            (2, tally(0, 1, 200)),
            (3, tally(5, 0, 100)),
            (4, tally(1, 0, 50)),
        ]);
        let ranked = rank(tallies, 10, 10);
        assert_eq!(ranked, vec![(2, 10), (3, 5), (1, 5), (4, 1)]);
    }

    #[rstest]
    fn limit_truncates() {
        let tallies = HashMap::from([(1, tally(3, 0, 1)), (2, tally(2, 0, 1))]);
        assert_eq!(rank(tallies, 10, 1), vec![(1, 3)]);
    }

    #[rstest]
    fn add_posts_keeps_earliest() {
        let mut t = Tally::EMPTY;
        t.add_posts(Some(2), at(500));
        t.add_posts(None, at(100));
        assert_eq!(t.likes, 2);
        assert_eq!(t.first_contribution, at(100));
    }
}
