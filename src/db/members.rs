//! Member directory used to render display names.

use std::collections::HashMap;

use chrono::Utc;
use diesel::{prelude::*, result::QueryResult, upsert::excluded};
use diesel_async::RunQueryDsl;

use super::{connection::DbConnection, validate};
use crate::{
    error::ForumResult,
    models::{Member, NewMember},
};

/// Insert a member or rename an existing one.
///
/// # Errors
/// Returns [`crate::error::ForumError::Validation`] for a blank or overlong
/// name, or any database error.
#[must_use = "handle the result"]
pub async fn upsert_member(
    conn: &mut DbConnection,
    id: i32,
    display_name: &str,
) -> ForumResult<Member> {
    use crate::schema::members::dsl as m;
    let display_name = validate::required_text("display name", display_name, validate::MAX_NAME_CHARS)?;
    let row = NewMember {
        id,
        display_name,
        created_at: Utc::now().naive_utc(),
    };
    let member = diesel::insert_into(m::members)
        .values(&row)
        .on_conflict(m::id)
        .do_update()
        .set(m::display_name.eq(excluded(m::display_name)))
        .returning(Member::as_returning())
        .get_result(conn)
        .await?;
    Ok(member)
}

/// Fetch display names for `ids`. Unknown identifiers are simply absent.
///
/// # Errors
/// Returns any error produced by the query.
#[must_use = "handle the result"]
pub async fn display_names(
    conn: &mut DbConnection,
    ids: &[i32],
) -> QueryResult<HashMap<i32, String>> {
    use crate::schema::members::dsl as m;
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(i32, String)> = m::members
        .filter(m::id.eq_any(ids))
        .select((m::id, m::display_name))
        .load(conn)
        .await?;
    Ok(rows.into_iter().collect())
}

/// Name shown for members missing from the directory.
#[must_use]
pub fn fallback_name(id: i32) -> String { format!("member #{id}") }
