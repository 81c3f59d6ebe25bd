//! Category records.

use chrono::Utc;
use diesel::{prelude::*, result::QueryResult};
use diesel_async::RunQueryDsl;

use super::{connection::DbConnection, validate};
use crate::{
    error::{ForumResult, conflict_on_unique},
    models::{Category, NewCategory},
};

/// Insert a new category with a zero topic count.
///
/// # Errors
/// Returns [`crate::error::ForumError::Validation`] for a malformed slug or
/// name and [`crate::error::ForumError::Conflict`] when the slug is taken.
#[must_use = "handle the result"]
pub async fn create_category(
    conn: &mut DbConnection,
    slug: &str,
    name: &str,
) -> ForumResult<Category> {
    use crate::schema::categories::dsl as c;
    let slug = validate::slug(slug)?;
    let name = validate::required_text("category name", name, validate::MAX_NAME_CHARS)?;
    let row = NewCategory {
        slug,
        name,
        created_at: Utc::now().naive_utc(),
    };
    diesel::insert_into(c::categories)
        .values(&row)
        .returning(Category::as_returning())
        .get_result(conn)
        .await
        .map_err(|e| conflict_on_unique(e, &format!("category '{slug}' already exists")))
}

/// Look up a category by slug.
///
/// # Errors
/// Returns any error produced by the query.
#[must_use = "handle the result"]
pub async fn category_by_slug(conn: &mut DbConnection, slug: &str) -> QueryResult<Option<Category>> {
    use crate::schema::categories::dsl as c;
    c::categories
        .filter(c::slug.eq(slug))
        .select(Category::as_select())
        .first(conn)
        .await
        .optional()
}

/// Look up a category by id.
///
/// # Errors
/// Returns any error produced by the query.
#[must_use = "handle the result"]
pub async fn category_by_id(conn: &mut DbConnection, id: i32) -> QueryResult<Option<Category>> {
    use crate::schema::categories::dsl as c;
    c::categories
        .find(id)
        .select(Category::as_select())
        .first(conn)
        .await
        .optional()
}

/// List all categories ordered by name.
///
/// # Errors
/// Returns any error produced by the query.
#[must_use = "handle the result"]
pub async fn list_categories(conn: &mut DbConnection) -> QueryResult<Vec<Category>> {
    use crate::schema::categories::dsl as c;
    c::categories
        .order((c::name.asc(), c::id.asc()))
        .select(Category::as_select())
        .load(conn)
        .await
}
