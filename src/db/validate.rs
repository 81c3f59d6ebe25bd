//! Input limits shared by the stores.

use crate::error::{ForumError, ForumResult};

/// Longest accepted topic title, in characters.
pub const MAX_TITLE_CHARS: usize = 200;
/// Longest accepted topic or reply body, in characters.
pub const MAX_BODY_CHARS: usize = 20_000;
/// Longest accepted display name or category name, in characters.
pub const MAX_NAME_CHARS: usize = 100;
/// Longest accepted category slug, in characters.
pub const MAX_SLUG_CHARS: usize = 64;
/// Largest page or leaderboard size.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Trim `value` and reject it when empty or longer than `max` characters.
pub(crate) fn required_text<'a>(field: &str, value: &'a str, max: usize) -> ForumResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ForumError::validation(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > max {
        return Err(ForumError::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(trimmed)
}

/// Validate a category slug: lowercase ASCII letters, digits and hyphens.
pub(crate) fn slug(value: &str) -> ForumResult<&str> {
    let value = required_text("slug", value, MAX_SLUG_CHARS)?;
    if value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        Ok(value)
    } else {
        Err(ForumError::validation(
            "slug may only contain lowercase letters, digits and hyphens",
        ))
    }
}

/// Reject sizes outside `1..=MAX_PAGE_SIZE`.
pub(crate) fn page_size(field: &str, value: u32) -> ForumResult<u32> {
    if (1..=MAX_PAGE_SIZE).contains(&value) {
        Ok(value)
    } else {
        Err(ForumError::validation(format!(
            "{field} must be between 1 and {MAX_PAGE_SIZE}"
        )))
    }
}
