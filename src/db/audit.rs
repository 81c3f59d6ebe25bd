//! Backend capability audits run before the daemon accepts connections.
//!
//! Counter adjustments and inserts rely on `RETURNING`, which `SQLite` only
//! supports from 3.35. Postgres deployments must run 14 or newer.

use diesel::{
    QueryableByName,
    result::{Error as DieselError, QueryResult},
    sql_query,
    sql_types::Text,
};
use diesel_async::RunQueryDsl;

use super::connection::DbConnection;

#[derive(QueryableByName)]
struct VersionRow {
    #[diesel(sql_type = Text)]
    version: String,
}

fn unsupported(msg: String) -> DieselError {
    DieselError::QueryBuilderError(Box::new(std::io::Error::other(msg)))
}

/// Parse the leading `major.minor` pair from a version string.
fn parse_version(text: &str) -> Option<(u32, u32)> {
    let mut parts = text.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts
        .next()
        .map_or(Some(0), |m| {
            m.chars()
                .take_while(char::is_ascii_digit)
                .collect::<String>()
                .parse()
                .ok()
        })?;
    Some((major, minor))
}

/// Verify that `SQLite` supports the statements the application issues.
///
/// # Errors
/// Returns any error produced by the version query, or an error when the
/// library is older than 3.35.
#[cfg(feature = "sqlite")]
#[must_use = "handle the result"]
pub async fn audit_sqlite_features(conn: &mut DbConnection) -> QueryResult<()> {
    let row: VersionRow = sql_query("SELECT sqlite_version() AS version")
        .get_result(conn)
        .await?;
    let version = parse_version(&row.version)
        .ok_or_else(|| unsupported(format!("unable to parse sqlite version: {}", row.version)))?;
    if version < (3, 35) {
        return Err(unsupported(format!(
            "sqlite {} lacks RETURNING support (require >= 3.35)",
            row.version
        )));
    }
    Ok(())
}

/// Verify that the Postgres server meets application requirements.
///
/// # Errors
/// Returns any error produced by the version query or if the server is older
/// than 14.
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
#[must_use = "handle the result"]
pub async fn audit_postgres_features(conn: &mut DbConnection) -> QueryResult<()> {
    let row: VersionRow = sql_query("SELECT current_setting('server_version') AS version")
        .get_result(conn)
        .await?;
    let (major, _) = parse_version(&row.version)
        .ok_or_else(|| unsupported(format!("unable to parse postgres version: {}", row.version)))?;
    if major < 14 {
        return Err(unsupported(format!(
            "postgres version {major} is not supported (require >= 14)"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::parse_version;

    #[rstest]
    #[case("3.45.1", Some((3, 45)))]
    #[case("14.2 (Debian 14.2-1)", Some((14, 2)))]
    #[case("16", Some((16, 0)))]
    #[case("garbage", None)]
    fn parses_major_minor(#[case] text: &str, #[case] expected: Option<(u32, u32)>) {
        assert_eq!(parse_version(text), expected);
    }
}
