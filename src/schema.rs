//! Schema introspection and identifier hygiene.
//!
//! Anything that ends up inside a SQL statement without a bind slot (table
//! names, column lists, ORDER BY targets) must come through here first:
//! identifiers are sanitized on load and checked against the live schema on
//! query, never taken from user input verbatim.

use sqlx::SqlitePool;

use crate::{AppError, AppResult};

/// Column name/declared type pair as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub ty: String,
}

pub async fn table_exists(pool: &SqlitePool, table: &str) -> AppResult<bool> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_optional(pool)
            .await
            .map_err(AppError::from)?;
    Ok(row.is_some())
}

/// Columns of `table` in declaration order. Errors with `SCHEMA/NO_TABLE`
/// when the table does not exist.
pub async fn table_columns(pool: &SqlitePool, table: &str) -> AppResult<Vec<ColumnInfo>> {
    ensure_identifier(table)?;
    if !table_exists(pool, table).await? {
        return Err(AppError::new("SCHEMA/NO_TABLE", "Table not found in database")
            .with_context("table", table.to_string()));
    }
    let rows: Vec<(i64, String, String)> =
        sqlx::query_as(&format!("SELECT cid, name, type FROM pragma_table_info('{table}')"))
            .fetch_all(pool)
            .await
            .map_err(AppError::from)?;
    Ok(rows
        .into_iter()
        .map(|(_, name, ty)| ColumnInfo { name, ty })
        .collect())
}

pub async fn row_count(pool: &SqlitePool, table: &str) -> AppResult<i64> {
    ensure_identifier(table)?;
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM \"{table}\""))
        .fetch_one(pool)
        .await
        .map_err(AppError::from)?;
    Ok(count)
}

/// Rejects anything that is not a plain `[A-Za-z_][A-Za-z0-9_]*` identifier.
pub fn ensure_identifier(name: &str) -> AppResult<()> {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if head_ok && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(AppError::new("SCHEMA/BAD_IDENTIFIER", "Invalid SQL identifier")
            .with_context("identifier", name.to_string()))
    }
}

/// Turn an arbitrary CSV header cell into a usable column identifier.
///
/// Mirrors what an auto-detecting loader does with messy headers: trim,
/// lowercase, squash runs of non-alphanumerics to a single underscore, and
/// prefix names that start with a digit.
pub fn sanitize_identifier(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_underscore = false;
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_underscore = false;
        } else if !last_underscore && !out.is_empty() {
            out.push('_');
            last_underscore = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    if out.is_empty() {
        out.push_str("column");
    }
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, 'c');
        out.insert(1, '_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_messy_headers() {
        assert_eq!(sanitize_identifier("First Name"), "first_name");
        assert_eq!(sanitize_identifier("  Relation's Last-Name "), "relation_s_last_name");
        assert_eq!(sanitize_identifier("2024_ward"), "c_2024_ward");
        assert_eq!(sanitize_identifier("!!!"), "column");
    }

    #[test]
    fn rejects_injection_shaped_identifiers() {
        assert!(ensure_identifier("voters").is_ok());
        assert!(ensure_identifier("voters; DROP TABLE voters").is_err());
        assert!(ensure_identifier("").is_err());
        assert!(ensure_identifier("1voters").is_err());
    }
}
