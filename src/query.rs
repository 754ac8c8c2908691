//! Parameterized query builders over a loaded voter table.
//!
//! Every user-supplied value is a bound parameter; identifiers (table names,
//! column lists, ORDER BY targets) are checked against the live schema via
//! [`crate::schema`] before they reach a SQL string. Name filters match
//! case-insensitive substrings, locality and house number match exactly.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{sqlite::SqliteRow, Column, Row, SqlitePool, TypeInfo, ValueRef};

use crate::{schema, AppError, AppResult};

/// Columns shown by the paginated search, in display order. Intersected with
/// the live schema at query time; if none survive, all columns are shown.
pub const DISPLAY_COLUMNS: &[&str] = &[
    "locality",
    "house_number",
    "first_name",
    "last_name",
    "relation",
    "relation_first_name",
    "relation_last_name",
    "gender",
];

/// Dropdown sentinel meaning "do not filter by locality".
pub const LOCALITY_ALL: &str = "All";

/// Optional filter values for the paginated multi-field search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub locality: Option<String>,
    pub relation_first_name: Option<String>,
    pub relation_last_name: Option<String>,
}

impl SearchFilters {
    /// True when no filter would contribute a predicate. An all-empty filter
    /// set is rejected before any database round trip.
    pub fn is_empty(&self) -> bool {
        normalized(&self.first_name).is_none()
            && normalized(&self.last_name).is_none()
            && self.locality_value().is_none()
            && normalized(&self.relation_first_name).is_none()
            && normalized(&self.relation_last_name).is_none()
    }

    fn locality_value(&self) -> Option<&str> {
        normalized(&self.locality).filter(|v| *v != LOCALITY_ALL)
    }
}

fn normalized(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// One page of search results plus the total match count.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub columns: Vec<String>,
    pub rows: Vec<Value>,
    pub total: i64,
}

/// Aggregate numbers shown above the results pane.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TableStats {
    pub total_records: i64,
    pub unique_localities: i64,
}

/// One row of the age histogram.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeBucket {
    pub age_group: String,
    pub count: i64,
    pub percentage: f64,
}

/// Substring/exact predicates for the stored filter set.
///
/// Returns `(condition SQL, bind values)` with one `?` per value.
fn build_predicates(filters: &SearchFilters) -> (Vec<String>, Vec<String>) {
    let mut conditions = Vec::new();
    let mut binds = Vec::new();

    push_like(&mut conditions, &mut binds, "first_name", normalized(&filters.first_name));
    push_like(&mut conditions, &mut binds, "last_name", normalized(&filters.last_name));

    if let Some(locality) = filters.locality_value() {
        conditions.push("locality = ?".to_string());
        binds.push(locality.to_string());
    }

    push_like(
        &mut conditions,
        &mut binds,
        "relation_first_name",
        normalized(&filters.relation_first_name),
    );
    push_like(
        &mut conditions,
        &mut binds,
        "relation_last_name",
        normalized(&filters.relation_last_name),
    );

    (conditions, binds)
}

fn push_like(conditions: &mut Vec<String>, binds: &mut Vec<String>, column: &str, value: Option<&str>) {
    if let Some(v) = value {
        conditions.push(format!("LOWER({column}) LIKE LOWER(?)"));
        binds.push(format!("%{v}%"));
    }
}

/// Paginated multi-field search: a `COUNT(*)` round trip for the total, then
/// the bounded page query. Sort order is the first selected display column,
/// ascending.
pub async fn search_paginated(
    pool: &SqlitePool,
    table: &str,
    filters: &SearchFilters,
    offset: i64,
    limit: i64,
) -> AppResult<SearchPage> {
    if filters.is_empty() {
        return Err(AppError::new(
            "SEARCH/NO_FILTERS",
            "Provide at least one search criterion",
        ));
    }

    let available = schema::table_columns(pool, table).await?;
    let select_columns = select_list(&available);
    let (conditions, binds) = build_predicates(filters);
    let where_clause = conditions.join(" AND ");

    let count_sql = format!("SELECT COUNT(*) FROM \"{table}\" WHERE {where_clause}");
    let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql);
    for bind in &binds {
        count_query = count_query.bind(bind);
    }
    let (total,) = count_query.fetch_one(pool).await.map_err(AppError::from)?;

    let select_clause = select_columns
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let page_sql = format!(
        "SELECT {select_clause} FROM \"{table}\" WHERE {where_clause} \
         ORDER BY \"{}\" ASC LIMIT ? OFFSET ?",
        select_columns[0]
    );
    let mut page_query = sqlx::query(&page_sql);
    for bind in &binds {
        page_query = page_query.bind(bind);
    }
    let rows = page_query
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(AppError::from)?;

    Ok(SearchPage {
        columns: select_columns,
        rows: rows.into_iter().map(row_to_value).collect(),
        total,
    })
}

/// Distinct non-empty localities, sorted, for the dropdown.
pub async fn distinct_localities(pool: &SqlitePool, table: &str) -> AppResult<Vec<String>> {
    require_column(pool, table, "locality").await?;
    let sql = format!(
        "SELECT DISTINCT locality FROM \"{table}\" \
         WHERE locality IS NOT NULL AND locality != '' ORDER BY locality"
    );
    let rows: Vec<(String,)> = sqlx::query_as(&sql).fetch_all(pool).await.map_err(AppError::from)?;
    Ok(rows.into_iter().map(|(l,)| l).collect())
}

/// Total record count plus distinct-locality count. A missing locality
/// column reports zero localities rather than failing.
pub async fn table_stats(pool: &SqlitePool, table: &str) -> AppResult<TableStats> {
    let columns = schema::table_columns(pool, table).await?;
    let total_records = schema::row_count(pool, table).await?;
    let unique_localities = if columns.iter().any(|c| c.name == "locality") {
        let sql = format!(
            "SELECT COUNT(DISTINCT locality) FROM \"{table}\" WHERE locality IS NOT NULL"
        );
        let (n,): (i64,) = sqlx::query_as(&sql).fetch_one(pool).await.map_err(AppError::from)?;
        n
    } else {
        0
    };

    Ok(TableStats {
        total_records,
        unique_localities,
    })
}

/// Case-insensitive substring lookup on locality, ordered by name.
pub async fn lookup_locality(
    pool: &SqlitePool,
    table: &str,
    locality: &str,
) -> AppResult<SearchPage> {
    let locality = locality.trim();
    if locality.is_empty() {
        return Err(AppError::new("SEARCH/NO_FILTERS", "Provide a locality name"));
    }
    require_column(pool, table, "locality").await?;

    let available = schema::table_columns(pool, table).await?;
    let desired = ["locality", "polling_area", "first_name", "last_name", "age", "gender"];
    let select_columns = intersect(&desired, &available);
    let select_clause = select_columns
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let order_clause = order_list(&["last_name", "first_name"], &available);

    let sql = format!(
        "SELECT {select_clause} FROM \"{table}\" \
         WHERE LOWER(locality) LIKE LOWER(?){order_clause}"
    );
    let rows = sqlx::query(&sql)
        .bind(format!("%{locality}%"))
        .fetch_all(pool)
        .await
        .map_err(AppError::from)?;

    let total = rows.len() as i64;
    Ok(SearchPage {
        columns: select_columns,
        rows: rows.into_iter().map(row_to_value).collect(),
        total,
    })
}

/// Free-text person search: substring on names, exact on house number.
pub async fn search_person(
    pool: &SqlitePool,
    table: &str,
    first_name: Option<&str>,
    last_name: Option<&str>,
    house_number: Option<&str>,
) -> AppResult<SearchPage> {
    let mut conditions = Vec::new();
    let mut binds = Vec::new();

    for (column, value) in [("first_name", first_name), ("last_name", last_name)] {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            conditions.push(format!("LOWER({column}) LIKE LOWER(?)"));
            binds.push(format!("%{v}%"));
        }
    }
    if let Some(v) = house_number.map(str::trim).filter(|v| !v.is_empty()) {
        conditions.push("house_number = ?".to_string());
        binds.push(v.to_string());
    }

    if conditions.is_empty() {
        return Err(AppError::new(
            "SEARCH/NO_FILTERS",
            "Provide at least one search criterion",
        ));
    }

    let available = schema::table_columns(pool, table).await?;
    let order_clause = order_list(
        &["locality", "polling_area", "last_name", "first_name"],
        &available,
    );
    let columns: Vec<String> = available.iter().map(|c| c.name.clone()).collect();

    let sql = format!(
        "SELECT * FROM \"{table}\" WHERE {}{order_clause}",
        conditions.join(" AND ")
    );
    let mut query = sqlx::query(&sql);
    for bind in &binds {
        query = query.bind(bind);
    }
    let rows = query.fetch_all(pool).await.map_err(AppError::from)?;

    let total = rows.len() as i64;
    Ok(SearchPage {
        columns,
        rows: rows.into_iter().map(row_to_value).collect(),
        total,
    })
}

/// Fixed-bucket age histogram with per-bucket percentage of the total.
pub async fn age_distribution(pool: &SqlitePool, table: &str) -> AppResult<Vec<AgeBucket>> {
    require_column(pool, table, "age").await?;
    let sql = format!(
        "SELECT \
            CASE \
                WHEN age BETWEEN 18 AND 25 THEN '18-25' \
                WHEN age BETWEEN 26 AND 35 THEN '26-35' \
                WHEN age BETWEEN 36 AND 45 THEN '36-45' \
                WHEN age BETWEEN 46 AND 55 THEN '46-55' \
                WHEN age BETWEEN 56 AND 65 THEN '56-65' \
                WHEN age > 65 THEN '65+' \
                ELSE 'Unknown' \
            END AS age_group, \
            COUNT(*) AS count, \
            ROUND(COUNT(*) * 100.0 / SUM(COUNT(*)) OVER (), 2) AS percentage \
         FROM \"{table}\" \
         GROUP BY age_group \
         ORDER BY age_group"
    );
    let rows: Vec<(String, i64, f64)> =
        sqlx::query_as(&sql).fetch_all(pool).await.map_err(AppError::from)?;
    Ok(rows
        .into_iter()
        .map(|(age_group, count, percentage)| AgeBucket {
            age_group,
            count,
            percentage,
        })
        .collect())
}

fn select_list(available: &[schema::ColumnInfo]) -> Vec<String> {
    let picked = intersect(DISPLAY_COLUMNS, available);
    if picked.is_empty() {
        available.iter().map(|c| c.name.clone()).collect()
    } else {
        picked
    }
}

fn intersect(desired: &[&str], available: &[schema::ColumnInfo]) -> Vec<String> {
    desired
        .iter()
        .filter(|d| available.iter().any(|c| c.name == **d))
        .map(|d| d.to_string())
        .collect()
}

fn order_list(desired: &[&str], available: &[schema::ColumnInfo]) -> String {
    let cols = intersect(desired, available);
    if cols.is_empty() {
        String::new()
    } else {
        let quoted: Vec<String> = cols.iter().map(|c| format!("\"{c}\"")).collect();
        format!(" ORDER BY {}", quoted.join(", "))
    }
}

/// Decode a dynamically-typed row into a JSON object keyed by column name.
pub fn row_to_value(row: SqliteRow) -> Value {
    let mut map = Map::new();
    for col in row.columns() {
        let idx = col.ordinal();
        let v = row.try_get_raw(idx).ok();
        let val = match v {
            Some(raw) => {
                if raw.is_null() {
                    Value::Null
                } else {
                    match raw.type_info().name() {
                        "INTEGER" => row
                            .try_get::<i64, _>(idx)
                            .map(Value::from)
                            .unwrap_or(Value::Null),
                        "REAL" => row
                            .try_get::<f64, _>(idx)
                            .map(Value::from)
                            .unwrap_or(Value::Null),
                        _ => row
                            .try_get::<String, _>(idx)
                            .map(Value::from)
                            .unwrap_or(Value::Null),
                    }
                }
            }
            None => Value::Null,
        };
        map.insert(col.name().to_string(), val);
    }
    Value::Object(map)
}

async fn require_column(pool: &SqlitePool, table: &str, column: &str) -> AppResult<()> {
    let columns = schema::table_columns(pool, table).await?;
    if columns.iter().any(|c| c.name == column) {
        Ok(())
    } else {
        Err(AppError::new("SCHEMA/NO_COLUMN", "Column not found in table")
            .with_context("table", table.to_string())
            .with_context("column", column.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filters_are_detected() {
        let filters = SearchFilters::default();
        assert!(filters.is_empty());

        let all_sentinel = SearchFilters {
            locality: Some(LOCALITY_ALL.to_string()),
            ..Default::default()
        };
        assert!(all_sentinel.is_empty());

        let whitespace_only = SearchFilters {
            first_name: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(whitespace_only.is_empty());
    }

    #[test]
    fn locality_predicate_is_exact_names_are_substring() {
        let filters = SearchFilters {
            first_name: Some("ali".to_string()),
            locality: Some("Karol Bagh".to_string()),
            ..Default::default()
        };
        let (conditions, binds) = build_predicates(&filters);
        assert_eq!(
            conditions,
            vec![
                "LOWER(first_name) LIKE LOWER(?)".to_string(),
                "locality = ?".to_string()
            ]
        );
        assert_eq!(binds, vec!["%ali%".to_string(), "Karol Bagh".to_string()]);
    }
}
