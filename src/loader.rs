//! One-shot delimited-file loader.
//!
//! Reads a CSV file with a header row and materializes it as a SQLite table.
//! The schema is inferred the way an auto-detecting reader would: column
//! names come from the (sanitized) header, column types from sampling the
//! first [`SAMPLE_ROWS`] records. Empty fields load as NULL. The whole
//! insert runs in a single transaction; any reader error aborts the load.

use std::path::{Path, PathBuf};

use sqlx::SqlitePool;
use tracing::info;

use crate::schema::{sanitize_identifier, ColumnInfo};
use crate::{schema, AppError, AppResult};

/// Number of records sampled for type inference.
pub const SAMPLE_ROWS: usize = 1024;

/// Outcome of a single file load, printed by the CLI.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LoadReport {
    pub table: String,
    pub source: PathBuf,
    pub rows: u64,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InferredType {
    Integer,
    Real,
    Text,
}

impl InferredType {
    fn sql_type(self) -> &'static str {
        match self {
            InferredType::Integer => "INTEGER",
            InferredType::Real => "REAL",
            InferredType::Text => "TEXT",
        }
    }
}

/// Load one delimited file into `table`.
pub async fn load_csv(pool: &SqlitePool, path: &Path, table: &str) -> AppResult<LoadReport> {
    schema::ensure_identifier(table)?;
    if !path.is_file() {
        return Err(AppError::new("LOAD/FILE_MISSING", "Input file not found")
            .with_context("path", path.display().to_string()));
    }

    let columns = infer_columns(path)?;
    create_table(pool, table, &columns).await?;
    let rows = insert_rows(pool, path, table, &columns).await?;

    info!(
        target = "rollbook",
        event = "load_complete",
        table = %table,
        rows,
        columns = columns.len(),
    );

    Ok(LoadReport {
        table: table.to_string(),
        source: path.to_path_buf(),
        rows,
        columns: columns
            .iter()
            .map(|(name, ty)| ColumnInfo {
                name: name.clone(),
                ty: ty.sql_type().to_string(),
            })
            .collect(),
    })
}

/// Load every `*.csv` in `dir` into `<prefix>_1`, `<prefix>_2`, ... tables.
pub async fn load_dir(pool: &SqlitePool, dir: &Path, prefix: &str) -> AppResult<Vec<LoadReport>> {
    schema::ensure_identifier(prefix)?;
    if !dir.is_dir() {
        return Err(AppError::new("LOAD/DIR_MISSING", "Input directory not found")
            .with_context("path", dir.display().to_string()));
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(AppError::from)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(AppError::new("LOAD/NO_FILES", "No CSV files found in directory")
            .with_context("path", dir.display().to_string()));
    }

    let mut reports = Vec::with_capacity(files.len());
    for (i, file) in files.iter().enumerate() {
        let table = format!("{prefix}_{}", i + 1);
        reports.push(load_csv(pool, file, &table).await?);
    }
    Ok(reports)
}

/// First pass: header names plus sampled types.
fn infer_columns(path: &Path) -> AppResult<Vec<(String, InferredType)>> {
    let mut reader = csv::Reader::from_path(path).map_err(AppError::from)?;
    let headers = reader.headers().map_err(AppError::from)?.clone();
    if headers.is_empty() {
        return Err(AppError::new("LOAD/MALFORMED", "Input file has no header row")
            .with_context("path", path.display().to_string()));
    }

    let names = dedupe_names(headers.iter().map(sanitize_identifier).collect());

    // Start from the narrowest type and widen as samples contradict it.
    let mut types = vec![InferredType::Integer; names.len()];
    let mut seen_value = vec![false; names.len()];

    for (n, record) in reader.records().enumerate() {
        if n >= SAMPLE_ROWS {
            break;
        }
        let record = record.map_err(AppError::from)?;
        for (i, field) in record.iter().enumerate().take(names.len()) {
            let field = field.trim();
            if field.is_empty() {
                continue;
            }
            seen_value[i] = true;
            types[i] = match types[i] {
                InferredType::Integer if field.parse::<i64>().is_ok() => InferredType::Integer,
                InferredType::Integer | InferredType::Real if field.parse::<f64>().is_ok() => {
                    InferredType::Real
                }
                _ => InferredType::Text,
            };
        }
    }

    Ok(names
        .into_iter()
        .zip(types)
        .zip(seen_value)
        .map(|((name, ty), seen)| (name, if seen { ty } else { InferredType::Text }))
        .collect())
}

fn dedupe_names(mut names: Vec<String>) -> Vec<String> {
    for i in 0..names.len() {
        let base = names[i].clone();
        let mut suffix = 1;
        while names[..i].contains(&names[i]) {
            suffix += 1;
            names[i] = format!("{base}_{suffix}");
        }
    }
    names
}

async fn create_table(
    pool: &SqlitePool,
    table: &str,
    columns: &[(String, InferredType)],
) -> AppResult<()> {
    let cols: Vec<String> = columns
        .iter()
        .map(|(name, ty)| format!("\"{name}\" {}", ty.sql_type()))
        .collect();
    let sql = format!("CREATE TABLE \"{table}\" ({})", cols.join(", "));
    sqlx::query(&sql).execute(pool).await.map_err(|e| {
        AppError::from(e).with_context("operation", "create_table").with_context("table", table)
    })?;
    Ok(())
}

/// Second pass: stream records into the table inside one transaction.
async fn insert_rows(
    pool: &SqlitePool,
    path: &Path,
    table: &str,
    columns: &[(String, InferredType)],
) -> AppResult<u64> {
    let names: Vec<String> = columns.iter().map(|(n, _)| format!("\"{n}\"")).collect();
    let placeholders: Vec<&str> = columns.iter().map(|_| "?").collect();
    let sql = format!(
        "INSERT INTO \"{table}\" ({}) VALUES ({})",
        names.join(", "),
        placeholders.join(", ")
    );

    let mut reader = csv::Reader::from_path(path).map_err(AppError::from)?;
    let mut tx = pool.begin().await.map_err(AppError::from)?;
    let mut inserted = 0u64;

    for record in reader.records() {
        let record = record.map_err(AppError::from)?;
        let mut query = sqlx::query(&sql);
        for (i, (_, ty)) in columns.iter().enumerate() {
            let field = record.get(i).map(str::trim).unwrap_or("");
            if field.is_empty() {
                query = query.bind(None::<String>);
                continue;
            }
            query = match ty {
                InferredType::Integer => match field.parse::<i64>() {
                    Ok(v) => query.bind(v),
                    Err(_) => query.bind(field.to_string()),
                },
                InferredType::Real => match field.parse::<f64>() {
                    Ok(v) => query.bind(v),
                    Err(_) => query.bind(field.to_string()),
                },
                InferredType::Text => query.bind(field.to_string()),
            };
        }
        query.execute(&mut *tx).await.map_err(AppError::from)?;
        inserted += 1;
    }

    tx.commit().await.map_err(AppError::from)?;
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupes_colliding_header_names() {
        let names = dedupe_names(vec!["name".into(), "name".into(), "age".into()]);
        assert_eq!(names, vec!["name", "name_2", "age"]);
    }
}
