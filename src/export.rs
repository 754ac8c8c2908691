//! CSV export of a filtered search.
//!
//! Re-runs the stored filter set from offset zero, capped at
//! [`EXPORT_ROW_LIMIT`] rows, and writes the page to a timestamped file with
//! human-readable headers. Callers surface `truncated` to the user when the
//! true match count exceeds the cap.

use std::path::{Path, PathBuf};

use chrono::Local;
use sqlx::SqlitePool;
use tracing::info;

use crate::query::{self, SearchFilters};
use crate::{AppError, AppResult};

/// Hard cap on exported rows.
pub const EXPORT_ROW_LIMIT: i64 = 10_000;

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ExportEntry {
    pub path: PathBuf,
    pub rows_written: u64,
    pub total_matches: i64,
    pub truncated: bool,
}

/// `first_name` -> `First Name`.
pub fn display_header(column: &str) -> String {
    column
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Export up to [`EXPORT_ROW_LIMIT`] rows matching `filters` into
/// `<out_dir>/voter_search_<YYYYmmdd_HHMMSS>.csv`.
pub async fn export_search(
    pool: &SqlitePool,
    table: &str,
    filters: &SearchFilters,
    opts: &ExportOptions,
) -> AppResult<ExportEntry> {
    let page = query::search_paginated(pool, table, filters, 0, EXPORT_ROW_LIMIT).await?;

    std::fs::create_dir_all(&opts.out_dir).map_err(|e| {
        AppError::from(e)
            .with_context("operation", "create_export_dir")
            .with_context("path", opts.out_dir.display().to_string())
    })?;

    let filename = format!("voter_search_{}.csv", Local::now().format("%Y%m%d_%H%M%S"));
    let path = unique_path(&opts.out_dir, &filename);

    let mut writer = csv::Writer::from_path(&path).map_err(AppError::from)?;
    let headers: Vec<String> = page.columns.iter().map(|c| display_header(c)).collect();
    writer.write_record(&headers).map_err(AppError::from)?;

    let mut rows_written = 0u64;
    for row in &page.rows {
        let record: Vec<String> = page
            .columns
            .iter()
            .map(|col| cell_text(row.get(col.as_str())))
            .collect();
        writer.write_record(&record).map_err(AppError::from)?;
        rows_written += 1;
    }
    writer.flush().map_err(AppError::from)?;

    let truncated = page.total > EXPORT_ROW_LIMIT;
    info!(
        target = "rollbook",
        event = "export_complete",
        path = %path.display(),
        rows = rows_written,
        total_matches = page.total,
        truncated,
    );

    Ok(ExportEntry {
        path,
        rows_written,
        total_matches: page.total,
        truncated,
    })
}

fn cell_text(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Avoid clobbering an export written within the same second.
fn unique_path(dir: &Path, filename: &str) -> PathBuf {
    let mut path = dir.join(filename);
    let mut counter = 0;
    while path.exists() {
        counter += 1;
        let stem = filename.trim_end_matches(".csv");
        path = dir.join(format!("{stem}_{counter}.csv"));
    }
    path
}
