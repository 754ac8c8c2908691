use anyhow::Result;
use rollbook::export::{self, ExportOptions};
use rollbook::{SearchFilters, EXPORT_ROW_LIMIT};

#[path = "util.rs"]
mod util;

fn kumar_filter() -> SearchFilters {
    SearchFilters {
        last_name: Some("kumar".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn export_writes_display_headers_and_all_matches() -> Result<()> {
    let pool = util::memory_pool().await;
    util::seed_voters(&pool).await;
    let dir = tempfile::tempdir()?;

    let entry = export::export_search(
        &pool,
        "voters",
        &SearchFilters {
            locality: Some("Rohini".to_string()),
            ..Default::default()
        },
        &ExportOptions {
            out_dir: dir.path().to_path_buf(),
        },
    )
    .await?;

    assert_eq!(entry.rows_written, 2);
    assert_eq!(entry.total_matches, 2);
    assert!(!entry.truncated);
    let name = entry.path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("voter_search_") && name.ends_with(".csv"), "got {name}");

    let contents = std::fs::read_to_string(&entry.path)?;
    let mut lines = contents.lines();
    assert_eq!(
        lines.next(),
        Some(
            "Locality,House Number,First Name,Last Name,Relation,\
             Relation First Name,Relation Last Name,Gender"
        )
    );
    assert_eq!(lines.count(), 2);
    Ok(())
}

#[tokio::test]
async fn oversized_result_set_is_truncated_and_flagged() -> Result<()> {
    let pool = util::memory_pool().await;
    util::create_voters_table(&pool, "voters").await;
    util::insert_bulk(&pool, "voters", "Kumar", 15_000).await;
    let dir = tempfile::tempdir()?;

    let entry = export::export_search(
        &pool,
        "voters",
        &kumar_filter(),
        &ExportOptions {
            out_dir: dir.path().to_path_buf(),
        },
    )
    .await?;

    assert_eq!(entry.rows_written as i64, EXPORT_ROW_LIMIT);
    assert_eq!(entry.total_matches, 15_000);
    assert!(entry.truncated);

    let contents = std::fs::read_to_string(&entry.path)?;
    // Header plus exactly the capped row count.
    assert_eq!(contents.lines().count() as i64, EXPORT_ROW_LIMIT + 1);
    Ok(())
}

#[tokio::test]
async fn export_rejects_empty_filters() {
    let pool = util::memory_pool().await;
    let dir = tempfile::tempdir().unwrap();

    let err = export::export_search(
        &pool,
        "voters",
        &SearchFilters::default(),
        &ExportOptions {
            out_dir: dir.path().to_path_buf(),
        },
    )
    .await
    .expect_err("export with no filters must be rejected");
    assert_eq!(err.code(), "SEARCH/NO_FILTERS");
}
