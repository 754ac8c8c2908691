use anyhow::Result;
use rollbook::{SearchFilters, SearchSession};

#[path = "util.rs"]
mod util;

#[tokio::test]
async fn submit_runs_count_then_first_page() -> Result<()> {
    let pool = util::memory_pool().await;
    util::create_voters_table(&pool, "voters").await;
    util::insert_bulk(&pool, "voters", "Kumar", 45).await;

    let mut session = SearchSession::new("voters");
    session.submit(SearchFilters {
        last_name: Some("kumar".to_string()),
        ..Default::default()
    })?;

    let page = session.run(&pool).await?;
    assert_eq!(page.total, 45);
    assert_eq!(page.rows.len(), 20);
    assert_eq!(session.total(), 45);
    assert_eq!(session.page_count(), 3);
    assert_eq!(session.start_record(), 1);
    assert_eq!(session.end_record(), 20);
    Ok(())
}

#[tokio::test]
async fn pagination_walks_the_window_forward() -> Result<()> {
    let pool = util::memory_pool().await;
    util::create_voters_table(&pool, "voters").await;
    util::insert_bulk(&pool, "voters", "Kumar", 45).await;

    let mut session = SearchSession::new("voters");
    session.submit(SearchFilters {
        last_name: Some("kumar".to_string()),
        ..Default::default()
    })?;
    session.run(&pool).await?;

    assert!(session.last_page());
    let page = session.run(&pool).await?;
    assert_eq!(page.rows.len(), 5);
    assert_eq!(session.start_record(), 41);
    assert_eq!(session.end_record(), 45);

    // Already clamped at the end.
    assert!(!session.next_page());
    Ok(())
}

#[tokio::test]
async fn page_size_change_refetches_from_the_start() -> Result<()> {
    let pool = util::memory_pool().await;
    util::create_voters_table(&pool, "voters").await;
    util::insert_bulk(&pool, "voters", "Kumar", 120).await;

    let mut session = SearchSession::new("voters");
    session.submit(SearchFilters {
        last_name: Some("kumar".to_string()),
        ..Default::default()
    })?;
    session.run(&pool).await?;
    session.next_page();
    session.run(&pool).await?;
    assert_eq!(session.page(), 1);

    session.set_rows_per_page(100)?;
    assert_eq!(session.page(), 0);
    let page = session.run(&pool).await?;
    assert_eq!(page.rows.len(), 100);
    assert_eq!(session.page_count(), 2);
    Ok(())
}

#[tokio::test]
async fn run_without_submission_is_rejected() {
    let pool = util::memory_pool().await;
    let mut session = SearchSession::new("voters");
    let err = session
        .run(&pool)
        .await
        .expect_err("running before any submission must fail");
    assert_eq!(err.code(), "SESSION/NO_SEARCH");
}

#[tokio::test]
async fn session_export_reuses_stored_filters() -> Result<()> {
    let pool = util::memory_pool().await;
    util::seed_voters(&pool).await;
    let dir = tempfile::tempdir()?;

    let mut session = SearchSession::new("voters");
    session.submit(SearchFilters {
        locality: Some("Rohini".to_string()),
        ..Default::default()
    })?;
    session.run(&pool).await?;

    let entry = session.export(&pool, dir.path()).await?;
    assert_eq!(entry.rows_written, 2);
    assert!(!entry.truncated);
    assert!(entry.path.exists());
    Ok(())
}
