//! Presentation-layer state for the paginated search.
//!
//! A [`SearchSession`] is the only mutable state in the application: the last
//! submitted filter set, the current page number, and the rows-per-page
//! choice. It is passed explicitly alongside the pool rather than living in
//! ambient globals. Page movement is pure bookkeeping; [`SearchSession::run`]
//! performs the actual count + page round trips.

use std::path::Path;

use sqlx::SqlitePool;
use thiserror::Error;

use crate::export::{self, ExportEntry, ExportOptions};
use crate::query::{self, SearchFilters, SearchPage};
use crate::{AppError, AppResult};

/// Rows-per-page choices offered by the UI.
pub const PAGE_SIZES: &[i64] = &[20, 50, 100];
pub const DEFAULT_PAGE_SIZE: i64 = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("provide at least one search criterion")]
    NoFilters,
    #[error("unsupported rows-per-page value: {0} (choose 20, 50 or 100)")]
    InvalidPageSize(i64),
    #[error("no search has been submitted yet")]
    NoSearch,
}

impl From<SessionError> for AppError {
    fn from(error: SessionError) -> Self {
        let code = match error {
            SessionError::NoFilters => "SEARCH/NO_FILTERS",
            SessionError::InvalidPageSize(_) => "SESSION/PAGE_SIZE",
            SessionError::NoSearch => "SESSION/NO_SEARCH",
        };
        AppError::new(code, error.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct SearchSession {
    table: String,
    filters: Option<SearchFilters>,
    page: i64,
    rows_per_page: i64,
    total: i64,
}

impl SearchSession {
    pub fn new(table: impl Into<String>) -> Self {
        SearchSession {
            table: table.into(),
            filters: None,
            page: 0,
            rows_per_page: DEFAULT_PAGE_SIZE,
            total: 0,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn rows_per_page(&self) -> i64 {
        self.rows_per_page
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    pub fn filters(&self) -> Option<&SearchFilters> {
        self.filters.as_ref()
    }

    /// Store a new filter set and reset pagination. Rejected before any
    /// database call when every filter is empty.
    pub fn submit(&mut self, filters: SearchFilters) -> Result<(), SessionError> {
        if filters.is_empty() {
            return Err(SessionError::NoFilters);
        }
        self.filters = Some(filters);
        self.page = 0;
        self.total = 0;
        Ok(())
    }

    /// Change the page window size; any change snaps back to the first page.
    pub fn set_rows_per_page(&mut self, rows: i64) -> Result<(), SessionError> {
        if !PAGE_SIZES.contains(&rows) {
            return Err(SessionError::InvalidPageSize(rows));
        }
        self.rows_per_page = rows;
        self.page = 0;
        Ok(())
    }

    /// Pages available for the last known total (at least one).
    pub fn page_count(&self) -> i64 {
        if self.total <= 0 {
            1
        } else {
            (self.total + self.rows_per_page - 1) / self.rows_per_page
        }
    }

    pub fn offset(&self) -> i64 {
        self.page * self.rows_per_page
    }

    /// 1-based index of the first record on the current page.
    pub fn start_record(&self) -> i64 {
        self.offset() + 1
    }

    /// 1-based index of the last record on the current page.
    pub fn end_record(&self) -> i64 {
        ((self.page + 1) * self.rows_per_page).min(self.total)
    }

    pub fn first_page(&mut self) -> bool {
        let moved = self.page != 0;
        self.page = 0;
        moved
    }

    pub fn prev_page(&mut self) -> bool {
        if self.page > 0 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    pub fn next_page(&mut self) -> bool {
        if self.page < self.page_count() - 1 {
            self.page += 1;
            true
        } else {
            false
        }
    }

    pub fn last_page(&mut self) -> bool {
        let last = self.page_count() - 1;
        let moved = self.page != last;
        self.page = last;
        moved
    }

    /// Run the stored search for the current page window: one count round
    /// trip, one page round trip.
    pub async fn run(&mut self, pool: &SqlitePool) -> AppResult<SearchPage> {
        let filters = self.filters.as_ref().ok_or(SessionError::NoSearch)?;
        let page = query::search_paginated(
            pool,
            &self.table,
            filters,
            self.offset(),
            self.rows_per_page,
        )
        .await?;
        self.total = page.total;
        Ok(page)
    }

    /// Export the stored search (capped, truncation-flagged).
    pub async fn export(&self, pool: &SqlitePool, out_dir: &Path) -> AppResult<ExportEntry> {
        let filters = self.filters.as_ref().ok_or(SessionError::NoSearch)?;
        let opts = ExportOptions {
            out_dir: out_dir.to_path_buf(),
        };
        export::export_search(pool, &self.table, filters, &opts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submitted_session(total: i64) -> SearchSession {
        let mut session = SearchSession::new("voters");
        session
            .submit(SearchFilters {
                last_name: Some("kumar".into()),
                ..Default::default()
            })
            .unwrap();
        session.total = total;
        session
    }

    #[test]
    fn empty_submission_is_rejected() {
        let mut session = SearchSession::new("voters");
        assert_eq!(
            session.submit(SearchFilters::default()),
            Err(SessionError::NoFilters)
        );
        assert!(session.filters().is_none());
    }

    #[test]
    fn submit_resets_page() {
        let mut session = submitted_session(200);
        session.next_page();
        session.next_page();
        assert_eq!(session.page(), 2);

        session
            .submit(SearchFilters {
                first_name: Some("asha".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(session.page(), 0);
    }

    #[test]
    fn page_size_change_resets_page() {
        let mut session = submitted_session(500);
        session.next_page();
        assert_eq!(session.page(), 1);

        session.set_rows_per_page(50).unwrap();
        assert_eq!(session.rows_per_page(), 50);
        assert_eq!(session.page(), 0);

        assert_eq!(
            session.set_rows_per_page(7),
            Err(SessionError::InvalidPageSize(7))
        );
    }

    #[test]
    fn pagination_clamps_at_both_ends() {
        let mut session = submitted_session(45);
        assert_eq!(session.page_count(), 3);

        assert!(!session.prev_page());
        assert!(session.next_page());
        assert!(session.next_page());
        assert!(!session.next_page());
        assert_eq!(session.page(), 2);

        assert!(session.first_page());
        assert_eq!(session.page(), 0);
        assert!(session.last_page());
        assert_eq!(session.page(), 2);
    }

    #[test]
    fn record_window_is_one_based_and_clamped() {
        let mut session = submitted_session(45);
        session.last_page();
        assert_eq!(session.start_record(), 41);
        assert_eq!(session.end_record(), 45);
    }
}
