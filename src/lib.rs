//! Rollbook: voter-record lookup over a local SQLite database.
//!
//! Delimited files are loaded once into a database file ([`loader`]), then
//! queried through parameterized builders ([`query`]) and a paginated
//! terminal session ([`session`], [`ui`]). Data flows one direction:
//! delimited files -> database table -> query layer -> presentation.

use tracing_subscriber::EnvFilter;

pub mod db;
pub mod error;
pub mod export;
pub mod loader;
pub mod query;
pub mod schema;
pub mod session;
pub mod ui;

pub use error::{AppError, AppResult};
pub use export::{ExportEntry, ExportOptions, EXPORT_ROW_LIMIT};
pub use loader::LoadReport;
pub use query::{AgeBucket, SearchFilters, SearchPage, TableStats, LOCALITY_ALL};
pub use session::{SearchSession, SessionError, DEFAULT_PAGE_SIZE, PAGE_SIZES};

/// Install the global tracing subscriber. Safe to call more than once; later
/// calls are ignored.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rollbook=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
