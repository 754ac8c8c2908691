use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite, SqlitePool};

use crate::{AppError, AppResult};

/// Open the database file for loading. The file is created if missing and
/// writes go through WAL.
pub async fn open_rw_pool(db_path: &Path) -> AppResult<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::from(e)
                    .with_context("operation", "create_db_parent")
                    .with_context("path", parent.display().to_string())
            })?;
        }
    }
    let opts = connect_options(db_path)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full);
    open_with(opts).await
}

/// Open an existing database file for queries. Fails fast when the file is
/// absent instead of silently creating an empty database.
pub async fn open_ro_pool(db_path: &Path) -> AppResult<SqlitePool> {
    if !db_path.exists() {
        return Err(AppError::new(
            "DB/NOT_FOUND",
            "Database file not found. Load a delimited file first.",
        )
        .with_context("path", db_path.display().to_string()));
    }
    let opts = connect_options(db_path)?.read_only(true);
    open_with(opts).await
}

fn connect_options(db_path: &Path) -> AppResult<SqliteConnectOptions> {
    let path_str = db_path.to_str().ok_or_else(|| {
        AppError::new("DB/INVALID_PATH", "Database path is not valid UTF-8")
            .with_context("path", db_path.display().to_string())
    })?;
    SqliteConnectOptions::from_str(path_str).map_err(AppError::from)
}

async fn open_with(opts: SqliteConnectOptions) -> AppResult<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .after_connect(|conn, _| {
            Box::pin(async move {
                sqlx::query("PRAGMA busy_timeout = 5000;")
                    .execute(&mut *conn)
                    .await?;
                Ok::<_, sqlx::Error>(())
            })
        })
        .connect_with(opts)
        .await
        .map_err(AppError::from)?;

    log_effective_pragmas(&pool).await;

    Ok(pool)
}

async fn log_effective_pragmas(pool: &Pool<Sqlite>) {
    use tracing::info;

    let (sqlite_ver,): (String,) = sqlx::query_as("select sqlite_version()")
        .fetch_one(pool)
        .await
        .unwrap_or((String::from("unknown"),));

    let jm: (String,) = sqlx::query_as("PRAGMA journal_mode;")
        .fetch_one(pool)
        .await
        .unwrap_or((String::from("unknown"),));

    let busy: (i64,) = sqlx::query_as("PRAGMA busy_timeout;")
        .fetch_one(pool)
        .await
        .unwrap_or((i64::MIN,));

    info!(
        target = "rollbook",
        event = "db_pragmas",
        sqlite_version = %sqlite_ver,
        journal_mode = %jm.0,
        busy_timeout = busy.0,
    );
}
