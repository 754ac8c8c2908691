#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::io::Write;
use std::path::PathBuf;

pub async fn memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect sqlite::memory:")
}

/// Create and populate a `voters` table with a small fixed fixture.
pub async fn seed_voters(pool: &SqlitePool) {
    create_voters_table(pool, "voters").await;
    let rows = [
        ("Karol Bagh", "KB-1", "12", "Alice", "Sharma", 34, "F", "Father", "Ram", "Sharma"),
        ("Karol Bagh", "KB-1", "14", "Salim", "Khan", 58, "M", "Father", "Aziz", "Khan"),
        ("Karol Bagh North", "KB-7", "3", "Alina", "Verma", 26, "F", "Husband", "Raj", "Verma"),
        ("Rohini", "RH-2", "88", "Bob", "Malik", 71, "M", "Father", "Dev", "Malik"),
        ("Rohini", "RH-2", "88", "Meena", "Malik", 67, "F", "Husband", "Bob", "Malik"),
        ("Saket", "SK-4", "21", "Kavita", "Rao", 19, "F", "Father", "Suresh", "Rao"),
    ];
    for row in rows {
        insert_voter(pool, "voters", row).await;
    }
}

pub async fn create_voters_table(pool: &SqlitePool, table: &str) {
    sqlx::query(&format!(
        "CREATE TABLE {table} (
            locality TEXT,
            polling_area TEXT,
            house_number TEXT,
            first_name TEXT,
            last_name TEXT,
            age INTEGER,
            gender TEXT,
            relation TEXT,
            relation_first_name TEXT,
            relation_last_name TEXT
        )"
    ))
    .execute(pool)
    .await
    .expect("create voters table");
}

pub async fn insert_voter(
    pool: &SqlitePool,
    table: &str,
    row: (&str, &str, &str, &str, &str, i64, &str, &str, &str, &str),
) {
    sqlx::query(&format!(
        "INSERT INTO {table} (locality, polling_area, house_number, first_name, last_name, \
         age, gender, relation, relation_first_name, relation_last_name) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(row.0)
    .bind(row.1)
    .bind(row.2)
    .bind(row.3)
    .bind(row.4)
    .bind(row.5)
    .bind(row.6)
    .bind(row.7)
    .bind(row.8)
    .bind(row.9)
    .execute(pool)
    .await
    .expect("insert voter row");
}

/// Bulk-insert `n` voters sharing `last_name`, first names `fn_0..fn_{n-1}`.
pub async fn insert_bulk(pool: &SqlitePool, table: &str, last_name: &str, n: usize) {
    let mut tx = pool.begin().await.expect("begin tx");
    for chunk_start in (0..n).step_by(500) {
        let chunk_end = (chunk_start + 500).min(n);
        let mut sql = format!(
            "INSERT INTO {table} (locality, polling_area, house_number, first_name, last_name, \
             age, gender, relation, relation_first_name, relation_last_name) VALUES "
        );
        let mut first = true;
        for _ in chunk_start..chunk_end {
            if !first {
                sql.push_str(", ");
            }
            first = false;
            sql.push_str("(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)");
        }
        let mut query = sqlx::query(&sql);
        for i in chunk_start..chunk_end {
            query = query
                // Distinct localities keep the ORDER BY total, so page
                // windows are deterministic.
                .bind(format!("Ward {i:05}"))
                .bind("KB-1")
                .bind(format!("{}", i % 200))
                .bind(format!("fn_{i:05}"))
                .bind(last_name)
                .bind(20 + (i as i64 % 60))
                .bind(if i % 2 == 0 { "F" } else { "M" })
                .bind("Father")
                .bind(format!("rfn_{i:05}"))
                .bind(last_name);
        }
        query.execute(&mut *tx).await.expect("bulk insert chunk");
    }
    tx.commit().await.expect("commit bulk insert");
}

/// Write a CSV fixture and return its path.
pub fn write_csv(dir: &std::path::Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).expect("create fixture csv");
    file.write_all(contents.as_bytes()).expect("write fixture csv");
    path
}
