//! Terminal presentation: fixed-width result tables and the interactive
//! browse loop (search form, pagination controls, export).
//!
//! One loop iteration maps to one UI event: at most a count query plus a
//! page query. A failed query prints its message and leaves the loop
//! interactive.

use std::io::{self, BufRead, Write};
use std::path::Path;

use serde_json::Value;
use sqlx::SqlitePool;

use crate::export::display_header;
use crate::query::{self, SearchFilters, SearchPage, LOCALITY_ALL};
use crate::session::{SearchSession, PAGE_SIZES};
use crate::AppResult;

const NULL_CELL: &str = "N/A";
const LOCALITY_PREVIEW: usize = 15;

/// Render rows as an aligned text table with display headers.
pub fn render_table(columns: &[String], rows: &[Value]) -> String {
    let headers: Vec<String> = columns.iter().map(|c| display_header(c)).collect();
    let mut widths: Vec<usize> = headers.iter().map(String::len).collect();

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .enumerate()
                .map(|(i, col)| {
                    let text = cell_text(row.get(col.as_str()));
                    widths[i] = widths[i].max(text.len());
                    text
                })
                .collect()
        })
        .collect();

    let mut out = String::new();
    let mut push_row = |cells: &[String]| {
        for (i, cell) in cells.iter().enumerate() {
            if i > 0 {
                out.push_str("  ");
            }
            out.push_str(&format!("{cell:<width$}", width = widths[i]));
        }
        while out.ends_with(' ') {
            out.pop();
        }
        out.push('\n');
    };

    push_row(&headers);
    push_row(&widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>());
    for row in &cells {
        push_row(row);
    }
    out
}

/// `Page 1 of 12 | Showing 1-20 of 231 records`
pub fn render_footer(session: &SearchSession) -> String {
    format!(
        "Page {} of {} | Showing {}-{} of {} records",
        session.page() + 1,
        session.page_count(),
        session.start_record().min(session.total()),
        session.end_record(),
        session.total(),
    )
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => NULL_CELL.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Interactive search session against `table`.
pub async fn browse(pool: &SqlitePool, table: &str, out_dir: &Path) -> AppResult<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    match query::table_stats(pool, table).await {
        Ok(stats) => println!(
            "Total Records: {} | Localities: {}\n",
            stats.total_records, stats.unique_localities
        ),
        Err(err) => eprintln!("Error: {err}"),
    }

    let localities = match query::distinct_localities(pool, table).await {
        Ok(list) => list,
        Err(err) => {
            eprintln!("Error: {err}");
            Vec::new()
        }
    };

    let mut session = SearchSession::new(table);

    loop {
        match prompt_filters(&mut lines, &localities)? {
            Some(filters) => match session.submit(filters) {
                Ok(()) => {}
                Err(err) => {
                    println!("{err}");
                    continue;
                }
            },
            // EOF on the form quits outright.
            None => return Ok(()),
        }

        match session.run(pool).await {
            Ok(page) => show_page(&session, &page),
            Err(err) => {
                eprintln!("Error: {err}");
                continue;
            }
        }

        if !pagination_loop(pool, &mut session, &mut lines, out_dir).await? {
            return Ok(());
        }
    }
}

/// Read the five filter fields. Returns `None` on EOF.
fn prompt_filters(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    localities: &[String],
) -> AppResult<Option<SearchFilters>> {
    println!("Search Criteria (leave a field blank to skip)");

    let first_name = match prompt_line(lines, "First name")? {
        Some(v) => v,
        None => return Ok(None),
    };
    let last_name = match prompt_line(lines, "Last name")? {
        Some(v) => v,
        None => return Ok(None),
    };

    if !localities.is_empty() {
        let preview: Vec<&str> = localities
            .iter()
            .take(LOCALITY_PREVIEW)
            .map(String::as_str)
            .collect();
        let suffix = if localities.len() > LOCALITY_PREVIEW {
            format!(" (+{} more)", localities.len() - LOCALITY_PREVIEW)
        } else {
            String::new()
        };
        println!("Localities: {}{suffix}", preview.join(", "));
    }
    let locality = match prompt_line(lines, "Locality (blank = All)")? {
        Some(v) => v,
        None => return Ok(None),
    };
    let relation_first_name = match prompt_line(lines, "Relation first name")? {
        Some(v) => v,
        None => return Ok(None),
    };
    let relation_last_name = match prompt_line(lines, "Relation last name")? {
        Some(v) => v,
        None => return Ok(None),
    };

    let some_if_filled = |v: String| if v.trim().is_empty() { None } else { Some(v) };
    Ok(Some(SearchFilters {
        first_name: some_if_filled(first_name),
        last_name: some_if_filled(last_name),
        locality: some_if_filled(locality).or_else(|| Some(LOCALITY_ALL.to_string())),
        relation_first_name: some_if_filled(relation_first_name),
        relation_last_name: some_if_filled(relation_last_name),
    }))
}

fn prompt_line(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    label: &str,
) -> AppResult<Option<String>> {
    print!("{label}: ");
    io::stdout().flush().map_err(crate::AppError::from)?;
    match lines.next() {
        Some(line) => Ok(Some(line.map_err(crate::AppError::from)?)),
        None => Ok(None),
    }
}

fn show_page(session: &SearchSession, page: &SearchPage) {
    if page.total == 0 {
        println!("No records found matching your search criteria.");
        println!("Try partial names, or remove some filters to broaden the search.\n");
        return;
    }
    println!();
    print!("{}", render_table(&page.columns, &page.rows));
    println!("\n{}\n", render_footer(session));
}

/// Handle pagination commands until the user starts a new search (`true`)
/// or quits (`false`).
async fn pagination_loop(
    pool: &SqlitePool,
    session: &mut SearchSession,
    lines: &mut impl Iterator<Item = io::Result<String>>,
    out_dir: &Path,
) -> AppResult<bool> {
    loop {
        let input = match prompt_line(
            lines,
            "[n]ext [p]rev [f]irst [l]ast | size 20|50|100 | export | new | [q]uit",
        )? {
            Some(line) => line,
            None => return Ok(false),
        };
        let input = input.trim().to_ascii_lowercase();

        let moved = match input.as_str() {
            "" => continue,
            "q" | "quit" => return Ok(false),
            "new" => return Ok(true),
            "n" | "next" => session.next_page(),
            "p" | "prev" => session.prev_page(),
            "f" | "first" => session.first_page(),
            "l" | "last" => session.last_page(),
            "export" => {
                match session.export(pool, out_dir).await {
                    Ok(entry) => {
                        println!("Exported {} records to {}", entry.rows_written, entry.path.display());
                        if entry.truncated {
                            println!(
                                "Export limited to the first {} of {} records.",
                                entry.rows_written, entry.total_matches
                            );
                        }
                    }
                    Err(err) => eprintln!("Error: {err}"),
                }
                continue;
            }
            other if other.starts_with("size") => {
                match other.trim_start_matches("size").trim().parse::<i64>() {
                    Ok(rows) => match session.set_rows_per_page(rows) {
                        Ok(()) => true,
                        Err(err) => {
                            println!("{err}");
                            continue;
                        }
                    },
                    Err(_) => {
                        println!("Usage: size <{}>", join_sizes());
                        continue;
                    }
                }
            }
            _ => {
                println!("Unknown command.");
                continue;
            }
        };

        if !moved {
            continue;
        }
        match session.run(pool).await {
            Ok(page) => show_page(session, &page),
            Err(err) => eprintln!("Error: {err}"),
        }
    }
}

fn join_sizes() -> String {
    PAGE_SIZES
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join("|")
}
