use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use rollbook::export::{display_header, ExportOptions};
use rollbook::{db, export, loader, query, ui, SearchFilters, LOCALITY_ALL};

const DEFAULT_DB: &str = "voter_data.sqlite3";
const DEFAULT_TABLE: &str = "voters";

#[derive(Debug, Parser)]
#[command(name = "rollbook", about = "Voter-record lookup over a local SQLite database", version)]
struct Cli {
    /// Path of the database file.
    #[arg(long, global = true, default_value = DEFAULT_DB)]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load a delimited file into a table, inferring the schema.
    Load {
        /// CSV file with a header row.
        file: PathBuf,
        #[arg(long, default_value = DEFAULT_TABLE)]
        table: String,
    },
    /// Load every CSV file in a directory into numbered tables.
    LoadDir {
        dir: PathBuf,
        #[arg(long, default_value = "data")]
        prefix: String,
    },
    /// Run one page of the multi-field search.
    Search {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = DEFAULT_TABLE)]
        table: String,
        #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(i64).range(0..))]
        page: i64,
        #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(i64).range(1..))]
        page_size: i64,
    },
    /// Interactive search session with pagination and export.
    Browse {
        #[arg(long, default_value = DEFAULT_TABLE)]
        table: String,
        /// Directory exports are written to.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// List the distinct localities in the table.
    Localities {
        #[arg(long, default_value = DEFAULT_TABLE)]
        table: String,
    },
    /// Show record and locality counts.
    Stats {
        #[arg(long, default_value = DEFAULT_TABLE)]
        table: String,
    },
    /// Show the age histogram.
    AgeDistribution {
        #[arg(long, default_value = DEFAULT_TABLE)]
        table: String,
    },
    /// Look up records whose locality contains the given name.
    Locality {
        name: String,
        #[arg(long, default_value = DEFAULT_TABLE)]
        table: String,
    },
    /// Free-text person search (names substring, house number exact).
    FindPerson {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        house_number: Option<String>,
        #[arg(long, default_value = DEFAULT_TABLE)]
        table: String,
    },
    /// Export matching records (capped at 10 000 rows) to a CSV file.
    Export {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = DEFAULT_TABLE)]
        table: String,
        /// Directory the export is written to.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Debug, Args)]
struct FilterArgs {
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    /// Exact locality name; omit or pass "All" to skip.
    #[arg(long)]
    locality: Option<String>,
    #[arg(long)]
    relation_first_name: Option<String>,
    #[arg(long)]
    relation_last_name: Option<String>,
}

impl From<FilterArgs> for SearchFilters {
    fn from(args: FilterArgs) -> Self {
        SearchFilters {
            first_name: args.first_name,
            last_name: args.last_name,
            locality: args.locality.or_else(|| Some(LOCALITY_ALL.to_string())),
            relation_first_name: args.relation_first_name,
            relation_last_name: args.relation_last_name,
        }
    }
}

#[tokio::main]
async fn main() {
    rollbook::init_logging();

    let cli = Cli::parse();
    match handle_cli(cli).await {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(1);
        }
    }
}

async fn handle_cli(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Load { file, table } => {
            let pool = db::open_rw_pool(&cli.db).await?;
            let report = loader::load_csv(&pool, &file, &table).await?;
            print_load_report(&report);
            pool.close().await;
            Ok(0)
        }
        Commands::LoadDir { dir, prefix } => {
            let pool = db::open_rw_pool(&cli.db).await?;
            let reports = loader::load_dir(&pool, &dir, &prefix).await?;
            for report in &reports {
                print_load_report(report);
            }
            pool.close().await;
            Ok(0)
        }
        Commands::Search {
            filters,
            table,
            page,
            page_size,
        } => {
            let pool = db::open_ro_pool(&cli.db).await?;
            let offset = page * page_size;
            let result =
                query::search_paginated(&pool, &table, &filters.into(), offset, page_size).await?;
            print!("{}", ui::render_table(&result.columns, &result.rows));
            println!("\n{} matching records in total", result.total);
            pool.close().await;
            Ok(0)
        }
        Commands::Browse { table, out } => {
            let pool = db::open_ro_pool(&cli.db).await?;
            ui::browse(&pool, &table, &out).await?;
            pool.close().await;
            Ok(0)
        }
        Commands::Localities { table } => {
            let pool = db::open_ro_pool(&cli.db).await?;
            for locality in query::distinct_localities(&pool, &table).await? {
                println!("{locality}");
            }
            pool.close().await;
            Ok(0)
        }
        Commands::Stats { table } => {
            let pool = db::open_ro_pool(&cli.db).await?;
            let stats = query::table_stats(&pool, &table).await?;
            println!("Total records     : {}", stats.total_records);
            println!("Unique localities : {}", stats.unique_localities);
            pool.close().await;
            Ok(0)
        }
        Commands::AgeDistribution { table } => {
            let pool = db::open_ro_pool(&cli.db).await?;
            let buckets = query::age_distribution(&pool, &table).await?;
            println!("{:<10} {:>8} {:>8}", "Age group", "Count", "Percent");
            for bucket in buckets {
                println!(
                    "{:<10} {:>8} {:>7.2}%",
                    bucket.age_group, bucket.count, bucket.percentage
                );
            }
            pool.close().await;
            Ok(0)
        }
        Commands::Locality { name, table } => {
            let pool = db::open_ro_pool(&cli.db).await?;
            let result = query::lookup_locality(&pool, &table, &name).await?;
            print!("{}", ui::render_table(&result.columns, &result.rows));
            println!("\n{} matching records", result.total);
            pool.close().await;
            Ok(0)
        }
        Commands::FindPerson {
            first_name,
            last_name,
            house_number,
            table,
        } => {
            let pool = db::open_ro_pool(&cli.db).await?;
            let result = query::search_person(
                &pool,
                &table,
                first_name.as_deref(),
                last_name.as_deref(),
                house_number.as_deref(),
            )
            .await?;
            print!("{}", ui::render_table(&result.columns, &result.rows));
            println!("\n{} matching records", result.total);
            pool.close().await;
            Ok(0)
        }
        Commands::Export {
            filters,
            table,
            out,
        } => {
            let pool = db::open_ro_pool(&cli.db).await?;
            let opts = ExportOptions { out_dir: out };
            let entry = export::export_search(&pool, &table, &filters.into(), &opts).await?;
            println!(
                "Exported {} records to {}",
                entry.rows_written,
                entry.path.display()
            );
            if entry.truncated {
                println!(
                    "Export limited to the first {} of {} records.",
                    entry.rows_written, entry.total_matches
                );
            }
            pool.close().await;
            Ok(0)
        }
    }
}

fn print_load_report(report: &rollbook::LoadReport) {
    println!(
        "Loaded {} rows from {} into table '{}'",
        report.rows,
        report.source.display(),
        report.table
    );
    println!("{:<24} Type", "Column");
    for column in &report.columns {
        println!("{:<24} {}", display_header(&column.name), column.ty);
    }
}
