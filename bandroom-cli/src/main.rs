//! bandroom - schedule database command line
//!
//! Initialize the SQLite store, seed the instrument catalogue, and browse
//! the scheduled bands.

use anyhow::{Context, Result};
use bandroom_core::db::seed;
use bandroom_core::{Config, Database, ListQuery};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bandroom")]
#[command(about = "Initialize, seed, and browse the bandroom schedule database")]
#[command(version)]
struct Args {
    /// Override the database path
    #[arg(long)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database and run pending migrations
    Init,
    /// Insert the built-in instrument catalogue
    Seed,
    /// List scheduled bands
    Bands {
        /// Maximum rows to show
        #[arg(long, default_value_t = 50)]
        limit: i64,

        /// Rows to skip
        #[arg(long, default_value_t = 0)]
        offset: i64,

        /// LIKE pattern matched against band names (e.g. "%kill%")
        #[arg(long)]
        search: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = bandroom_core::logging::init(&config.logging).ok();

    let db_path = args.database.unwrap_or_else(|| config.database_path());
    let db = Database::open(&db_path)
        .context("failed to open database")?
        .accumulate_errors(config.validation.accumulate_errors);
    db.migrate().context("failed to run migrations")?;

    match args.command {
        Command::Init => {
            println!("Database ready at {}", db_path.display());
        }
        Command::Seed => {
            let created = seed::seed_instruments(&db).context("failed to seed instruments")?;
            println!("Seeded {} instruments", created);
        }
        Command::Bands {
            limit,
            offset,
            search,
        } => {
            let query = ListQuery {
                limit,
                offset,
                search,
            };
            let page = db.list_bands(&query).context("failed to list bands")?;

            println!("Showing {} of {} bands", page.rows.len(), page.total_count);
            for band in &page.rows {
                let name = band.name.as_deref().unwrap_or("(unnamed)");
                let day = band.day_of_week.map(|d| d.as_str()).unwrap_or("-");
                let starts = band
                    .starts_at
                    .map(|t| t.format("%H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{:>4}  {:<32} {:<10} {}", band.id, name, day, starts);
            }
        }
    }

    Ok(())
}
