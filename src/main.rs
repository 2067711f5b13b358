mod crawl;
mod db;
mod error;
mod extract;
mod fetch;
mod normalize;
mod product;
mod reconcile;
mod run;
mod settings;
mod snapshot;
mod store;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::fetch::Fetcher;
use crate::product::CrawlBatch;
use crate::settings::Settings;
use crate::store::StoreKind;

#[derive(Parser)]
#[command(name = "egg_crawler", about = "Egg price crawler for NZ supermarkets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl every store, write a snapshot and upsert prices
    Run {
        /// Do not touch the database (snapshot only)
        #[arg(long)]
        skip_db: bool,
        /// Snapshot file (default: <snapshot_dir>/egg_prices_<timestamp>.json)
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Run one store's extractor over a saved HTML page
    Extract {
        #[arg(short, long, value_enum)]
        store: StoreKind,
        file: PathBuf,
    },
    /// List stored products
    List {
        #[arg(short, long, value_enum)]
        store: Option<StoreKind>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Show product counts per store
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;
    info!(settings = ?settings, "Loaded settings");

    let result = match cli.command {
        Commands::Run { skip_db, snapshot } => {
            // Misconfiguration fails here, before any store is visited.
            let fetcher = Fetcher::from_settings(&settings)?;
            let conn = if skip_db {
                None
            } else {
                let conn = db::connect(&settings.db_path)?;
                db::init_schema(&conn)?;
                Some(conn)
            };

            let report = run::run(
                &fetcher,
                conn.as_ref(),
                snapshot,
                &settings.snapshot_dir,
                &settings.crawl_options(),
            )
            .await?;

            if let Some(stats) = report.reconciled {
                println!(
                    "Processed {} products in {:?}: {} new, {} updated, {} failed\n",
                    stats.processed(),
                    settings.db_path,
                    stats.created,
                    stats.updated,
                    stats.failed
                );
            }

            print_results(&report.batch);
            println!("Results saved to: {}\n", report.snapshot_path.display());
            Ok(())
        }
        Commands::Extract { store, file } => {
            let html = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {:?}", file))?;
            let raw = extract::extract(store, &html)?;
            println!("{} candidate products in {:?}", raw.len(), file);
            for pair in &raw {
                match normalize::normalize(store, pair) {
                    Ok(r) => println!("  {:<60} {:>10}", truncate(&r.item_name, 60), r.price_text),
                    Err(reason) => println!("  SKIP {:?}: {}", pair.name, reason),
                }
            }
            Ok(())
        }
        Commands::List { store, limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let rows = db::fetch_products(&conn, store, limit)?;
            if rows.is_empty() {
                println!("No products stored. Run 'run' first.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<10} | {:<48} | {:>8} | {:<16} | {:<16}",
                "#", "Store", "Item", "Price", "First seen", "Last crawl"
            );
            println!("{}", "-".repeat(116));
            for (i, p) in rows.iter().enumerate() {
                println!(
                    "{:>3} | {:<10} | {:<48} | {:>8} | {:<16} | {:<16}",
                    i + 1,
                    p.store,
                    truncate(&p.item_name, 45),
                    p.price_text,
                    p.created_at.format("%Y-%m-%d %H:%M"),
                    p.last_crawl_at.format("%Y-%m-%d %H:%M"),
                );
            }
            println!("\n{} products", rows.len());
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Total:      {}", s.total);
            for (store, count) in &s.per_store {
                println!("  {:<10} {}", store, count);
            }
            match s.last_crawl_at {
                Some(at) => println!("Last crawl: {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
                None => println!("Last crawl: never"),
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("Done in {}", format_duration(elapsed));
    }

    result
}

fn print_results(batch: &CrawlBatch) {
    let rule = "=".repeat(80);
    println!("{}", rule);
    println!("{:^80}", "EGG PRICE CRAWL RESULTS");
    println!("{}", rule);
    println!("\nTotal products found: {}\n", batch.len());

    for store in StoreKind::ALL {
        let products: Vec<_> = batch.for_store(store).collect();
        if products.is_empty() {
            continue;
        }
        println!("{}", "─".repeat(80));
        println!("{} ({} products)", store.display_name().to_uppercase(), products.len());
        println!("{}", "─".repeat(80));
        for (i, p) in products.iter().enumerate() {
            println!("{:2}. {:<60} {:>10}", i + 1, truncate(&p.item_name, 60), p.price_text);
        }
        println!();
    }
    println!("{}\n", rule);
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
