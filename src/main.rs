use anyhow::Result;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::info;

mod browse;
mod config;
mod dashboard;
mod extract;
mod fetch;
mod progress;
mod scrape;
mod store;
mod types;
mod utils;

use config::Config;
use dashboard::TableCache;
use types::{Category, MAX_REQUESTED_PAGES};
use utils::osc8_link;

const KOBO_FORM_URL: &str = "https://ee.kobotoolbox.org/x/yc2vAerV";
const GOOGLE_FORM_URL: &str = "https://docs.google.com/forms/d/e/1FAIpQLSdgKBZpH9Lj6Ot0_4HT41gvD0yNpKSOjw3tOhih5uL5p5aWiQ/viewform?usp=header";

#[derive(Parser)]
#[command(name = "coinafrique")]
#[command(about = "Scrape coinafrique clothing and shoe listings into SQLite and CSV")]
struct Cli {
    /// Directory for databases, exports and local CSV files
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// CONL config file (default: coinafrique.conl if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape listings page by page and export de-duplicated CSVs
    Scrape {
        /// Pages to scrape per category (capped by each category's limit)
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=MAX_REQUESTED_PAGES as i64))]
        pages: u32,
        /// Only scrape this category
        #[arg(short, long, value_enum)]
        category: Option<Category>,
        /// Quiet mode - suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Show previously exported data, optionally saving copies
    Download {
        #[arg(short, long, value_enum)]
        category: Option<Category>,
        /// Directory to save full CSV copies into
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show hand-collected local CSV files
    Files {
        /// Directory to save full CSV copies into
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Summary statistics and charts per category
    Dashboard {
        #[arg(short, long, value_enum)]
        category: Option<Category>,
        /// Print summaries as JSON instead of charts
        #[arg(long)]
        json: bool,
    },
    /// Links to the feedback forms
    Feedback,
    /// Remove scraped databases and exports
    Clean,
}

fn selected(category: Option<Category>) -> Vec<Category> {
    match category {
        Some(c) => vec![c],
        None => Category::ALL.to_vec(),
    }
}

fn run_feedback() -> Result<()> {
    println!("Give your Feedback\n");
    println!("  {}", osc8_link(KOBO_FORM_URL, "Kobo Evaluation Form"));
    println!("  {}", osc8_link(GOOGLE_FORM_URL, "Google Forms Evaluation"));
    Ok(())
}

fn run_clean(config: &Config) -> Result<()> {
    println!("Cleaning generated files...");

    for category in Category::ALL {
        for path in [config.store_path(category), config.export_path(category)] {
            if path.exists() {
                fs::remove_file(&path)?;
                println!("  Removed {}", path.display());
            }
        }
    }

    println!("Clean complete!");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref(), cli.data_dir)?;
    info!(data_dir = %config.data_dir.display(), base_url = %config.base_url, "config loaded");

    let mut cache = TableCache::default();

    match cli.command {
        Commands::Scrape {
            pages,
            category,
            quiet,
        } => scrape::run_scrape(&config, &selected(category), pages, quiet),
        Commands::Download { category, output } => {
            browse::run_download(&config, &mut cache, &selected(category), output.as_deref())
        }
        Commands::Files { output } => browse::run_files(&config, &mut cache, output.as_deref()),
        Commands::Dashboard { category, json } => {
            dashboard::run_dashboard(&config, &mut cache, &selected(category), json)
        }
        Commands::Feedback => run_feedback(),
        Commands::Clean => run_clean(&config),
    }
}
