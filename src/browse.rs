//! Previewing and copying existing CSV files (exports and local files)

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::dashboard::{Table, TableCache};
use crate::types::Category;
use crate::utils::{osc8_file_link, truncate_chars};

/// Rows shown per file
pub const PREVIEW_ROWS: usize = 100;
const CELL_WIDTH: usize = 24;

/// File name used when saving a copy ("Men's Clothes Data" -> "Men's_Clothes_Data.csv")
pub fn download_name(title: &str) -> String {
    format!("{}.csv", title.replace(' ', "_"))
}

/// Dimensions line plus the first `limit` rows, one row per line
pub fn preview(table: &Table, limit: usize) -> String {
    let mut out = format!(
        "Dimensions: {} rows x {} columns\n",
        table.rows.len(),
        table.headers.len()
    );
    let line = |cells: &[String]| {
        cells
            .iter()
            .map(|c| format!("{:<width$}", truncate_chars(c, CELL_WIDTH), width = CELL_WIDTH))
            .collect::<Vec<_>>()
            .join(" | ")
    };
    out.push_str(line(table.headers.as_slice()).trim_end());
    out.push('\n');
    for row in table.rows.iter().take(limit) {
        out.push_str(line(row.as_slice()).trim_end());
        out.push('\n');
    }
    if table.rows.len() > limit {
        out.push_str(&format!("... {} more rows\n", table.rows.len() - limit));
    }
    out
}

/// Show one file and optionally save a copy of it into `output`.
///
/// Returns the path written, if any. A missing or empty file returns `Ok(None)`.
fn show_file(
    cache: &mut TableCache,
    path: &Path,
    title: &str,
    output: Option<&Path>,
) -> Result<Option<PathBuf>> {
    let Some(table) = cache.load(path).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };

    println!("{}", title);
    print!("{}", preview(&table, PREVIEW_ROWS));

    let Some(dir) = output else {
        return Ok(Some(path.to_path_buf()));
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output dir: {}", dir.display()))?;
    let dest = dir.join(download_name(title));
    table.write(&dest)?;
    println!(
        "Saved full CSV to {}",
        osc8_file_link(&dest, &dest.to_string_lossy())
    );
    Ok(Some(dest))
}

/// Show the scraped exports of the given categories
pub fn run_download(
    config: &Config,
    cache: &mut TableCache,
    categories: &[Category],
    output: Option<&Path>,
) -> Result<()> {
    println!("Download Recently Scraped Data\n");
    for &category in categories {
        let path = config.export_path(category);
        let title = format!("{} Data", category.title());
        match show_file(cache, &path, &title, output)? {
            Some(_) => println!("---"),
            None => println!(
                "File {} not found. Please scrape data first.",
                path.display()
            ),
        }
    }
    Ok(())
}

/// Show the hand-collected local files for every category
pub fn run_files(config: &Config, cache: &mut TableCache, output: Option<&Path>) -> Result<()> {
    println!("My Local Scraped Files\n");
    for category in Category::ALL {
        let path = config.local_path(category);
        match show_file(cache, &path, category.title(), output)? {
            Some(_) => println!("---"),
            None => println!(
                "File '{}' not found in {}.",
                category.local_file(),
                config.data_dir.display()
            ),
        }
    }
    Ok(())
}
