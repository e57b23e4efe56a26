//! Aggregates over exported CSV files, rendered for the terminal
//!
//! Works on any CSV with a header row, not only our own exports, so columns
//! are found by name through a small table of classifiers.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::SystemTime;
use tracing::{debug, warn};

use crate::config::Config;
use crate::types::Category;
use crate::utils::{group_thousands, truncate_chars};

const TOP_N: usize = 10;
const HISTOGRAM_BINS: usize = 30;
const BAR_WIDTH: usize = 40;
const LABEL_WIDTH: usize = 28;

/// A CSV file loaded as strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open CSV: {}", path.display()))?;

        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read CSV header: {}", path.display()))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record =
                record.with_context(|| format!("Failed to parse CSV: {}", path.display()))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell `col` of `row`; short rows and blank cells count as missing
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)?
            .get(col)
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to create CSV: {}", path.display()))?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Memoized table reads keyed by path, reloaded when the file changes
#[derive(Default)]
pub struct TableCache {
    entries: HashMap<PathBuf, (SystemTime, Rc<Table>)>,
}

impl TableCache {
    /// Load `path`, or `None` when it is missing or unreadable
    pub fn load(&mut self, path: &Path) -> Option<Rc<Table>> {
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;

        if let Some((cached_at, table)) = self.entries.get(path) {
            if *cached_at == modified {
                debug!(path = %path.display(), "table cache hit");
                return Some(Rc::clone(table));
            }
        }

        match Table::read(path) {
            Ok(table) => {
                let table = Rc::new(table);
                self.entries
                    .insert(path.to_path_buf(), (modified, Rc::clone(&table)));
                Some(table)
            }
            Err(e) => {
                warn!("{:#}", e);
                None
            }
        }
    }
}

/// Meaning assigned to a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnRole {
    Price,
    Address,
    Item,
}

/// Decides whether a header names a column with a given role
pub trait ColumnClassifier {
    fn role(&self) -> ColumnRole;
    fn matches(&self, header: &str) -> bool;
}

/// Header contains one of the needles (case-insensitive)
pub struct ContainsAny {
    pub role: ColumnRole,
    pub needles: &'static [&'static str],
}

impl ColumnClassifier for ContainsAny {
    fn role(&self) -> ColumnRole {
        self.role
    }

    fn matches(&self, header: &str) -> bool {
        let lower = header.to_lowercase();
        self.needles.iter().any(|n| lower.contains(n))
    }
}

/// Trimmed header equals one of the names (case-insensitive)
pub struct ExactAny {
    pub role: ColumnRole,
    pub names: &'static [&'static str],
}

impl ColumnClassifier for ExactAny {
    fn role(&self) -> ColumnRole {
        self.role
    }

    fn matches(&self, header: &str) -> bool {
        let lower = header.trim().to_lowercase();
        self.names.iter().any(|n| *n == lower)
    }
}

/// Classifiers in priority order; the first one to claim a role wins
pub fn default_classifiers() -> Vec<Box<dyn ColumnClassifier>> {
    vec![
        Box::new(ContainsAny {
            role: ColumnRole::Price,
            needles: &["price", "prix"],
        }),
        Box::new(ExactAny {
            role: ColumnRole::Address,
            names: &["address", "location", "ville", "lieu", "adresse", "region"],
        }),
        Box::new(ExactAny {
            role: ColumnRole::Item,
            names: &["type_item", "type_clothes", "type_shoes", "name", "description", "titre"],
        }),
    ]
}

/// Column indexes found for each role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub price: Option<usize>,
    pub address: Option<usize>,
    /// Falls back to the first column
    pub item: Option<usize>,
}

impl ColumnMap {
    pub fn classify(headers: &[String], classifiers: &[Box<dyn ColumnClassifier>]) -> Self {
        let mut found: HashMap<ColumnRole, usize> = HashMap::new();
        for classifier in classifiers {
            if found.contains_key(&classifier.role()) {
                continue;
            }
            if let Some(idx) = headers.iter().position(|h| classifier.matches(h)) {
                found.insert(classifier.role(), idx);
            }
        }

        Self {
            price: found.get(&ColumnRole::Price).copied(),
            address: found.get(&ColumnRole::Address).copied(),
            item: found
                .get(&ColumnRole::Item)
                .copied()
                .or(if headers.is_empty() { None } else { Some(0) }),
        }
    }
}

/// Keep only the digits of a price and parse them ("12 500 CFA" -> 12500)
pub fn coerce_price(raw: &str) -> Option<f64> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Value counts, most frequent first; ties keep first-seen order
pub fn top_values<'a>(values: impl Iterator<Item = &'a str>, n: usize) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    for value in values {
        match index.get(value) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(value, counts.len());
                counts.push((value.to_string(), 1));
            }
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(n);
    counts
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub lower: f64,
    pub upper: f64,
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Equal-width bins over [min, max]; the last bin includes `max`
    pub fn build(values: &[f64], bins: usize) -> Option<Self> {
        let min = values.iter().copied().reduce(f64::min)?;
        let max = values.iter().copied().reduce(f64::max)?;
        let (lower, upper) = if min == max {
            (min - 0.5, max + 0.5)
        } else {
            (min, max)
        };
        let width = (upper - lower) / bins as f64;

        let mut counts = vec![0usize; bins];
        for &v in values {
            let idx = ((v - lower) / width) as usize;
            counts[idx.min(bins - 1)] += 1;
        }

        Some(Self {
            lower,
            upper,
            counts,
        })
    }

    pub fn bin_range(&self, i: usize) -> (f64, f64) {
        let width = (self.upper - self.lower) / self.counts.len() as f64;
        (
            self.lower + width * i as f64,
            self.lower + width * (i + 1) as f64,
        )
    }
}

/// Everything the dashboard shows for one file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub name: String,
    pub source: String,
    /// Modification time of the source file, when it exists
    pub modified: Option<String>,
    pub total_items: usize,
    pub price_column: Option<String>,
    pub address_column: Option<String>,
    pub item_column: Option<String>,
    /// Rows whose price coerced to a number
    pub priced_items: usize,
    pub mean_price: Option<f64>,
    pub max_price: Option<f64>,
    pub top_locations: Vec<(String, usize)>,
    pub top_items: Vec<(String, usize)>,
    pub histogram: Option<Histogram>,
}

pub fn summarize(name: &str, source: &Path, table: &Table) -> Summary {
    let columns = ColumnMap::classify(&table.headers, &default_classifiers());
    let header = |idx: Option<usize>| idx.and_then(|i| table.headers.get(i)).cloned();
    let column_values = |col: usize| (0..table.rows.len()).filter_map(move |r| table.cell(r, col));

    let prices: Vec<f64> = match columns.price {
        Some(col) => column_values(col).filter_map(coerce_price).collect(),
        None => Vec::new(),
    };

    let mean_price = if prices.is_empty() {
        None
    } else {
        Some(prices.iter().sum::<f64>() / prices.len() as f64)
    };

    let modified = fs::metadata(source)
        .and_then(|m| m.modified())
        .ok()
        .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M").to_string());

    Summary {
        name: name.to_string(),
        source: source.display().to_string(),
        modified,
        total_items: table.rows.len(),
        price_column: header(columns.price),
        address_column: header(columns.address),
        item_column: header(columns.item),
        priced_items: prices.len(),
        mean_price,
        max_price: prices.iter().copied().reduce(f64::max),
        top_locations: columns
            .address
            .map(|col| top_values(column_values(col), TOP_N))
            .unwrap_or_default(),
        top_items: columns
            .item
            .map(|col| top_values(column_values(col), TOP_N))
            .unwrap_or_default(),
        histogram: Histogram::build(&prices, HISTOGRAM_BINS),
    }
}

fn bar_lines(out: &mut String, counts: &[(String, usize)]) {
    let max = counts.iter().map(|(_, c)| *c).max().unwrap_or(0).max(1);
    for (label, count) in counts {
        let len = (count * BAR_WIDTH).div_ceil(max);
        out.push_str(&format!(
            "  {:<width$} {} {}\n",
            truncate_chars(label, LABEL_WIDTH),
            "█".repeat(len),
            count,
            width = LABEL_WIDTH
        ));
    }
}

pub fn render(summary: &Summary) -> String {
    let mut out = String::new();
    out.push_str(&format!("### Analysis: {}\n", summary.name));
    match &summary.modified {
        Some(at) => out.push_str(&format!(
            "Visualizing data from: {} (updated {})\n\n",
            summary.source, at
        )),
        None => out.push_str(&format!("Visualizing data from: {}\n\n", summary.source)),
    }

    out.push_str(&format!(
        "Total Items: {}",
        group_thousands(summary.total_items as u64)
    ));
    if let (Some(mean), Some(max)) = (summary.mean_price, summary.max_price) {
        out.push_str(&format!(
            "   Avg Price: {} CFA   Max Price: {} CFA",
            group_thousands(mean as u64),
            group_thousands(max as u64)
        ));
    }
    out.push_str("\n---\n");

    out.push_str("Top Locations\n");
    if summary.address_column.is_some() {
        bar_lines(&mut out, &summary.top_locations);
    } else {
        out.push_str("  Address column not found.\n");
    }

    out.push_str(&format!(
        "\nTop Items ({})\n",
        summary.item_column.as_deref().unwrap_or("-")
    ));
    bar_lines(&mut out, &summary.top_items);
    out.push_str("---\n");

    out.push_str("Price Distribution (CFA)\n");
    match &summary.histogram {
        Some(hist) => {
            let labelled: Vec<(String, usize)> = hist
                .counts
                .iter()
                .enumerate()
                .map(|(i, &c)| {
                    let (lo, hi) = hist.bin_range(i);
                    let lo = group_thousands(lo.max(0.0).round() as u64);
                    let hi = group_thousands(hi.max(0.0).round() as u64);
                    (format!("{} - {}", lo, hi), c)
                })
                .collect();
            bar_lines(&mut out, &labelled);
        }
        None => out.push_str("  No valid price data available for plotting.\n"),
    }

    out
}

/// Files the dashboard looks at for a category, in order of preference
pub fn candidate_files(config: &Config, category: Category) -> [PathBuf; 2] {
    [config.local_path(category), config.export_path(category)]
}

/// Print the dashboard for each category; missing data is reported, not an error
pub fn run_dashboard(
    config: &Config,
    cache: &mut TableCache,
    categories: &[Category],
    json: bool,
) -> Result<()> {
    let mut summaries = Vec::new();

    for &category in categories {
        let candidates = candidate_files(config, category);
        let loaded = candidates
            .iter()
            .find(|p| p.exists())
            .and_then(|p| cache.load(p).map(|t| (p, t)))
            .filter(|(_, t)| !t.is_empty());

        match loaded {
            Some((path, table)) => {
                let summary = summarize(category.title(), path, &table);
                if !json {
                    println!("{}", render(&summary));
                }
                summaries.push(summary);
            }
            None => {
                let looked_for: Vec<_> = candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect();
                if json {
                    warn!(category = category.as_str(), "no data found");
                } else {
                    println!(
                        "No data found for {}. (Looked for: {})\n",
                        category.title(),
                        looked_for.join(", ")
                    );
                }
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    }
    Ok(())
}
