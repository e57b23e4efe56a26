use anyhow::{bail, Context, Result};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::extract::{extract_page, MissingField, Selectors};
use crate::fetch::{FetchError, HttpFetcher, PageSource};
use crate::progress::{BarProgress, NullProgress, Progress};
use crate::store::CategoryStore;
use crate::types::{effective_pages, Category, ListingRecord};
use crate::utils::{group_thousands, osc8_file_link};

/// What happened to one page of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageReport {
    pub page: u32,
    /// Set when the fetch failed and the page counted as empty
    pub fetch_error: Option<FetchError>,
    pub committed: usize,
    pub skipped: Vec<(usize, MissingField)>,
}

/// Outcome of scraping one category
#[derive(Debug)]
pub struct ScrapeReport {
    pub category: Category,
    pub effective_pages: u32,
    pub pages: Vec<PageReport>,
    /// De-duplicated table contents after the export
    pub records: Vec<ListingRecord>,
}

impl ScrapeReport {
    pub fn failed_pages(&self) -> impl Iterator<Item = &PageReport> {
        self.pages.iter().filter(|p| p.fetch_error.is_some())
    }

    pub fn committed_rows(&self) -> usize {
        self.pages.iter().map(|p| p.committed).sum()
    }

    pub fn skipped_cards(&self) -> usize {
        self.pages.iter().map(|p| p.skipped.len()).sum()
    }
}

/// Run one category session: fetch, extract and commit each page, then export.
///
/// Fetch and card failures are recorded in the report; store errors abort the
/// session. The store connection is closed either way.
pub fn scrape_category<S: PageSource, P: Progress>(
    config: &Config,
    category: Category,
    requested_pages: u32,
    source: &S,
    selectors: &Selectors,
    progress: &mut P,
) -> Result<ScrapeReport> {
    let store_path = config.store_path(category);
    let mut store = CategoryStore::open(&store_path)?;

    let pages = effective_pages(requested_pages, config.page_cap(category));
    progress.begin(category, pages);
    let result = run_session(config, category, pages, &mut store, source, selectors, progress);
    progress.finish();

    let closed = store.close();
    let report = result.with_context(|| format!("Scrape of {} failed", category.as_str()))?;
    closed?;
    Ok(report)
}

fn run_session<S: PageSource, P: Progress>(
    config: &Config,
    category: Category,
    pages: u32,
    store: &mut CategoryStore,
    source: &S,
    selectors: &Selectors,
    progress: &mut P,
) -> Result<ScrapeReport> {
    let table = category.table_name();
    let base_url = config.category_url(category);
    store.ensure_schema(table)?;

    info!(category = category.as_str(), pages, "scraping {}", table);

    let mut reports = Vec::with_capacity(pages as usize);
    for page in 1..=pages {
        let (extraction, fetch_error) = match source.fetch_page(&base_url, page) {
            Ok(body) => (extract_page(&body, selectors), None),
            Err(e) => {
                warn!(page, error = %e, "fetch failed, treating page as empty");
                (Default::default(), Some(e))
            }
        };

        debug!(page, cards = extraction.cards_seen(), "page extracted");
        for (index, field) in &extraction.skipped {
            debug!(page, card = index, %field, "card skipped");
        }

        let mut batch = store.batch()?;
        for record in &extraction.records {
            batch.append(table, record)?;
        }
        let committed = batch.commit_batch()?;

        reports.push(PageReport {
            page,
            fetch_error,
            committed,
            skipped: extraction.skipped,
        });
        progress.page_done(
            page as f64 / pages as f64,
            &format!("Scraping page {}/{}", page, pages),
        );
    }

    // Rows accumulate across runs; only the export is de-duplicated
    info!(rows = store.row_count(table)?, "{} total rows", table);
    let records = store.export(table, &config.export_path(category))?;

    Ok(ScrapeReport {
        category,
        effective_pages: pages,
        pages: reports,
        records,
    })
}

/// Scrape the given categories in order with the live fetcher.
pub fn run_scrape(config: &Config, categories: &[Category], pages: u32, quiet: bool) -> Result<()> {
    let fetcher = HttpFetcher::new(config.user_agent.as_deref())?;
    let selectors = Selectors::new()?;
    scrape_all(config, categories, pages, quiet, &fetcher, &selectors)
}

/// Scrape each category in turn.
///
/// A category that fails is logged and the next one still runs; the call
/// fails afterwards if any category did not finish.
pub fn scrape_all<S: PageSource>(
    config: &Config,
    categories: &[Category],
    pages: u32,
    quiet: bool,
    source: &S,
    selectors: &Selectors,
) -> Result<()> {
    if !quiet {
        println!(
            "Scraping started. Max pages set to {}, capped by category limits.\n",
            pages
        );
    }

    let mut failed = 0usize;
    for (i, &category) in categories.iter().enumerate() {
        if !quiet {
            println!("### {}. {}", i + 1, category.title());
        }

        let result = if quiet {
            scrape_category(config, category, pages, source, selectors, &mut NullProgress)
        } else {
            scrape_category(config, category, pages, source, selectors, &mut BarProgress::default())
        };

        match result {
            Ok(report) => {
                if !quiet {
                    print_report(config, &report);
                }
            }
            Err(e) => {
                failed += 1;
                error!("{:#}", e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} categories failed", failed, categories.len());
    }
    Ok(())
}

fn print_report(config: &Config, report: &ScrapeReport) {
    let failed = report.failed_pages().count();
    println!(
        "  {} pages fetched ({} failed), {} rows committed, {} cards skipped",
        report.effective_pages,
        failed,
        group_thousands(report.committed_rows() as u64),
        report.skipped_cards()
    );

    if report.records.is_empty() {
        println!("  No listings found, nothing exported.\n");
        return;
    }

    let export = config.export_path(report.category);
    println!(
        "  Dimensions: {} rows x 4 columns -> {}\n",
        group_thousands(report.records.len() as u64),
        osc8_file_link(&export, &export.to_string_lossy())
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::tests::{card_html, page_html};
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Serves canned pages and records every fetch attempt
    #[derive(Default)]
    struct ScriptedSource {
        pages: HashMap<u32, Result<String, FetchError>>,
        attempts: RefCell<Vec<(String, u32)>>,
    }

    impl ScriptedSource {
        fn with_page(mut self, page: u32, cards: &[(&str, &str)]) -> Self {
            let cards: Vec<_> = cards
                .iter()
                .map(|(name, price)| card_html(name, price, "Dakar", &format!("{}.jpg", name)))
                .collect();
            self.pages.insert(page, Ok(page_html(&cards)));
            self
        }

        fn with_failure(mut self, page: u32, error: FetchError) -> Self {
            self.pages.insert(page, Err(error));
            self
        }

        fn attempted_pages(&self) -> Vec<u32> {
            self.attempts.borrow().iter().map(|(_, p)| *p).collect()
        }
    }

    impl PageSource for ScriptedSource {
        fn fetch_page(&self, base_url: &str, page: u32) -> Result<String, FetchError> {
            self.attempts.borrow_mut().push((base_url.to_string(), page));
            self.pages
                .get(&page)
                .cloned()
                .unwrap_or_else(|| Ok(page_html(&[])))
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        began: Option<(Category, u32)>,
        fractions: Vec<f64>,
        labels: Vec<String>,
        finished: bool,
    }

    impl Progress for RecordingProgress {
        fn begin(&mut self, category: Category, pages: u32) {
            self.began = Some((category, pages));
        }
        fn page_done(&mut self, fraction: f64, label: &str) {
            self.fractions.push(fraction);
            self.labels.push(label.to_string());
        }
        fn finish(&mut self) {
            self.finished = true;
        }
    }

    fn test_config(dir: &tempfile::TempDir) -> Config {
        Config::with_data_dir(dir.path().to_path_buf())
    }

    #[test]
    fn test_request_is_capped_by_category() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = test_config(&dir);
        let selectors = Selectors::new().unwrap();
        let source = ScriptedSource::default();

        let report = scrape_category(
            &config,
            Category::ChildrenShoes,
            120,
            &source,
            &selectors,
            &mut NullProgress,
        )
        .unwrap();

        assert_eq!(report.effective_pages, 8);
        assert_eq!(source.attempted_pages(), (1..=8).collect::<Vec<_>>());
        let url = source.attempts.borrow()[0].0.clone();
        assert_eq!(url, "https://sn.coinafrique.com/categorie/chaussures-enfants");
    }

    #[test]
    fn test_request_below_cap_is_honoured() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = test_config(&dir);
        let selectors = Selectors::new().unwrap();
        let source = ScriptedSource::default();

        let report = scrape_category(
            &config,
            Category::MenClothes,
            3,
            &source,
            &selectors,
            &mut NullProgress,
        )
        .unwrap();

        assert_eq!(report.effective_pages, 3);
        assert_eq!(source.attempted_pages(), vec![1, 2, 3]);
    }

    #[test]
    fn test_failed_page_does_not_stop_session() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = test_config(&dir);
        let selectors = Selectors::new().unwrap();
        let source = ScriptedSource::default()
            .with_page(1, &[("Chemise", "5 000 CFA")])
            .with_failure(2, FetchError::Transport("connection reset".into()))
            .with_page(3, &[("Jean", "8 000 CFA"), ("Veste", "15 000 CFA")])
            .with_failure(4, FetchError::Status(502))
            .with_page(5, &[("Boubou", "20 000 CFA")]);

        let report = scrape_category(
            &config,
            Category::MenClothes,
            5,
            &source,
            &selectors,
            &mut NullProgress,
        )
        .unwrap();

        assert_eq!(source.attempted_pages(), vec![1, 2, 3, 4, 5]);
        let failed: Vec<_> = report.failed_pages().map(|p| p.page).collect();
        assert_eq!(failed, vec![2, 4]);
        assert_eq!(report.pages[1].committed, 0);
        assert_eq!(report.committed_rows(), 4);
        let names: Vec<_> = report
            .records
            .iter()
            .map(|r| r.item_description.as_str())
            .collect();
        assert_eq!(names, ["Chemise", "Jean", "Veste", "Boubou"]);
    }

    #[test]
    fn test_empty_page_is_not_a_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = test_config(&dir);
        let selectors = Selectors::new().unwrap();
        let source = ScriptedSource::default()
            .with_failure(1, FetchError::Status(404));

        let report = scrape_category(
            &config,
            Category::ChildrenShoes,
            2,
            &source,
            &selectors,
            &mut NullProgress,
        )
        .unwrap();

        assert_eq!(report.pages[0].fetch_error, Some(FetchError::Status(404)));
        assert_eq!(report.pages[1].fetch_error, None);
        assert_eq!(report.pages[1].committed, 0);
        assert!(report.records.is_empty());
        assert!(!config.export_path(Category::ChildrenShoes).exists());
    }

    #[test]
    fn test_rescrape_accumulates_but_export_dedups() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = test_config(&dir);
        let selectors = Selectors::new().unwrap();
        let source = ScriptedSource::default()
            .with_page(1, &[("Sandales", "3 000 CFA"), ("Sandales", "3 000 CFA")]);

        for _ in 0..2 {
            let report = scrape_category(
                &config,
                Category::ChildrenShoes,
                1,
                &source,
                &selectors,
                &mut NullProgress,
            )
            .unwrap();
            assert_eq!(report.records.len(), 1);
        }

        let store = CategoryStore::open(&config.store_path(Category::ChildrenShoes)).unwrap();
        assert_eq!(store.row_count(Category::ChildrenShoes.table_name()).unwrap(), 4);

        let csv = std::fs::read_to_string(config.export_path(Category::ChildrenShoes)).unwrap();
        assert_eq!(
            csv,
            "type_item,price,address,image_link\nSandales,3000,Dakar,Sandales.jpg\n"
        );
    }

    #[test]
    fn test_progress_reports_each_page() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = test_config(&dir);
        let selectors = Selectors::new().unwrap();
        let source = ScriptedSource::default();
        let mut progress = RecordingProgress::default();

        scrape_category(
            &config,
            Category::ChildrenClothes,
            4,
            &source,
            &selectors,
            &mut progress,
        )
        .unwrap();

        assert_eq!(progress.began, Some((Category::ChildrenClothes, 4)));
        assert_eq!(progress.fractions, vec![0.25, 0.5, 0.75, 1.0]);
        assert_eq!(progress.labels[3], "Scraping page 4/4");
        assert!(progress.finished);
    }

    #[test]
    fn test_skipped_cards_are_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = test_config(&dir);
        let selectors = Selectors::new().unwrap();
        let mut source = ScriptedSource::default();
        let broken = r#"<div class="col s6 m4 l3"><p class="ad__card-description">x</p></div>"#;
        source.pages.insert(
            1,
            Ok(page_html(&[
                broken.to_string(),
                card_html("Tennis", "9 000 CFA", "Dakar", "t.jpg"),
            ])),
        );

        let report = scrape_category(
            &config,
            Category::MenShoes,
            1,
            &source,
            &selectors,
            &mut NullProgress,
        )
        .unwrap();

        assert_eq!(report.pages[0].skipped, vec![(0, MissingField::Price)]);
        assert_eq!(report.pages[0].committed, 1);
        assert_eq!(report.skipped_cards(), 1);
    }

    #[test]
    fn test_configured_cap_overrides_default() {
        let dir = tempfile::TempDir::new().unwrap();
        let conl = dir.path().join("c.conl");
        std::fs::write(&conl, "page_caps\n  men-shoes = 2\n").unwrap();
        let config = Config::load(Some(conl.as_path()), Some(dir.path().to_path_buf())).unwrap();
        let selectors = Selectors::new().unwrap();
        let source = ScriptedSource::default();

        scrape_category(&config, Category::MenShoes, 50, &source, &selectors, &mut NullProgress)
            .unwrap();
        assert_eq!(source.attempted_pages(), vec![1, 2]);
    }

    #[test]
    fn test_store_error_aborts_only_that_category() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = test_config(&dir);
        let selectors = Selectors::new().unwrap();
        let source = ScriptedSource::default().with_page(1, &[("Mocassins", "12 000 CFA")]);
        std::fs::create_dir_all(config.store_path(Category::MenShoes)).unwrap();

        let err = scrape_all(
            &config,
            &[Category::MenShoes, Category::ChildrenShoes],
            1,
            true,
            &source,
            &selectors,
        )
        .unwrap_err();

        assert_eq!(err.to_string(), "1 of 2 categories failed");
        // the unopenable store never fetched; the next category still ran
        assert_eq!(source.attempted_pages(), vec![1]);
        let csv = std::fs::read_to_string(config.export_path(Category::ChildrenShoes)).unwrap();
        assert!(csv.contains("Mocassins,12000"));
        assert!(!config.export_path(Category::MenShoes).exists());
    }

    #[test]
    fn test_insert_error_rolls_back_page_and_aborts_session() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = test_config(&dir);
        let selectors = Selectors::new().unwrap();
        let source = ScriptedSource::default()
            .with_page(1, &[("Chemise", "5 000 CFA")])
            .with_page(2, &[("Jean", "8 000 CFA")]);

        let store_path = config.store_path(Category::MenClothes);
        let conn = rusqlite::Connection::open(&store_path).unwrap();
        conn.execute_batch("CREATE TABLE mens_clothes_tab (type_item TEXT)")
            .unwrap();
        conn.close().unwrap();

        let result = scrape_category(
            &config,
            Category::MenClothes,
            2,
            &source,
            &selectors,
            &mut NullProgress,
        );

        assert!(result.is_err());
        assert_eq!(source.attempted_pages(), vec![1]);
        assert!(!config.export_path(Category::MenClothes).exists());

        let conn = rusqlite::Connection::open(&store_path).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM mens_clothes_tab", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[test]
    fn test_all_categories_succeeding_is_ok() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = test_config(&dir);
        let selectors = Selectors::new().unwrap();
        let source = ScriptedSource::default();

        scrape_all(&config, &Category::ALL, 1, true, &source, &selectors).unwrap();
        assert_eq!(source.attempted_pages(), vec![1, 1, 1, 1]);
    }
}
