//! Progress reporting for scrape sessions

use indicatif::{ProgressBar, ProgressStyle};

use crate::types::Category;

/// Side channel for per-page progress. Frontends pick how to show it.
pub trait Progress {
    /// Called once before the first page with the number of pages to fetch
    fn begin(&mut self, _category: Category, _pages: u32) {}

    /// Called after each page commit with `page / pages` and a label
    fn page_done(&mut self, _fraction: f64, _label: &str) {}

    /// Called when the session ends, successful or not
    fn finish(&mut self) {}
}

/// A no-op progress sink.
pub struct NullProgress;
impl Progress for NullProgress {}

/// Terminal progress bar, one per category session
#[derive(Default)]
pub struct BarProgress {
    bar: Option<ProgressBar>,
}

impl Progress for BarProgress {
    fn begin(&mut self, category: Category, pages: u32) {
        let bar = ProgressBar::new(pages as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{prefix:>20} [{bar:40}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_prefix(category.title());
        bar.set_message(format!("Target: {} pages", pages));
        self.bar = Some(bar);
    }

    fn page_done(&mut self, _fraction: f64, label: &str) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
            bar.set_message(label.to_string());
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
