//! Page fetching: one blocking GET per page index

use anyhow::Result;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Why a page produced no body
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("HTTP {0}")]
    Status(u16),
}

/// Source of category pages. The orchestrator only sees this seam.
pub trait PageSource {
    /// Fetch page `page` (1-based) of the listing at `base_url`
    fn fetch_page(&self, base_url: &str, page: u32) -> Result<String, FetchError>;
}

pub fn page_url(base_url: &str, page: u32) -> String {
    format!("{}?page={}", base_url, page)
}

/// Live fetcher backed by a blocking reqwest client
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Requests wait as long as the server takes; the blocking client
    /// otherwise gives up after 30 seconds.
    pub fn new(user_agent: Option<&str>) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder().timeout(None::<Duration>);
        if let Some(ua) = user_agent {
            builder = builder.user_agent(ua);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl PageSource for HttpFetcher {
    fn fetch_page(&self, base_url: &str, page: u32) -> Result<String, FetchError> {
        let url = page_url(base_url, page);
        debug!(%url, "fetching page");

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .text()
            .map_err(|e| FetchError::Transport(e.to_string()))
    }
}
