use std::time::Duration;

use reqwest::Client;

use crate::config::AppConfig;
use crate::{Error, Result};

const USER_AGENT: &str = "Mozilla/5.0";

/// Shared HTTP client for listing pages and article bodies.
///
/// Every request carries the configured timeout; a slow site stalls only
/// the job that issued the fetch, never the scheduler.
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.scraping.request_timeout_secs))
            .user_agent(USER_AGENT)
            .gzip(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(Error::Http)?;

        Ok(Self { client })
    }

    /// Fetch a page as text. Non-success statuses abort the page, they do
    /// not fail the surrounding job.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        tracing::debug!("Fetching {}", url);

        let response = self.client.get(url).send().await.map_err(Error::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Extraction(format!("HTTP {} for {}", status, url)));
        }

        response.text().await.map_err(Error::Http)
    }
}
