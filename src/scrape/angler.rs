// src/scrape/angler.rs - Master Angler award page scraper
//
// The award site publishes one paginated table per year. Downstream only
// needs the load-bearing contract: an ordered Vec of page blobs, one blob per
// page, rows separated by newlines and cells by tabs.
use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

use crate::scrape::{http_client, polite_delay};

const DEFAULT_URL: &str = "https://cpw.state.co.us/learn/Pages/MasterAngler.aspx";

// First year the award table is published online.
const FIRST_AWARD_YEAR: i32 = 2021;

const MAX_PAGE_RETRIES: u32 = 3;
const RETRY_DELAY_MS: u64 = 1_000;

static ROW_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table tbody tr").unwrap());
static CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());

pub struct MasterAnglerScraper {
    client: reqwest::Client,
    base_url: Url,
}

impl MasterAnglerScraper {
    pub fn from_env() -> Result<Self> {
        let raw = env::var("ANGLER_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
        let base_url = Url::parse(&raw).context("ANGLER_URL is not a valid URL")?;
        Ok(Self {
            client: http_client()?,
            base_url,
        })
    }

    fn page_url(&self, year: i32, page: u32) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("year", &year.to_string())
            .append_pair("page", &page.to_string());
        url
    }

    /// Fetches one page and renders its table body as tab-separated rows.
    /// An empty string means the page has no rows, i.e. the year is done.
    async fn fetch_page(&self, url: &Url) -> Result<String> {
        let body = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Request failed: {}", url))?
            .error_for_status()
            .with_context(|| format!("Bad status from {}", url))?
            .text()
            .await
            .with_context(|| format!("Failed to read body from {}", url))?;

        let document = Html::parse_document(&body);
        let mut rows = Vec::new();
        for row in document.select(&ROW_SELECTOR) {
            let cells: Vec<String> = row
                .select(&CELL_SELECTOR)
                .map(|cell| cell.text().collect::<String>().trim().to_string())
                .collect();
            if !cells.is_empty() {
                rows.push(cells.join("\t"));
            }
        }
        Ok(rows.join("\n"))
    }

    /// Walks every year from the first published one to the current year,
    /// paginating until a page comes back empty. Transient fetch failures
    /// retry a bounded number of times before the rest of the year is
    /// skipped with a warning.
    pub async fn fetch_all(&self) -> Result<Vec<String>> {
        let current_year = Utc::now().year();
        let mut records = Vec::new();

        for year in FIRST_AWARD_YEAR..=current_year {
            info!("Scraping data for year {}", year);

            let mut page = 1u32;
            let mut attempts = 0u32;
            loop {
                let url = self.page_url(year, page);
                match self.fetch_page(&url).await {
                    Ok(rows) if rows.is_empty() => {
                        debug!("No rows on page {} for year {}, year complete", page, year);
                        break;
                    }
                    Ok(rows) => {
                        records.push(rows);
                        attempts = 0;
                        page += 1;
                    }
                    Err(e) if attempts < MAX_PAGE_RETRIES => {
                        attempts += 1;
                        warn!(
                            "Fetch failed for {} (attempt {}/{}): {}",
                            url, attempts, MAX_PAGE_RETRIES, e
                        );
                        tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
                        continue;
                    }
                    Err(e) => {
                        warn!("Giving up on year {} at page {}: {}", year, page, e);
                        break;
                    }
                }
                polite_delay().await;
            }

            info!("There were {} page(s) for year {}", page.saturating_sub(1), year);
        }

        Ok(records)
    }
}
