// src/scrape/atlas.rs - Fishing Atlas scraper
//
// One scraper instance per species search term. Each location's blob is
// composed as "<name>XXXX<info text><coordinate text>", the exact shape the
// atlas parser splits back apart. Locations whose popup never finishes
// rendering are appended anyway after the bounded retry; the parser skips
// them downstream.
use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

use crate::scrape::{element_text_lines, http_client, polite_delay};

const DEFAULT_URL: &str = "https://ndismaps.nrel.colostate.edu/index.html?app=FishingAtlas";

const MAX_LOAD_ATTEMPTS: u32 = 5;
const LOAD_RETRY_DELAY_MS: u64 = 1_000;
const LOADING_MARKER: &str = "Loading...";
const LOCATION_DELIMITER: &str = "XXXX";

static FEATURE_LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.feature-link").unwrap());
static INFO_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("#info-bubble").unwrap());
static COORD_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("#xycoords").unwrap());

pub struct FishingAtlasScraper {
    client: reqwest::Client,
    base_url: Url,
    species: String,
}

impl FishingAtlasScraper {
    pub fn from_env(species: &str) -> Result<Self> {
        let raw = env::var("ATLAS_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
        let base_url = Url::parse(&raw).context("ATLAS_URL is not a valid URL")?;
        Ok(Self {
            client: http_client()?,
            base_url,
            species: species.to_string(),
        })
    }

    fn search_url(&self) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("search", &self.species)
            // Decimal degrees, so the coordinate readout is usable downstream.
            .append_pair("units", "dd");
        url
    }

    async fn fetch_feature_list(&self) -> Result<Vec<(String, Url)>> {
        let url = self.search_url();
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
        let mut features = Vec::new();
        for link in document.select(&FEATURE_LINK_SELECTOR) {
            let name = link.text().collect::<String>().trim().to_string();
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            match self.base_url.join(href) {
                Ok(resolved) => features.push((name, resolved)),
                Err(e) => warn!("Skipping feature {} with bad href {}: {}", name, href, e),
            }
        }
        Ok(features)
    }

    /// Fetches one location's popup and coordinate readout. Re-fetches a
    /// bounded number of times while the popup still reads "Loading...".
    async fn fetch_feature(&self, name: &str, url: &Url) -> Result<String> {
        let mut attempts = 0u32;
        loop {
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

            let (info_text, coordinate_text) = {
                let document = Html::parse_document(&body);
                let info_text = document
                    .select(&INFO_SELECTOR)
                    .next()
                    .map(|el| element_text_lines(&el))
                    .unwrap_or_default();
                let coordinate_text = document
                    .select(&COORD_SELECTOR)
                    .next()
                    .map(|el| element_text_lines(&el))
                    .unwrap_or_default();
                (info_text, coordinate_text)
            };

            if info_text.contains(LOADING_MARKER) && attempts < MAX_LOAD_ATTEMPTS {
                attempts += 1;
                debug!("Data did not load for {}, waiting then trying again", name);
                tokio::time::sleep(Duration::from_millis(LOAD_RETRY_DELAY_MS)).await;
                continue;
            }
            if attempts > 0 {
                if info_text.contains(LOADING_MARKER) {
                    warn!("Data did not load for {} after {} attempts", name, attempts);
                } else {
                    info!(
                        "Data successfully loaded for {} after {} attempts",
                        name, attempts
                    );
                }
            }

            return Ok(format!(
                "{}{}{}{}",
                name, LOCATION_DELIMITER, info_text, coordinate_text
            ));
        }
    }

    /// One blob per location found for this species search term.
    pub async fn fetch_species(&self) -> Result<Vec<String>> {
        let features = self.fetch_feature_list().await?;
        info!(
            "There are {} results for search term {}",
            features.len(),
            self.species
        );

        let pb = ProgressBar::new(features.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("█▉▊▋▌▍▎▏  "),
        );

        let mut all_records = Vec::with_capacity(features.len());
        for (name, url) in &features {
            pb.set_message(name.clone());
            debug!("Grabbing data for {}", name);
            match self.fetch_feature(name, url).await {
                Ok(blob) => all_records.push(blob),
                Err(e) => warn!("Failed to fetch {}: {}", name, e),
            }
            pb.inc(1);
            polite_delay().await;
        }
        pb.finish_and_clear();

        info!("Successfully pulled all the data for {}", self.species);
        Ok(all_records)
    }
}
