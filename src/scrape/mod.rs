pub mod angler;
pub mod atlas;

use std::time::Duration;

use anyhow::{Context, Result};
use scraper::ElementRef;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; CpwDataPipeline/1.0)";

// Fixed delay between requests to avoid hammering the state servers.
const REQUEST_DELAY_MS: u64 = 200;

pub(crate) fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")
}

pub(crate) async fn polite_delay() {
    tokio::time::sleep(Duration::from_millis(REQUEST_DELAY_MS)).await;
}

/// Joins an element's text nodes with newlines, dropping blank ones —
/// approximates the rendered inner text the downstream parsers expect.
pub(crate) fn element_text_lines(element: &ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
