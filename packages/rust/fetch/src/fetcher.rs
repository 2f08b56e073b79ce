//! HTTP page fetching with rate-limit classification.
//!
//! A fetch either yields the page HTML, reports that the host is rate
//! limiting us, or fails with a [`HarvestError::Network`]. Nothing is retried.

use std::sync::LazyLock;
use std::time::Duration;

use reqwest::{Client, StatusCode, header};
use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

use mdharvest_shared::{FetchConfig, HarvestError, Result};

/// Phrases that mark a 200 response as a rate-limit interstitial when they
/// appear in the page `<title>` or first `<h1>`.
const RATE_LIMIT_PHRASES: [&str; 2] = ["too many requests", "rate limit"];

// ---------------------------------------------------------------------------
// Fetch results
// ---------------------------------------------------------------------------

/// A successfully fetched HTML page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The URL as requested.
    pub url: Url,
    /// The URL after redirects.
    pub final_url: Url,
    /// HTTP status code of the final response.
    pub status_code: u16,
    /// Raw response body.
    pub html: String,
    /// Text of the `<title>` element, if any.
    pub html_title: Option<String>,
}

/// Classified result of a fetch that reached the server.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The page was served normally.
    Page(FetchedPage),
    /// The host refused because of rate limiting.
    RateLimited { reason: String },
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Shared HTTP client for article fetches. Cheap to share behind an `Arc`.
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Create a fetcher with the given HTTP configuration.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HarvestError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Fetch one page and classify the response.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch(&self, url: &Url) -> Result<FetchOutcome> {
        debug!("fetching page");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| HarvestError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        let final_url = response.url().clone();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let reason = match retry_after(&response) {
                Some(after) => format!("HTTP {status} (retry after {after})"),
                None => format!("HTTP {status}"),
            };
            warn!(%reason, "rate limited");
            return Ok(FetchOutcome::RateLimited { reason });
        }

        if !status.is_success() {
            return Err(HarvestError::Network(format!("{url}: HTTP {status}")));
        }

        if let Some(content_type) = content_type(&response) {
            if !is_textual(&content_type) {
                return Err(HarvestError::Network(format!(
                    "{url}: unsupported content type '{content_type}'"
                )));
            }
        }

        let html = response
            .text()
            .await
            .map_err(|e| HarvestError::Network(format!("{url}: body read failed: {e}")))?;

        let (html_title, first_h1) = page_headings(&html);

        if let Some(phrase) = [html_title.as_deref(), first_h1.as_deref()]
            .into_iter()
            .flatten()
            .find_map(rate_limit_phrase)
        {
            warn!(phrase, "page looks like a rate-limit notice");
            return Ok(FetchOutcome::RateLimited {
                reason: format!("rate limited: page reports '{phrase}'"),
            });
        }

        debug!(status = status.as_u16(), bytes = html.len(), "page fetched");

        Ok(FetchOutcome::Page(FetchedPage {
            url: url.clone(),
            final_url,
            status_code: status.as_u16(),
            html,
            html_title,
        }))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn retry_after(response: &reqwest::Response) -> Option<String> {
    let value = response.headers().get(header::RETRY_AFTER)?.to_str().ok()?.trim();
    if value.is_empty() {
        return None;
    }
    if value.chars().all(|c| c.is_ascii_digit()) {
        Some(format!("{value}s"))
    } else {
        Some(value.to_string())
    }
}

fn content_type(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase())
}

/// Accept HTML, XHTML, and other text bodies; reject binaries like PDFs and images.
fn is_textual(content_type: &str) -> bool {
    content_type.starts_with("text/") || content_type.contains("html") || content_type.contains("xml")
}

/// Extract the trimmed `<title>` and first `<h1>` text.
fn page_headings(html: &str) -> (Option<String>, Option<String>) {
    static TITLE_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("title").expect("valid selector"));
    static H1_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("h1").expect("valid selector"));

    let doc = Html::parse_document(html);
    let text_of = |sel: &Selector| {
        doc.select(sel)
            .next()
            .map(|el| el.text().collect::<Vec<_>>().join(" "))
            .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|t| !t.is_empty())
    };

    (text_of(&TITLE_SEL), text_of(&H1_SEL))
}

fn rate_limit_phrase(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    RATE_LIMIT_PHRASES
        .into_iter()
        .find(|phrase| lower.contains(phrase))
}
