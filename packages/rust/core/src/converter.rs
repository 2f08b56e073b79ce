//! URL → [`Document`] conversion.
//!
//! Every outcome, including transport errors, is folded into the document's
//! [`FetchStatus`] so the orchestrator can always write a ledger row.

use chrono::Utc;
use tracing::{debug, instrument, warn};
use url::Url;

use mdharvest_fetch::{FetchOutcome, FetchedPage, Fetcher};
use mdharvest_markdown::ConvertOptions;
use mdharvest_shared::{Document, FetchConfig, FetchStatus, Result};

/// Fetches article pages and renders them to Markdown documents.
pub struct Converter {
    fetcher: Fetcher,
    frontmatter: bool,
}

impl Converter {
    pub fn new(config: &FetchConfig, frontmatter: bool) -> Result<Self> {
        Ok(Self {
            fetcher: Fetcher::new(config)?,
            frontmatter,
        })
    }

    /// Fetch `url` and convert it. Never fails; errors become `Failed` documents.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn convert(&self, url: &Url, domain: &str) -> Document {
        match self.fetcher.fetch(url).await {
            Ok(FetchOutcome::Page(page)) => self.render(page, domain),
            Ok(FetchOutcome::RateLimited { reason }) => {
                Document::unsuccessful(url.as_str(), domain, FetchStatus::RateLimited { reason })
            }
            Err(e) => {
                warn!(error = %e, "fetch failed");
                Document::unsuccessful(
                    url.as_str(),
                    domain,
                    FetchStatus::Failed {
                        error: e.to_string(),
                    },
                )
            }
        }
    }

    fn render(&self, page: FetchedPage, domain: &str) -> Document {
        let opts = ConvertOptions {
            // Relative links resolve against the post-redirect location.
            source_url: page.final_url.to_string(),
            fallback_title: page.html_title.clone(),
            fetched_at: Some(Utc::now().to_rfc3339()),
            frontmatter: self.frontmatter,
        };

        let failed = |error: String| {
            warn!(url = %page.url, %error, "conversion failed");
            Document::unsuccessful(page.url.as_str(), domain, FetchStatus::Failed { error })
        };

        match mdharvest_markdown::convert(&page.html, &opts) {
            Ok(result) if result.body.trim().is_empty() => {
                failed("conversion produced an empty Markdown body".to_string())
            }
            Ok(result) => {
                debug!(title = %result.title, words = result.word_count, "document ready");
                Document {
                    url: page.url.to_string(),
                    domain: domain.to_string(),
                    title: result.title,
                    markdown_content: result.markdown,
                    fetch_status: FetchStatus::Success,
                }
            }
            Err(e) => failed(e.to_string()),
        }
    }
}
