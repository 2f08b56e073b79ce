//! End-to-end harvest: URLs → skip check → fetch + convert → files + ledger rows.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use url::Url;

use mdharvest_ledger::Ledger;
use mdharvest_shared::{
    Document, FetchStatus, HarvestConfig, HarvestError, LedgerStatus, MetadataRecord, Result,
    domain_slug, parse_article_url,
};

use crate::converter::Converter;
use crate::writer::MarkdownWriter;

/// Outcome counts of one harvest run.
///
/// `total` counts distinct inputs and always equals
/// `skipped + succeeded + rate_limited + failed + invalid`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HarvestSummary {
    pub total: usize,
    pub skipped: usize,
    pub succeeded: usize,
    pub rate_limited: usize,
    pub failed: usize,
    pub invalid: usize,
    /// Ledger rows that could not be written.
    pub ledger_errors: usize,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    pub rate_limited_urls: Vec<String>,
    pub failed_urls: Vec<String>,
    pub invalid_urls: Vec<String>,
}

impl HarvestSummary {
    /// URLs that were fetched this run.
    pub fn processed(&self) -> usize {
        self.succeeded + self.rate_limited + self.failed
    }

    /// True when every processed URL succeeded and every ledger row was written.
    pub fn is_clean(&self) -> bool {
        self.rate_limited == 0 && self.failed == 0 && self.invalid == 0 && self.ledger_errors == 0
    }
}

fn serialize_secs<S: Serializer>(
    elapsed: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}

/// Progress callback for reporting harvest status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once before fetching with the number of URLs to process.
    fn fetch_started(&self, total: usize);
    /// Called after a URL's outcome has been recorded.
    fn url_finished(&self, url: &str, status: LedgerStatus, current: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, summary: &HarvestSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn fetch_started(&self, _total: usize) {}
    fn url_finished(&self, _url: &str, _status: LedgerStatus, _current: usize, _total: usize) {}
    fn done(&self, _summary: &HarvestSummary) {}
}

/// A validated input URL and its domain folder.
#[derive(Debug, Clone)]
struct Target {
    url: Url,
    domain: String,
}

/// Run the harvest over `urls`.
///
/// 1. Validate and deduplicate inputs
/// 2. Drop URLs the ledgers already mark as downloaded
/// 3. Fetch and convert in batches of `concurrency` tasks
/// 4. Write files and ledger rows sequentially as each batch finishes
///
/// Per-URL failures end up in the ledger and the summary. Only setup errors
/// (an unusable output directory, an HTTP client that cannot be built) are
/// returned as `Err`.
#[instrument(skip_all, fields(output_dir = %config.output_dir.display(), inputs = urls.len()))]
pub async fn harvest(
    config: &HarvestConfig,
    urls: Vec<String>,
    progress: &dyn ProgressReporter,
) -> Result<HarvestSummary> {
    let start = Instant::now();
    let mut summary = HarvestSummary::default();

    // --- Phase 1: Validate inputs ---
    progress.phase("Validating URLs");
    let targets = validate_inputs(urls, &mut summary);

    // --- Phase 2: Skip check ---
    progress.phase("Checking ledgers");
    std::fs::create_dir_all(&config.output_dir)
        .map_err(|e| HarvestError::io(&config.output_dir, e))?;
    let writer = MarkdownWriter::new(&config.output_dir)?;
    let mut ledger = Ledger::new(&config.output_dir, config.skip_existing);

    let mut queue: Vec<Target> = Vec::with_capacity(targets.len());
    for target in targets {
        if ledger.should_process(target.url.as_str(), &target.domain) {
            queue.push(target);
        } else {
            debug!(url = %target.url, "skipping, already downloaded");
            summary.skipped += 1;
        }
    }

    if queue.is_empty() {
        info!(skipped = summary.skipped, invalid = summary.invalid, "no new URLs to process");
        summary.elapsed = start.elapsed();
        progress.done(&summary);
        return Ok(summary);
    }

    // --- Phase 3: Fetch, convert, record ---
    progress.phase("Fetching articles");
    let converter = Arc::new(Converter::new(&config.fetch, config.frontmatter)?);
    let concurrency = config.concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let to_process = queue.len();
    let mut completed = 0;

    info!(
        urls = to_process,
        skipped = summary.skipped,
        concurrency,
        "starting harvest"
    );
    progress.fetch_started(to_process);

    while !queue.is_empty() {
        let batch: Vec<Target> = {
            let drain_count = queue.len().min(concurrency);
            queue.drain(..drain_count).collect()
        };

        let mut handles = Vec::with_capacity(batch.len());
        for target in &batch {
            let converter = converter.clone();
            let sem = semaphore.clone();
            let url = target.url.clone();
            let domain = target.domain.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = sem.acquire().await else {
                    return Document::unsuccessful(
                        url.as_str(),
                        domain,
                        FetchStatus::Failed {
                            error: "worker pool closed".to_string(),
                        },
                    );
                };
                converter.convert(&url, &domain).await
            }));
        }

        // Results are settled in input order so file names and ledger rows
        // are assigned deterministically.
        for (target, handle) in batch.into_iter().zip(handles) {
            let doc = match handle.await {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(url = %target.url, error = %e, "conversion task failed");
                    Document::unsuccessful(
                        target.url.as_str(),
                        target.domain.as_str(),
                        FetchStatus::Failed {
                            error: format!("conversion task failed: {e}"),
                        },
                    )
                }
            };

            let url = doc.url.clone();
            let status = settle(&writer, &mut ledger, doc, &mut summary);
            completed += 1;
            progress.url_finished(&url, status, completed, to_process);
        }
    }

    summary.elapsed = start.elapsed();

    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        rate_limited = summary.rate_limited,
        failed = summary.failed,
        skipped = summary.skipped,
        invalid = summary.invalid,
        ledger_errors = summary.ledger_errors,
        elapsed_ms = summary.elapsed.as_millis(),
        "harvest completed"
    );

    progress.done(&summary);
    Ok(summary)
}

/// Parse inputs, collapsing duplicates to their first occurrence.
fn validate_inputs(urls: Vec<String>, summary: &mut HarvestSummary) -> Vec<Target> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for raw in urls {
        let raw = raw.trim().to_string();
        match parse_article_url(&raw) {
            Ok(url) => {
                if seen.insert(url.to_string()) {
                    let domain = domain_slug(&url);
                    targets.push(Target { url, domain });
                } else {
                    debug!(url = %url, "duplicate input");
                }
            }
            Err(e) => {
                if seen.insert(raw.clone()) {
                    warn!(input = %raw, error = %e, "invalid URL");
                    summary.invalid_urls.push(raw);
                }
            }
        }
    }

    summary.invalid = summary.invalid_urls.len();
    summary.total = targets.len() + summary.invalid;
    targets
}

/// Write the file (on success) and the single ledger row for one document.
fn settle(
    writer: &MarkdownWriter,
    ledger: &mut Ledger,
    doc: Document,
    summary: &mut HarvestSummary,
) -> LedgerStatus {
    let record = if doc.fetch_status.is_success() {
        let prior = ledger.prior_path(&doc.url, &doc.domain);
        let claimed = ledger.claimed_paths(&doc.url, &doc.domain);
        match writer.save(&doc, prior.as_deref(), &claimed) {
            Ok(path) => MetadataRecord::success(path, &doc.title, &doc.url, &doc.domain),
            Err(e) => {
                warn!(url = %doc.url, error = %e, "failed to write markdown");
                MetadataRecord::failure(
                    &doc.url,
                    &doc.domain,
                    LedgerStatus::Failed,
                    format!("failed to write markdown: {e}"),
                )
            }
        }
    } else {
        MetadataRecord::from_unsuccessful(&doc)
    };

    let status = record.status;
    match status {
        LedgerStatus::Success => {
            info!(url = %record.url, path = %record.path, "saved");
            summary.succeeded += 1;
        }
        LedgerStatus::RateLimited => {
            warn!(url = %record.url, reason = %record.error_str, "rate limited");
            summary.rate_limited += 1;
            summary.rate_limited_urls.push(record.url.clone());
        }
        LedgerStatus::Failed => {
            warn!(url = %record.url, error = %record.error_str, "failed");
            summary.failed += 1;
            summary.failed_urls.push(record.url.clone());
        }
    }

    let url = record.url.clone();
    if let Err(e) = ledger.record(record) {
        warn!(url = %url, error = %e, "failed to write ledger row");
        summary.ledger_errors += 1;
    }

    status
}
