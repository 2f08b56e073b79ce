//! Per-domain `meta.csv` ledgers.
//!
//! Each domain directory under the output root carries one ledger with a row
//! per processed URL. The [`Ledger`] handle loads domain ledgers lazily and
//! answers the two questions the harvest loop asks: should this URL be
//! fetched, and where did a previous success land.
//!
//! **Access rules:**
//! - One [`Ledger`] per run is the sole writer of every `meta.csv`.
//! - Writes go through a temp file and a rename, so a crash never leaves a
//!   half-written ledger behind.

mod domain_ledger;

use std::collections::{HashMap, HashSet};
use std::collections::hash_map::Entry;
use std::path::PathBuf;

use mdharvest_shared::{HarvestError, MetadataRecord, Result};
use tracing::{debug, warn};

pub use domain_ledger::{DomainLedger, LEDGER_FILE_NAME};

/// Handle over all domain ledgers under one output directory.
#[derive(Debug)]
pub struct Ledger {
    output_dir: PathBuf,
    skip_existing: bool,
    domains: HashMap<String, DomainLedger>,
}

impl Ledger {
    pub fn new(output_dir: impl Into<PathBuf>, skip_existing: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            skip_existing,
            domains: HashMap::new(),
        }
    }

    /// Load (once) and return the ledger for `domain`.
    ///
    /// A ledger that fails to load is not cached, so the next call retries.
    pub fn domain(&mut self, domain: &str) -> Result<&mut DomainLedger> {
        match self.domains.entry(domain.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let ledger = DomainLedger::open(&self.output_dir, domain)?;
                Ok(entry.insert(ledger))
            }
        }
    }

    /// Whether `url` needs fetching.
    ///
    /// False only when skipping is on and the domain ledger already has a
    /// success row for it. An unreadable ledger means the URL is processed.
    pub fn should_process(&mut self, url: &str, domain: &str) -> bool {
        if !self.skip_existing {
            return true;
        }

        match self.domain(domain) {
            Ok(ledger) => {
                let done = ledger.is_done(url);
                if done {
                    debug!(url, domain, "already in ledger");
                }
                !done
            }
            Err(e) => {
                warn!(url, domain, error = %e, "ledger unreadable, processing URL anyway");
                true
            }
        }
    }

    /// Filename of the previous success row for `url`, if any.
    pub fn prior_path(&mut self, url: &str, domain: &str) -> Option<String> {
        let ledger = self.domain(domain).ok()?;
        ledger
            .lookup(url)
            .filter(|row| row.is_success() && !row.path.is_empty())
            .map(|row| row.path.clone())
    }

    /// Filenames in `domain` owned by success rows of URLs other than `url`.
    ///
    /// An unreadable ledger claims nothing; its rows cannot be written anyway.
    pub fn claimed_paths(&mut self, url: &str, domain: &str) -> HashSet<String> {
        self.domain(domain)
            .map(|ledger| ledger.paths_claimed_by_others(url))
            .unwrap_or_default()
    }

    /// Write `record` into its domain's ledger, replacing any row for the same URL.
    pub fn record(&mut self, record: MetadataRecord) -> Result<()> {
        let domain = record.domain.clone();
        let url = record.url.clone();
        let status = record.status;

        let ledger = self.domain(&domain)?;
        ledger.upsert(record)?;
        debug!(url, domain, %status, rows = ledger.len(), "ledger row written");
        Ok(())
    }

    /// URLs with a non-success row in any domain ledger, ordered by domain.
    ///
    /// Ledgers already loaded by this handle are read from memory. Ledgers
    /// that fail to parse are skipped with a warning.
    pub fn unfinished_urls(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.output_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(HarvestError::io(&self.output_dir, e)),
        };

        let mut domains: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().join(LEDGER_FILE_NAME).is_file())
            .filter_map(|entry| entry.file_name().to_str().map(String::from))
            .collect();
        domains.sort();

        let mut urls = Vec::new();
        for domain in domains {
            let loaded;
            let ledger = match self.domains.get(&domain) {
                Some(ledger) => ledger,
                None => match DomainLedger::open(&self.output_dir, &domain) {
                    Ok(ledger) => {
                        loaded = ledger;
                        &loaded
                    }
                    Err(e) => {
                        warn!(domain, error = %e, "skipping unreadable ledger");
                        continue;
                    }
                },
            };

            urls.extend(
                ledger
                    .records()
                    .iter()
                    .filter(|row| !row.is_success())
                    .map(|row| row.url.clone()),
            );
        }

        Ok(urls)
    }
}
