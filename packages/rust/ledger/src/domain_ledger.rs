//! One domain's `meta.csv`.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use mdharvest_shared::{HarvestError, MetadataRecord, Result, parse_article_url};
use tracing::debug;

/// Ledger file name inside each domain directory.
pub const LEDGER_FILE_NAME: &str = "meta.csv";

/// In-memory copy of a domain ledger, persisted on every write.
///
/// URLs are unique: loading keeps the last row for a repeated URL, and
/// [`DomainLedger::upsert`] replaces an existing row in place. Rows are
/// keyed by the parsed URL, so `http://host` and `http://host/` are one row.
#[derive(Debug)]
pub struct DomainLedger {
    domain: String,
    path: PathBuf,
    records: Vec<MetadataRecord>,
    index: HashMap<String, usize>,
}

impl DomainLedger {
    /// Path of the ledger for `domain` under `output_dir`.
    pub fn path_for(output_dir: &Path, domain: &str) -> PathBuf {
        output_dir.join(domain).join(LEDGER_FILE_NAME)
    }

    /// Load the ledger for `domain`. A missing file is an empty ledger.
    pub fn open(output_dir: &Path, domain: &str) -> Result<Self> {
        let path = Self::path_for(output_dir, domain);
        let mut ledger = Self {
            domain: domain.to_string(),
            path,
            records: Vec::new(),
            index: HashMap::new(),
        };

        if ledger.path.exists() {
            for record in read_records(&ledger.path)? {
                ledger.insert(record);
            }
            debug!(
                domain,
                rows = ledger.records.len(),
                path = %ledger.path.display(),
                "loaded domain ledger"
            );
        }

        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[MetadataRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The row recorded for `url`, if any.
    pub fn lookup(&self, url: &str) -> Option<&MetadataRecord> {
        self.index.get(&url_key(url)).map(|&i| &self.records[i])
    }

    /// Whether `url` already has a success row.
    pub fn is_done(&self, url: &str) -> bool {
        self.lookup(url).is_some_and(MetadataRecord::is_success)
    }

    /// Filenames held by success rows of URLs other than `url`.
    pub fn paths_claimed_by_others(&self, url: &str) -> HashSet<String> {
        let key = url_key(url);
        self.records
            .iter()
            .filter(|row| row.is_success() && !row.path.is_empty() && url_key(&row.url) != key)
            .map(|row| row.path.clone())
            .collect()
    }

    /// Insert or replace the row for `record.url`, then rewrite the file.
    ///
    /// The in-memory rows only change once the file has been replaced.
    pub fn upsert(&mut self, record: MetadataRecord) -> Result<()> {
        if record.domain != self.domain {
            return Err(HarvestError::Ledger(format!(
                "record for domain '{}' written to ledger '{}'",
                record.domain, self.domain
            )));
        }

        let key = url_key(&record.url);
        let mut rows = self.records.clone();
        match self.index.get(&key) {
            Some(&i) => rows[i] = record.clone(),
            None => rows.push(record.clone()),
        }

        self.persist(&rows)?;
        self.insert(record);
        Ok(())
    }

    fn insert(&mut self, record: MetadataRecord) {
        let key = url_key(&record.url);
        match self.index.get(&key) {
            Some(&i) => self.records[i] = record,
            None => {
                self.index.insert(key, self.records.len());
                self.records.push(record);
            }
        }
    }

    /// Write `rows` to `meta.csv.tmp` and rename it over `meta.csv`.
    fn persist(&self, rows: &[MetadataRecord]) -> Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| HarvestError::Ledger(format!("{} has no parent", self.path.display())))?;
        std::fs::create_dir_all(dir).map_err(|e| HarvestError::io(dir, e))?;

        let tmp_path = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp_path).map_err(|e| ledger_error(&tmp_path, e))?;
            for record in rows {
                writer
                    .serialize(record)
                    .map_err(|e| ledger_error(&tmp_path, e))?;
            }
            writer.flush().map_err(|e| HarvestError::io(&tmp_path, e))?;
        }

        std::fs::rename(&tmp_path, &self.path).map_err(|e| HarvestError::io(&self.path, e))?;
        Ok(())
    }
}

/// Index key for a URL: its normalized form, or the trimmed text if it does not parse.
fn url_key(url: &str) -> String {
    parse_article_url(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.trim().to_string())
}

/// Read every row of a ledger file.
fn read_records(path: &Path) -> Result<Vec<MetadataRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| ledger_error(path, e))?;

    reader
        .deserialize::<MetadataRecord>()
        .map(|row| row.map_err(|e| ledger_error(path, e)))
        .collect()
}

fn ledger_error(path: &Path, err: csv::Error) -> HarvestError {
    HarvestError::Ledger(format!("{}: {err}", path.display()))
}
