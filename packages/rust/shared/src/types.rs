//! Core domain types: converted documents and ledger rows.

use serde::{Deserialize, Serialize};

/// Column order of every `meta.csv` ledger.
pub const LEDGER_FIELDS: [&str; 6] = ["path", "title", "url", "domain", "status", "error_str"];

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// Outcome of fetching and converting one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    /// Page fetched and converted to Markdown.
    Success,
    /// The server signalled rate limiting; left for a later re-run.
    RateLimited { reason: String },
    /// Network, HTTP, or conversion failure.
    Failed { error: String },
}

impl FetchStatus {
    /// The ledger status this outcome is recorded under.
    pub fn ledger_status(&self) -> LedgerStatus {
        match self {
            Self::Success => LedgerStatus::Success,
            Self::RateLimited { .. } => LedgerStatus::RateLimited,
            Self::Failed { .. } => LedgerStatus::Failed,
        }
    }

    /// Human-readable error for non-success outcomes, empty for success.
    pub fn error_str(&self) -> &str {
        match self {
            Self::Success => "",
            Self::RateLimited { reason } => reason,
            Self::Failed { error } => error,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// The in-memory result of converting one URL's content to Markdown.
///
/// Produced once per fetch attempt and consumed once by the writer.
/// `title` and `markdown_content` are empty unless `fetch_status` is
/// [`FetchStatus::Success`].
#[derive(Debug, Clone)]
pub struct Document {
    /// The URL as requested.
    pub url: String,
    /// Domain slug the document belongs to.
    pub domain: String,
    /// Human-readable article title.
    pub title: String,
    /// Final Markdown text (including frontmatter when enabled).
    pub markdown_content: String,
    /// How the fetch went.
    pub fetch_status: FetchStatus,
}

impl Document {
    /// Build a document for an attempt that produced no content.
    pub fn unsuccessful(url: impl Into<String>, domain: impl Into<String>, status: FetchStatus) -> Self {
        Self {
            url: url.into(),
            domain: domain.into(),
            title: String::new(),
            markdown_content: String::new(),
            fetch_status: status,
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger rows
// ---------------------------------------------------------------------------

/// Status column of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    Success,
    Failed,
    RateLimited,
}

impl LedgerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::RateLimited => "rate_limited",
        }
    }
}

impl std::fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a domain's `meta.csv`.
///
/// Field order matches [`LEDGER_FIELDS`]; `csv` serializes the header from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Markdown filename relative to the domain directory (empty unless success).
    #[serde(default)]
    pub path: String,
    /// Article title (empty unless success).
    #[serde(default)]
    pub title: String,
    /// Original URL.
    pub url: String,
    /// Domain slug.
    pub domain: String,
    /// Outcome of the attempt.
    pub status: LedgerStatus,
    /// Error message if status is not success.
    #[serde(default)]
    pub error_str: String,
}

impl MetadataRecord {
    /// Row for a successfully written document.
    pub fn success(
        path: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
            url: url.into(),
            domain: domain.into(),
            status: LedgerStatus::Success,
            error_str: String::new(),
        }
    }

    /// Row for an attempt that did not produce a file.
    pub fn failure(
        url: impl Into<String>,
        domain: impl Into<String>,
        status: LedgerStatus,
        error: impl Into<String>,
    ) -> Self {
        let mut error_str = error.into();
        if error_str.trim().is_empty() {
            error_str = format!("{status} without error detail");
        }
        Self {
            path: String::new(),
            title: String::new(),
            url: url.into(),
            domain: domain.into(),
            status,
            error_str,
        }
    }

    /// Row for a non-success document.
    pub fn from_unsuccessful(doc: &Document) -> Self {
        Self::failure(
            doc.url.clone(),
            doc.domain.clone(),
            doc.fetch_status.ledger_status(),
            doc.fetch_status.error_str(),
        )
    }

    pub fn is_success(&self) -> bool {
        self.status == LedgerStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_status_maps_to_ledger_status() {
        assert_eq!(FetchStatus::Success.ledger_status(), LedgerStatus::Success);
        let rl = FetchStatus::RateLimited {
            reason: "HTTP 429 Too Many Requests".into(),
        };
        assert_eq!(rl.ledger_status(), LedgerStatus::RateLimited);
        assert_eq!(rl.error_str(), "HTTP 429 Too Many Requests");
        assert_eq!(FetchStatus::Success.error_str(), "");
    }

    #[test]
    fn failure_record_always_has_error_text() {
        let row = MetadataRecord::failure("https://a.com/x", "a", LedgerStatus::Failed, "  ");
        assert!(!row.error_str.trim().is_empty());
        assert!(row.path.is_empty());
        assert!(!row.is_success());
    }

    #[test]
    fn record_from_unsuccessful_document() {
        let doc = Document::unsuccessful(
            "https://example.com/post",
            "example",
            FetchStatus::Failed {
                error: "network error: connection refused".into(),
            },
        );
        let row = MetadataRecord::from_unsuccessful(&doc);
        assert_eq!(row.status, LedgerStatus::Failed);
        assert_eq!(row.domain, "example");
        assert!(row.error_str.contains("connection refused"));
    }

    #[test]
    fn ledger_status_display_is_snake_case() {
        assert_eq!(LedgerStatus::RateLimited.to_string(), "rate_limited");
        assert_eq!(LedgerStatus::Success.as_str(), "success");
    }
}
