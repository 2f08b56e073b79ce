//! Writes successful documents into their domain directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use mdharvest_markdown::filename_stem;
use mdharvest_shared::{Document, HarvestError, Result};

/// Places `.md` files under `<output_dir>/<domain>/`.
#[derive(Debug, Clone)]
pub struct MarkdownWriter {
    output_dir: PathBuf,
}

impl MarkdownWriter {
    /// Create the writer, creating `output_dir` if needed.
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir).map_err(|e| HarvestError::io(&output_dir, e))?;
        Ok(Self { output_dir })
    }

    pub fn domain_dir(&self, domain: &str) -> PathBuf {
        self.output_dir.join(domain)
    }

    /// Write `doc` and return its filename relative to the domain directory.
    ///
    /// `prior_path` is the file an earlier success for the same URL was saved
    /// under; it is overwritten unless another URL's row also claims it.
    /// Otherwise the first name among `<stem>.md`, `<stem>_2.md`, ... that is
    /// neither on disk nor in `claimed` is used.
    pub fn save(
        &self,
        doc: &Document,
        prior_path: Option<&str>,
        claimed: &HashSet<String>,
    ) -> Result<String> {
        if !doc.fetch_status.is_success() {
            return Err(HarvestError::validation(format!(
                "refusing to write unsuccessful document for {}",
                doc.url
            )));
        }

        let dir = self.domain_dir(&doc.domain);
        std::fs::create_dir_all(&dir).map_err(|e| HarvestError::io(&dir, e))?;

        let reusable = prior_path.filter(|p| is_plain_markdown_name(p) && !claimed.contains(*p));
        let file_name = match reusable {
            Some(prior) => prior.to_string(),
            None => free_file_name(&dir, &filename_stem(&doc.title), claimed),
        };

        let file_path = dir.join(&file_name);
        std::fs::write(&file_path, &doc.markdown_content)
            .map_err(|e| HarvestError::io(&file_path, e))?;

        debug!(path = %file_path.display(), title = %doc.title, "wrote document");
        Ok(file_name)
    }
}

fn free_file_name(dir: &Path, stem: &str, claimed: &HashSet<String>) -> String {
    let mut candidate = format!("{stem}.md");
    let mut n = 2;
    while claimed.contains(&candidate) || dir.join(&candidate).exists() {
        candidate = format!("{stem}_{n}.md");
        n += 1;
    }
    candidate
}

/// A ledger path is only reused when it names a file directly in the domain dir.
fn is_plain_markdown_name(name: &str) -> bool {
    name.ends_with(".md") && !name.starts_with('.') && !name.contains(['/', '\\'])
}
