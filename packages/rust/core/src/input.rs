//! URL lists from CSV files.

use std::path::Path;

use tracing::debug;

use mdharvest_shared::{HarvestError, Result};

/// Read the non-empty cells of `column` from a CSV file with a header row.
pub fn read_urls_from_csv(path: &Path, column: &str) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;

    let headers = reader.headers().map_err(|e| csv_error(path, e))?.clone();
    let Some(index) = headers.iter().position(|h| h.trim() == column) else {
        let available: Vec<&str> = headers.iter().map(str::trim).collect();
        return Err(HarvestError::validation(format!(
            "column '{column}' not found in {}; available columns: {}",
            path.display(),
            available.join(", ")
        )));
    };

    let mut urls = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| csv_error(path, e))?;
        if let Some(cell) = row.get(index).map(str::trim).filter(|c| !c.is_empty()) {
            urls.push(cell.to_string());
        }
    }

    debug!(path = %path.display(), column, count = urls.len(), "read URLs from CSV");
    Ok(urls)
}

fn csv_error(path: &Path, err: csv::Error) -> HarvestError {
    if err.is_io_error() {
        if let csv::ErrorKind::Io(io) = err.into_kind() {
            return HarvestError::io(path, io);
        }
        return HarvestError::parse(format!("{}: unreadable CSV", path.display()));
    }
    HarvestError::parse(format!("{}: {err}", path.display()))
}
