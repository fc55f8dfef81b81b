//! Line-oriented batch files: one record per line

use super::{Batch, Record};
use crate::error::{DistSortError, Result};
use std::path::Path;
use tracing::debug;

/// Load a batch from a file, one record per non-blank line.
///
/// Any line that does not parse as a key aborts the load.
pub async fn load_batch(path: &Path) -> Result<Batch> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| DistSortError::Storage {
            path: path.to_path_buf(),
            source,
        })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let batch = parse_batch(name, &content)?;
    debug!("Loaded {} records from {}", batch.len(), path.display());
    Ok(batch)
}

/// Parse batch contents from text
pub fn parse_batch(name: impl Into<String>, content: &str) -> Result<Batch> {
    let mut batch = Batch::new(name);
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        batch.push(Record::parse_line(index + 1, line)?);
    }
    Ok(batch)
}

/// Render a batch as one record text per line, in batch order
pub fn render_batch(batch: &Batch) -> String {
    let mut out = String::with_capacity(batch.len() * 8);
    for record in batch.records() {
        out.push_str(record.text());
        out.push('\n');
    }
    out
}

/// Write a batch to a file, replacing any previous contents
pub async fn write_batch(path: &Path, batch: &Batch) -> Result<()> {
    tokio::fs::write(path, render_batch(batch))
        .await
        .map_err(|source| DistSortError::Storage {
            path: path.to_path_buf(),
            source,
        })?;
    debug!("Wrote {} records to {}", batch.len(), path.display());
    Ok(())
}
