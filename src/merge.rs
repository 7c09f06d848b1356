//! Merging of successful outputs into a single artifact.

use crate::{error::Result, outcome::SuccessRecord, writer::OutputWriter};
use std::path::PathBuf;
use tracing::{info, warn};

/// Concatenates outputs in the given order.
///
/// Each record contributes a `# File: <name>` block; the result is trimmed.
/// Returns `None` when there is nothing to merge.
#[must_use]
pub fn merge_contents(outputs: &[SuccessRecord]) -> Option<String> {
    if outputs.is_empty() {
        return None;
    }

    let merged: String = outputs
        .iter()
        .map(|record| {
            format!(
                "\n\n# File: {}\n\n{}",
                record.output_file_name, record.content
            )
        })
        .collect();

    Some(merged.trim().to_string())
}

/// Writes the merged artifact as `destination` in the writer's directory.
///
/// Does nothing and returns `Ok(None)` when `outputs` is empty.
///
/// # Errors
///
/// Returns an error if the merged file cannot be written.
pub async fn write_merged(
    writer: &OutputWriter,
    outputs: &[SuccessRecord],
    destination: &str,
) -> Result<Option<PathBuf>> {
    let Some(merged) = merge_contents(outputs) else {
        warn!("No successful outputs to merge; {} not written", destination);
        return Ok(None);
    };

    let path = writer.write(destination, &merged).await?;
    info!("✓ Merged {} files into {}", outputs.len(), path.display());
    Ok(Some(path))
}
