//! Decode command implementation.

use super::Format;
use easync_wbxml::{dump, tree};
use std::path::Path;

/// Renders a document in the requested format.
pub fn render(bytes: &[u8], format: Format) -> Result<String, Box<dyn std::error::Error>> {
    match format {
        Format::Text => Ok(dump(bytes)?),
        Format::Json => match tree(bytes)? {
            Some(root) => Ok(serde_json::to_string_pretty(&root)?),
            None => Ok("null".to_string()),
        },
    }
}

/// Runs the decode command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let format = Format::parse(format)?;
    let bytes = std::fs::read(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    tracing::debug!(bytes = bytes.len(), path = %path.display(), "decoding");
    if bytes.is_empty() {
        println!("(empty document)");
        return Ok(());
    }
    println!("{}", render(&bytes, format)?);
    Ok(())
}
