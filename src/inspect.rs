//! Offline `chunk` and `fingerprint` commands.
//!
//! Neither touches the database; both are useful for previewing how a file
//! will be split and whether its content changed since the last ingest.

use anyhow::{Context, Result};
use std::path::Path;

use docspan_core::checksum::{decode_utf8, fingerprint_bytes};
use docspan_core::chunk::chunk;

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Print each span of `file` with its index.
pub fn run_chunk(file: &Path, max_heading_depth: usize) -> Result<()> {
    let bytes = read_file(file)?;
    let text = decode_utf8(&bytes)?;
    let spans = chunk(text, max_heading_depth)?;

    println!("{}: {} spans (depth {})", file.display(), spans.len(), max_heading_depth);
    for (i, span) in spans.iter().enumerate() {
        let heading = span.lines().next().unwrap_or("");
        println!("  [{}] {} ({} bytes)", i, heading, span.len());
    }
    Ok(())
}

/// Print the checksum of `file`, in `md5sum` layout.
pub fn run_fingerprint(file: &Path) -> Result<()> {
    let bytes = read_file(file)?;
    println!("{}  {}", fingerprint_bytes(&bytes)?, file.display());
    Ok(())
}
