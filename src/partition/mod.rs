//! Split a master wells list into evenly sized part files, one per instance.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{OrchestrateError, Result};

/// Trimmed, non-empty lines that are not `#` comments.
pub fn clean_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Contiguous chunks; the first `len % parts` chunks get one extra item.
pub fn chunks_even<T: Clone>(items: &[T], parts: usize) -> Vec<Vec<T>> {
    if parts == 0 {
        return Vec::new();
    }
    let base = items.len() / parts;
    let rem = items.len() % parts;
    let mut out = Vec::with_capacity(parts);
    let mut start = 0;
    for k in 0..parts {
        let size = base + usize::from(k < rem);
        out.push(items[start..start + size].to_vec());
        start += size;
    }
    out
}

/// Zero-padding width used in part file names.
pub fn pad_width(parts: usize) -> usize {
    parts.saturating_sub(1).to_string().len().max(2)
}

/// Write `wells_NN.txt` files into `outdir` and return their paths.
pub fn split_wells(master: &Path, outdir: &Path, parts: usize) -> Result<Vec<PathBuf>> {
    if parts == 0 {
        return Err(OrchestrateError::invalid("parts must be >= 1"));
    }
    if !master.is_file() {
        return Err(OrchestrateError::invalid(format!(
            "wells file not found: {}",
            master.display()
        )));
    }
    let bytes = std::fs::read(master)?;
    let lines = clean_lines(&String::from_utf8_lossy(&bytes));
    if lines.is_empty() {
        return Err(OrchestrateError::invalid(
            "no wells after cleaning (empty or only comments)",
        ));
    }

    std::fs::create_dir_all(outdir)?;
    let width = pad_width(parts);
    let mut written = Vec::with_capacity(parts);
    for (i, group) in chunks_even(&lines, parts).iter().enumerate() {
        let path = outdir.join(format!("wells_{i:0width$}.txt"));
        let mut body = group.join("\n");
        body.push('\n');
        std::fs::write(&path, body)?;
        written.push(path);
    }
    info!(
        parts = written.len(),
        wells = lines.len(),
        outdir = %outdir.display(),
        "[ok] wrote {} parts (zero-padded to width {})",
        written.len(),
        width
    );
    Ok(written)
}
