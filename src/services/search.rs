use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A line of the searched file containing the needle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// 1-based.
    pub line_number: usize,
    pub line: String,
}

/// Scans `path` from disk and returns every line containing `needle`
/// literally (case-sensitive), in file order.
///
/// Always reads the current file contents, never the loaded knowledge base.
pub fn grep(path: impl AsRef<Path>, needle: &str) -> Result<Vec<SearchHit>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let mut hits = Vec::new();
    let mut buf = Vec::new();
    let mut line_number = 0;
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .with_context(|| format!("cannot read {}", path.display()))?;
        if read == 0 {
            break;
        }
        line_number += 1;

        let line = String::from_utf8_lossy(&buf);
        let line = line.strip_suffix('\n').unwrap_or(&line);
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.contains(needle) {
            hits.push(SearchHit {
                line_number,
                line: line.to_string(),
            });
        }
    }

    log::debug!("🔎 '{}' matched {} line(s) in {}", needle, hits.len(), path.display());
    Ok(hits)
}
