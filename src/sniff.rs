use std::{fs::File, io::Read, path::Path};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::{info, warn};
use serde::Serialize;

use crate::printable_delimiter;

pub const DEFAULT_SAMPLE_BYTES: usize = 2048;

const CANDIDATES: &[u8] = b",|;\t:";

/// How the delimiter used for a load was chosen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DelimiterChoice {
    Provided { delimiter: char },
    Detected { delimiter: char },
    Fallback { delimiter: char, reason: String },
}

impl DelimiterChoice {
    pub fn delimiter(&self) -> u8 {
        let ch = match self {
            DelimiterChoice::Provided { delimiter }
            | DelimiterChoice::Detected { delimiter }
            | DelimiterChoice::Fallback { delimiter, .. } => *delimiter,
        };
        ch as u8
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, DelimiterChoice::Fallback { .. })
    }
}

/// Reads up to `sample_bytes` from `path` and sniffs the delimiter, falling
/// back to `default` when the sample cannot be read or is inconclusive.
pub fn detect_delimiter(path: &Path, sample_bytes: usize, default: u8) -> DelimiterChoice {
    let outcome = read_sample(path, sample_bytes).map(|(sample, truncated)| {
        sniff_delimiter(&sample, truncated)
    });
    match outcome {
        Ok(Some(delimiter)) => {
            info!(
                "Detected delimiter '{}' in {:?}",
                printable_delimiter(delimiter),
                path
            );
            DelimiterChoice::Detected {
                delimiter: delimiter as char,
            }
        }
        Ok(None) => fallback(default, "no consistent delimiter in sample".to_string()),
        Err(err) => fallback(default, format!("{err:#}")),
    }
}

fn fallback(default: u8, reason: String) -> DelimiterChoice {
    warn!(
        "Delimiter detection failed ({reason}); using default '{}'",
        printable_delimiter(default)
    );
    DelimiterChoice::Fallback {
        delimiter: default as char,
        reason,
    }
}

fn read_sample(path: &Path, sample_bytes: usize) -> Result<(String, bool)> {
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    let mut buffer = Vec::with_capacity(sample_bytes);
    file.take(sample_bytes as u64)
        .read_to_end(&mut buffer)
        .with_context(|| format!("Reading sample from {path:?}"))?;
    let truncated = buffer.len() == sample_bytes;
    Ok((String::from_utf8_lossy(&buffer).into_owned(), truncated))
}

/// Picks the candidate whose per-line count is most consistent across the
/// sample. `truncated` drops the last line, which may be cut mid-record.
pub fn sniff_delimiter(sample: &str, truncated: bool) -> Option<u8> {
    let mut lines = sample
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>();
    if truncated && lines.len() > 1 {
        lines.pop();
    }
    if lines.is_empty() {
        return None;
    }

    let mut best: Option<(u8, usize, usize)> = None;
    for &candidate in CANDIDATES {
        let counts = lines
            .iter()
            .map(|line| count_unquoted(line, candidate))
            .collect::<Vec<_>>();
        let Some((mode, matches)) = counts
            .iter()
            .counts()
            .into_iter()
            .filter(|(count, _)| **count > 0)
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
            .map(|(count, matches)| (*count, matches))
        else {
            continue;
        };
        let better = match best {
            None => true,
            Some((_, best_mode, best_matches)) => {
                matches > best_matches || (matches == best_matches && mode > best_mode)
            }
        };
        if better {
            best = Some((candidate, mode, matches));
        }
    }
    best.map(|(delimiter, _, _)| delimiter)
}

fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for byte in line.bytes() {
        if byte == b'"' {
            in_quotes = !in_quotes;
        } else if byte == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}
