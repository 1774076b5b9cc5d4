//! Local issue ID allocation.
//!
//! Locally minted issues are named `PREFIX-NNN`. The next number lives in
//! `issues/counter.json`; when that record is missing or invalid the
//! allocator rebuilds it from the highest numbered issue directory.

use crate::error::{LoopError, Result};
use crate::storage::atomic::{atomic_write_json, read_json_opt};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// File name of the counter record inside the issues root.
pub const COUNTER_FILE: &str = "counter.json";

/// Minimum width of the numeric part of a local id.
const ID_WIDTH: usize = 3;

/// On-disk counter record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    /// Next number to hand out.
    pub next: u64,
}

/// Format a local id, zero padding the number to three digits.
#[must_use]
pub fn format_local_id(prefix: &str, number: u64) -> String {
    format!("{prefix}-{number:0width$}", width = ID_WIDTH)
}

/// Build the matcher for local ids with `prefix`.
///
/// # Errors
///
/// Returns an error if the prefix is empty or produces an invalid pattern.
pub fn local_id_pattern(prefix: &str) -> Result<Regex> {
    if prefix.trim().is_empty() {
        return Err(LoopError::Config("local id prefix cannot be empty".to_string()));
    }
    let pattern = format!(r"^{}-(\d{{{},}})$", regex::escape(prefix), ID_WIDTH);
    Regex::new(&pattern)
        .map_err(|e| LoopError::Config(format!("invalid local id prefix '{prefix}': {e}")))
}

/// Check whether `id` was minted locally with `prefix`.
#[must_use]
pub fn is_local_id(prefix: &str, id: &str) -> bool {
    local_id_pattern(prefix).is_ok_and(|re| re.is_match(id))
}

/// Extract the number of a local id, if it matches.
#[must_use]
pub fn parse_local_number(pattern: &Regex, id: &str) -> Option<u64> {
    pattern
        .captures(id)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Highest local number among the issue directories under `issues_dir`.
#[must_use]
pub fn scan_max_local_number(issues_dir: &Path, pattern: &Regex) -> u64 {
    let Ok(entries) = fs::read_dir(issues_dir) else {
        return 0;
    };

    entries
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .filter_map(|entry| {
            let name = entry.file_name();
            parse_local_number(pattern, &name.to_string_lossy())
        })
        .max()
        .unwrap_or(0)
}

fn read_counter(path: &Path) -> Option<u64> {
    read_json_opt::<Counter>(path)
        .map(|c| c.next)
        .filter(|next| (1..u64::MAX).contains(next))
}

fn exhausted(prefix: &str) -> LoopError {
    LoopError::Config(format!("Local id space for prefix '{prefix}' is exhausted"))
}

/// Allocate the next local id and persist the advanced counter.
///
/// A missing or corrupt counter, or one that cannot advance, is rebuilt
/// from a directory scan. A counter that lags behind existing directories is moved forward
/// so allocation never collides with an issue already on disk.
///
/// # Errors
///
/// Returns an error if the prefix is invalid, the id space is exhausted,
/// or the counter cannot be written.
pub fn allocate_next_id(issues_dir: &Path, prefix: &str) -> Result<String> {
    let pattern = local_id_pattern(prefix)?;
    let counter_path = issues_dir.join(COUNTER_FILE);
    let scanned_next = scan_max_local_number(issues_dir, &pattern)
        .checked_add(1)
        .ok_or_else(|| exhausted(prefix))?;

    let number = match read_counter(&counter_path) {
        Some(next) if next >= scanned_next => next,
        Some(next) => {
            warn!(
                counter = next,
                scanned = scanned_next,
                "Counter behind existing issues, advancing"
            );
            scanned_next
        }
        None => {
            warn!(
                path = %counter_path.display(),
                resume_at = scanned_next,
                "Counter missing or invalid, recovered from directory scan"
            );
            scanned_next
        }
    };

    let next = number.checked_add(1).ok_or_else(|| exhausted(prefix))?;
    atomic_write_json(&counter_path, &Counter { next })?;

    let id = format_local_id(prefix, number);
    debug!(id = %id, "Allocated local id");
    Ok(id)
}
