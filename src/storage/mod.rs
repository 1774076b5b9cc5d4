//! Durable per-issue state for `loopwork`.
//!
//! Layout under the issues root:
//!
//! ```text
//! issues/
//!   counter.json
//!   <issue-id>/
//!     parent.json
//!     tasks/<identifier>.json
//!     execution/iterations.json
//!     pending-updates.json
//!     summary.json
//! ```
//!
//! Each file is replaced atomically on its own; there is no transaction
//! spanning two files. Reads degrade to empty values on missing or corrupt
//! records so one bad file never blocks the rest of the store.

pub mod atomic;
pub mod ids;

pub use atomic::{atomic_write, atomic_write_json, read_json_opt, read_json_or_default};
pub use ids::{COUNTER_FILE, allocate_next_id, format_local_id, is_local_id, local_id_pattern};

use crate::error::Result;
use crate::model::{
    CompletionSummary, IterationEntry, ParentSpec, PendingUpdate, PendingUpdateKind,
    PendingUpdatesQueue, SubTaskSpec,
};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PARENT_FILE: &str = "parent.json";
const TASKS_DIR: &str = "tasks";
const EXECUTION_DIR: &str = "execution";
const ITERATIONS_FILE: &str = "iterations.json";
const PENDING_UPDATES_FILE: &str = "pending-updates.json";
const SUMMARY_FILE: &str = "summary.json";

/// Turn an id into a single safe path component.
fn path_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        format!("_{cleaned}")
    } else {
        cleaned
    }
}

/// File-backed store rooted at an issues directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateStore {
    issues_dir: PathBuf,
}

impl StateStore {
    /// Create a store over `issues_dir`. Nothing is created until the first
    /// write.
    #[must_use]
    pub fn new(issues_dir: impl Into<PathBuf>) -> Self {
        Self {
            issues_dir: issues_dir.into(),
        }
    }

    #[must_use]
    pub fn issues_dir(&self) -> &Path {
        &self.issues_dir
    }

    #[must_use]
    pub fn issue_dir(&self, issue_id: &str) -> PathBuf {
        self.issues_dir.join(path_component(issue_id))
    }

    #[must_use]
    pub fn parent_path(&self, issue_id: &str) -> PathBuf {
        self.issue_dir(issue_id).join(PARENT_FILE)
    }

    #[must_use]
    pub fn tasks_dir(&self, issue_id: &str) -> PathBuf {
        self.issue_dir(issue_id).join(TASKS_DIR)
    }

    #[must_use]
    pub fn task_path(&self, issue_id: &str, identifier: &str) -> PathBuf {
        self.tasks_dir(issue_id)
            .join(format!("{}.json", path_component(identifier)))
    }

    #[must_use]
    pub fn iterations_path(&self, issue_id: &str) -> PathBuf {
        self.issue_dir(issue_id)
            .join(EXECUTION_DIR)
            .join(ITERATIONS_FILE)
    }

    #[must_use]
    pub fn pending_updates_path(&self, issue_id: &str) -> PathBuf {
        self.issue_dir(issue_id).join(PENDING_UPDATES_FILE)
    }

    #[must_use]
    pub fn summary_path(&self, issue_id: &str) -> PathBuf {
        self.issue_dir(issue_id).join(SUMMARY_FILE)
    }

    // === Identity ===

    /// Allocate the next `PREFIX-NNN` id for a locally created issue.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix is invalid or the counter cannot be
    /// written.
    pub fn allocate_next_id(&self, prefix: &str) -> Result<String> {
        ids::allocate_next_id(&self.issues_dir, prefix)
    }

    /// All issue directories, sorted by name.
    #[must_use]
    pub fn list_issue_ids(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.issues_dir) else {
            return Vec::new();
        };

        let mut ids: Vec<String> = entries
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .filter(|name| !name.starts_with('.'))
            .collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn issue_exists(&self, issue_id: &str) -> bool {
        self.issue_dir(issue_id).is_dir()
    }

    /// Remove an issue directory and everything in it.
    ///
    /// Returns `false` if there was nothing to remove.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    pub fn delete_issue(&self, issue_id: &str) -> Result<bool> {
        let dir = self.issue_dir(issue_id);
        if !dir.is_dir() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)?;
        info!(issue_id, "Removed local issue state");
        Ok(true)
    }

    // === Specs ===

    /// Replace the parent record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    pub fn write_parent_spec(&self, issue_id: &str, spec: &ParentSpec) -> Result<()> {
        atomic_write_json(&self.parent_path(issue_id), spec)
    }

    #[must_use]
    pub fn read_parent_spec(&self, issue_id: &str) -> Option<ParentSpec> {
        read_json_opt(&self.parent_path(issue_id))
    }

    /// Replace a sub-task record, keyed by its identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    pub fn write_subtask_spec(&self, issue_id: &str, spec: &SubTaskSpec) -> Result<()> {
        atomic_write_json(&self.task_path(issue_id, &spec.identifier), spec)
    }

    #[must_use]
    pub fn read_subtask_spec(&self, issue_id: &str, identifier: &str) -> Option<SubTaskSpec> {
        read_json_opt(&self.task_path(issue_id, identifier))
    }

    /// All readable sub-task records, sorted by identifier.
    ///
    /// Corrupt task files are skipped.
    #[must_use]
    pub fn read_subtasks(&self, issue_id: &str) -> Vec<SubTaskSpec> {
        let Ok(entries) = fs::read_dir(self.tasks_dir(issue_id)) else {
            return Vec::new();
        };

        let mut tasks: Vec<SubTaskSpec> = entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| read_json_opt::<SubTaskSpec>(&path))
            .collect();
        tasks.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        tasks
    }

    /// Find a sub-task by backend id or by identifier.
    #[must_use]
    pub fn find_subtask(&self, issue_id: &str, id_or_identifier: &str) -> Option<SubTaskSpec> {
        if let Some(spec) = self.read_subtask_spec(issue_id, id_or_identifier) {
            return Some(spec);
        }
        self.read_subtasks(issue_id)
            .into_iter()
            .find(|task| task.id == id_or_identifier || task.identifier == id_or_identifier)
    }

    /// Patch only the status of the parent record.
    ///
    /// Returns `Ok(false)` without writing when the record does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the patched record cannot be written.
    pub fn update_parent_status(&self, issue_id: &str, status: &str) -> Result<bool> {
        let Some(mut spec) = self.read_parent_spec(issue_id) else {
            debug!(issue_id, "No parent record to patch");
            return Ok(false);
        };
        spec.status = status.to_string();
        self.write_parent_spec(issue_id, &spec)?;
        debug!(issue_id, status, "Parent status patched");
        Ok(true)
    }

    /// Patch only the status of a sub-task record.
    ///
    /// Returns `Ok(false)` without writing when the record does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the patched record cannot be written.
    pub fn update_subtask_status(
        &self,
        issue_id: &str,
        identifier: &str,
        status: &str,
    ) -> Result<bool> {
        let Some(mut spec) = self.read_subtask_spec(issue_id, identifier) else {
            debug!(issue_id, identifier, "No sub-task record to patch");
            return Ok(false);
        };
        spec.status = status.to_string();
        self.write_subtask_spec(issue_id, &spec)?;
        debug!(issue_id, identifier, status, "Sub-task status patched");
        Ok(true)
    }

    // === Iteration log ===

    /// Append one attempt to the iteration log. Returns the new log length.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be written.
    pub fn append_iteration(&self, issue_id: &str, entry: IterationEntry) -> Result<usize> {
        let path = self.iterations_path(issue_id);
        let mut entries: Vec<IterationEntry> = read_json_or_default(&path);
        entries.push(entry);
        atomic_write_json(&path, &entries)?;
        Ok(entries.len())
    }

    #[must_use]
    pub fn read_iterations(&self, issue_id: &str) -> Vec<IterationEntry> {
        read_json_or_default(&self.iterations_path(issue_id))
    }

    /// Attempt number the next try of `subtask_id` should use (1-based).
    #[must_use]
    pub fn next_attempt_number(&self, issue_id: &str, subtask_id: &str) -> u32 {
        self.read_iterations(issue_id)
            .iter()
            .filter(|entry| entry.subtask_id == subtask_id)
            .map(|entry| entry.attempt)
            .max()
            .map_or(1, |max| max.saturating_add(1))
    }

    // === Pending updates ===

    /// Queue a mutation for a later push to the backend.
    ///
    /// The queue is only ever appended to here; draining belongs to the
    /// push process.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be written.
    pub fn enqueue_pending_update(
        &self,
        issue_id: &str,
        kind: PendingUpdateKind,
        payload: serde_json::Value,
    ) -> Result<PendingUpdate> {
        let path = self.pending_updates_path(issue_id);
        let mut queue: PendingUpdatesQueue = read_json_or_default(&path);

        let update = PendingUpdate {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            kind,
            payload,
            synced_at: None,
            error: None,
        };
        queue.updates.push(update.clone());
        atomic_write_json(&path, &queue)?;

        debug!(
            issue_id,
            update_id = %update.id,
            kind = %update.kind,
            queued = queue.updates.len(),
            "Pending update queued"
        );
        Ok(update)
    }

    #[must_use]
    pub fn read_pending_updates(&self, issue_id: &str) -> Vec<PendingUpdate> {
        read_json_or_default::<PendingUpdatesQueue>(&self.pending_updates_path(issue_id)).updates
    }

    #[must_use]
    pub fn unsynced_update_count(&self, issue_id: &str) -> usize {
        self.read_pending_updates(issue_id)
            .iter()
            .filter(|update| update.is_unsynced())
            .count()
    }

    // === Completion summary ===

    /// Write (or overwrite) the completion summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the summary cannot be written.
    pub fn write_completion_summary(
        &self,
        issue_id: &str,
        summary: &CompletionSummary,
    ) -> Result<()> {
        atomic_write_json(&self.summary_path(issue_id), summary)
    }

    #[must_use]
    pub fn read_completion_summary(&self, issue_id: &str) -> Option<CompletionSummary> {
        read_json_opt(&self.summary_path(issue_id))
    }
}
