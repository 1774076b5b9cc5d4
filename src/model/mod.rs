//! Core data types for `loopwork`.
//!
//! This module defines the fundamental types used throughout the application:
//! - `TaskStatus` - Execution lifecycle of a work item
//! - `RelationRef` - A blocking relation as delivered by a tracker
//! - `ParentSpec` / `SubTaskSpec` - Locally persisted issue records
//! - `IterationEntry` - One execution attempt in the iteration log
//! - `PendingUpdate` - A mutation waiting to be pushed to the backend
//! - `CompletionSummary` - Final report written when a run finishes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Execution status of a task.
///
/// `Done`, `InProgress` and `Failed` are authoritative. `Pending`, `Ready`
/// and `Blocked` are placeholders that the graph re-derives from structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Ready,
    Blocked,
    InProgress,
    Done,
    Failed,
}

impl TaskStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Blocked => "blocked",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Statuses that pass through derivation unchanged.
    #[must_use]
    pub const fn is_authoritative(&self) -> bool {
        matches!(self, Self::InProgress | Self::Done | Self::Failed)
    }

    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Map a tracker's free-form workflow state onto the task vocabulary.
    ///
    /// Unknown states map to `Pending` so they get re-derived.
    #[must_use]
    pub fn from_backend(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "done" | "completed" | "complete" | "closed" | "canceled" | "cancelled"
            | "duplicate" | "resolved" => Self::Done,
            "in_progress" | "inprogress" | "started" | "in_review" | "review" => {
                Self::InProgress
            }
            "failed" => Self::Failed,
            "blocked" => Self::Blocked,
            "ready" => Self::Ready,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = crate::error::LoopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "ready" => Ok(Self::Ready),
            "blocked" => Ok(Self::Blocked),
            "in_progress" | "inprogress" | "in-progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            other => Err(crate::error::LoopError::InvalidStatus {
                status: other.to_string(),
            }),
        }
    }
}

/// Which tracker a project talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Linear,
    Jira,
    #[default]
    Local,
}

impl Backend {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Jira => "jira",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Backend {
    type Err = crate::error::LoopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "jira" => Ok(Self::Jira),
            "local" => Ok(Self::Local),
            other => Err(crate::error::LoopError::Config(format!(
                "unknown backend '{other}' (expected linear, jira or local)"
            ))),
        }
    }
}

/// A blocking relation reference.
///
/// Trackers hand these out either as bare ids or as `{id, identifier}`
/// objects. Use [`RelationRef::id`] to get the canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationRef {
    Id(String),
    Ref {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        identifier: Option<String>,
    },
}

impl RelationRef {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) | Self::Ref { id, .. } => id,
        }
    }

    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::Id(_) => None,
            Self::Ref { identifier, .. } => identifier.as_deref(),
        }
    }
}

impl From<&str> for RelationRef {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

/// Parent issue record (`parent.json`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ParentSpec {
    pub id: String,
    pub identifier: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Tracker status string, stored verbatim.
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub git_branch_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Sub-task record (`tasks/<identifier>.json`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SubTaskSpec {
    pub id: String,
    pub identifier: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub blocked_by: Vec<RelationRef>,
    #[serde(default)]
    pub blocks: Vec<RelationRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// Result of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationStatus {
    Success,
    Partial,
    Failed,
}

/// One entry of the append-only iteration log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IterationEntry {
    pub subtask_id: String,
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: IterationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub files_modified: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
}

/// Kind tag of a queued backend mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PendingUpdateKind {
    StatusChange,
    AddComment,
    CreateSubtask,
    UpdateDescription,
    AddLabel,
    RemoveLabel,
    Custom(String),
}

impl PendingUpdateKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::StatusChange => "status_change",
            Self::AddComment => "add_comment",
            Self::CreateSubtask => "create_subtask",
            Self::UpdateDescription => "update_description",
            Self::AddLabel => "add_label",
            Self::RemoveLabel => "remove_label",
            Self::Custom(value) => value,
        }
    }
}

impl fmt::Display for PendingUpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for PendingUpdateKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PendingUpdateKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        let kind = match value.as_str() {
            "status_change" => Self::StatusChange,
            "add_comment" => Self::AddComment,
            "create_subtask" => Self::CreateSubtask,
            "update_description" => Self::UpdateDescription,
            "add_label" => Self::AddLabel,
            "remove_label" => Self::RemoveLabel,
            _ => Self::Custom(value),
        };
        Ok(kind)
    }
}

/// A locally recorded mutation awaiting push to the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpdate {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: PendingUpdateKind,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PendingUpdate {
    /// Not yet pushed and not given up on.
    #[must_use]
    pub const fn is_unsynced(&self) -> bool {
        self.synced_at.is_none() && self.error.is_none()
    }
}

/// On-disk shape of `pending-updates.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpdatesQueue {
    #[serde(default)]
    pub updates: Vec<PendingUpdate>,
}

/// Per-task line of a completion summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutcomeSummary {
    pub identifier: String,
    pub status: TaskStatus,
    pub iterations: u32,
}

/// Summary written once a run over an issue finishes (`summary.json`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSummary {
    pub parent_id: String,
    pub completed_at: DateTime<Utc>,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub total_iterations: usize,
    #[serde(default)]
    pub task_outcomes: Vec<TaskOutcomeSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Ready,
            TaskStatus::Blocked,
            TaskStatus::InProgress,
            TaskStatus::Done,
            TaskStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
        assert!("finished".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn backend_status_mapping() {
        assert_eq!(TaskStatus::from_backend("Done"), TaskStatus::Done);
        assert_eq!(TaskStatus::from_backend("Canceled"), TaskStatus::Done);
        assert_eq!(TaskStatus::from_backend("In Progress"), TaskStatus::InProgress);
        assert_eq!(TaskStatus::from_backend("in-review"), TaskStatus::InProgress);
        assert_eq!(TaskStatus::from_backend("Backlog"), TaskStatus::Pending);
        assert_eq!(TaskStatus::from_backend("Todo"), TaskStatus::Pending);
        assert_eq!(TaskStatus::from_backend(""), TaskStatus::Pending);
        assert_eq!(TaskStatus::from_backend("failed"), TaskStatus::Failed);
    }

    #[test]
    fn relation_ref_accepts_both_shapes() {
        let refs: Vec<RelationRef> =
            serde_json::from_str(r#"["abc", {"id": "def", "identifier": "MOB-2"}]"#).unwrap();
        assert_eq!(refs[0].id(), "abc");
        assert_eq!(refs[0].identifier(), None);
        assert_eq!(refs[1].id(), "def");
        assert_eq!(refs[1].identifier(), Some("MOB-2"));
    }

    #[test]
    fn pending_update_kind_serializes_as_tag() {
        let json = serde_json::to_string(&PendingUpdateKind::StatusChange).unwrap();
        assert_eq!(json, "\"status_change\"");
        let custom: PendingUpdateKind = serde_json::from_str("\"reassign\"").unwrap();
        assert_eq!(custom, PendingUpdateKind::Custom("reassign".to_string()));
    }

    #[test]
    fn subtask_spec_uses_camel_case() {
        let spec = SubTaskSpec {
            id: "uuid-1".to_string(),
            identifier: "MOB-1".to_string(),
            title: "Task".to_string(),
            blocked_by: vec![RelationRef::from("uuid-0")],
            ..Default::default()
        };
        let value = serde_json::to_value(&spec).unwrap();
        assert!(value.get("blockedBy").is_some());
        assert!(value.get("blocked_by").is_none());
    }
}
