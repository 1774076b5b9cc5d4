//! Recording a validated outcome against local state.

use super::Outcome;
use crate::error::Result;
use crate::graph::{StatusOverrides, TaskGraph};
use crate::model::{
    CompletionSummary, IterationEntry, PendingUpdateKind, TaskOutcomeSummary, TaskStatus,
};
use crate::storage::StateStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

/// What applying an outcome changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedOutcome {
    /// Live status to layer over the graph, keyed by task id.
    pub status_override: Option<(String, TaskStatus)>,
    /// Attempt number written to the iteration log.
    pub attempt: Option<u32>,
    /// Whether the stored sub-task status was patched.
    pub status_changed: bool,
    /// Id of the queued `status_change`, if one was queued.
    pub pending_update_id: Option<String>,
}

/// Apply `outcome` to the issue's local records.
///
/// Outcomes that do not name a sub-task (`ALL_COMPLETE`, `PASS`, ...) leave
/// the store untouched. Otherwise an iteration entry is appended; when the
/// sub-task has a local record whose status differs from the new one, the
/// record is patched and a `status_change` is queued for the tracker.
///
/// # Errors
///
/// Returns an error if any record cannot be written.
pub fn apply_outcome(
    store: &StateStore,
    issue_id: &str,
    outcome: &Outcome,
    started_at: DateTime<Utc>,
) -> Result<AppliedOutcome> {
    let Some((subtask_ref, new_status)) = outcome.status_transition() else {
        debug!(issue_id, kind = %outcome.kind(), "Outcome carries no sub-task transition");
        return Ok(AppliedOutcome::default());
    };

    let spec = store.find_subtask(issue_id, subtask_ref);
    let (task_id, identifier) = spec.as_ref().map_or_else(
        || (subtask_ref.to_string(), subtask_ref.to_string()),
        |spec| (spec.id.clone(), spec.identifier.clone()),
    );

    let attempt = store.next_attempt_number(issue_id, &identifier);
    store.append_iteration(
        issue_id,
        IterationEntry {
            subtask_id: identifier.clone(),
            attempt,
            started_at,
            completed_at: Some(Utc::now()),
            status: outcome.iteration_status(),
            error: outcome.error_detail(),
            files_modified: outcome.files_modified().to_vec(),
            commit_hash: outcome.commit_hash().map(ToString::to_string),
        },
    )?;

    let mut applied = AppliedOutcome {
        status_override: Some((task_id.clone(), new_status)),
        attempt: Some(attempt),
        ..AppliedOutcome::default()
    };

    let Some(spec) = spec else {
        debug!(issue_id, subtask = subtask_ref, "No local record for sub-task");
        return Ok(applied);
    };

    let old_status = TaskStatus::from_backend(&spec.status);
    if old_status != new_status {
        store.update_subtask_status(issue_id, &identifier, new_status.as_str())?;
        let update = store.enqueue_pending_update(
            issue_id,
            PendingUpdateKind::StatusChange,
            json!({
                "issueId": task_id,
                "identifier": identifier,
                "oldStatus": spec.status,
                "newStatus": new_status.as_str(),
            }),
        )?;
        applied.status_changed = true;
        applied.pending_update_id = Some(update.id);
    }

    info!(
        issue_id,
        subtask = %identifier,
        attempt,
        status = %new_status,
        changed = applied.status_changed,
        "Outcome applied"
    );
    Ok(applied)
}

/// Build and persist the completion summary for `issue_id` from its local
/// graph and iteration log.
///
/// Returns `None` without writing when the issue has no parent record.
///
/// # Errors
///
/// Returns an error if the summary cannot be written.
pub fn record_completion_summary(
    store: &StateStore,
    issue_id: &str,
) -> Result<Option<CompletionSummary>> {
    let Some(graph) = TaskGraph::from_local(store, issue_id) else {
        return Ok(None);
    };
    let iterations = store.read_iterations(issue_id);
    let overrides = StatusOverrides::new();

    let task_outcomes: Vec<TaskOutcomeSummary> = graph
        .sorted_tasks()
        .into_iter()
        .map(|task| {
            let attempts = iterations
                .iter()
                .filter(|entry| entry.subtask_id == task.identifier)
                .count();
            TaskOutcomeSummary {
                identifier: task.identifier.clone(),
                status: graph.derive_status(task, &overrides),
                iterations: u32::try_from(attempts).unwrap_or(u32::MAX),
            }
        })
        .collect();

    let stats = graph.stats(&overrides);
    let summary = CompletionSummary {
        parent_id: graph.parent_identifier.clone(),
        completed_at: Utc::now(),
        total_tasks: stats.total,
        completed_tasks: stats.done,
        failed_tasks: stats.failed,
        total_iterations: iterations.len(),
        task_outcomes,
    };
    store.write_completion_summary(issue_id, &summary)?;
    info!(
        issue_id,
        completed = summary.completed_tasks,
        total = summary.total_tasks,
        "Completion summary written"
    );
    Ok(Some(summary))
}
