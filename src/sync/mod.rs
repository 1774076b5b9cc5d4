//! Reconciling local records with a remote tracker.
//!
//! This module handles:
//! - Pulling the authoritative status of every tracked parent issue
//! - Fetching a parent and its sub-tasks into a fresh [`TaskGraph`]
//!
//! Issues minted locally (`PREFIX-NNN`) have no remote counterpart and are
//! never queried. Reconciliation is sequential, one attempt per issue per
//! call, and writes only when the remote status differs from the local one,
//! so running it twice in a row performs no writes the second time.

use crate::config::Settings;
use crate::error::{LoopError, Result};
use crate::graph::{GraphItem, TaskGraph};
use crate::model::Backend;
use crate::storage::{StateStore, local_id_pattern};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Parent issue as reported by a tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteParent {
    pub id: String,
    pub identifier: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub git_branch_name: String,
}

/// Read access to an issue tracker.
///
/// `Ok(None)` means the tracker answered but has no such issue (or no
/// status for it); transport failures are errors. Both count as failures
/// during reconciliation.
pub trait RemoteTracker {
    /// Fetch a parent issue by id or identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the tracker cannot be reached.
    fn fetch_parent_issue(&self, id: &str) -> Result<Option<RemoteParent>>;

    /// Fetch the sub-tasks of a parent, with their blocking relations.
    ///
    /// # Errors
    ///
    /// Returns an error if the tracker cannot be reached.
    fn fetch_sub_tasks(&self, parent_ref: &str) -> Result<Option<Vec<GraphItem>>>;

    /// Fetch the current workflow state name of an issue.
    ///
    /// # Errors
    ///
    /// Returns an error if the tracker cannot be reached.
    fn fetch_issue_status(&self, id: &str) -> Result<Option<String>>;
}

/// Tracker clients keyed by the backend they talk to.
#[derive(Default)]
pub struct TrackerSet {
    clients: HashMap<Backend, Box<dyn RemoteTracker>>,
}

impl TrackerSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the client for `backend`, replacing any earlier one.
    pub fn register(&mut self, backend: Backend, client: Box<dyn RemoteTracker>) {
        self.clients.insert(backend, client);
    }

    /// Client for `backend`, if one was registered.
    #[must_use]
    pub fn for_backend(&self, backend: Backend) -> Option<&dyn RemoteTracker> {
        self.clients.get(&backend).map(AsRef::as_ref)
    }
}

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Issues whose local status now matches the tracker.
    pub synced: usize,
    /// Issues whose status could not be fetched or written.
    pub failed: usize,
    /// Local-only issues and directories without a parent record.
    pub skipped: usize,
    /// Synced issues whose parent record had to be rewritten.
    pub updated: usize,
}

impl SyncReport {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.synced + self.failed + self.skipped
    }
}

/// Pull the tracker status of every parent issue under `store`.
///
/// # Errors
///
/// Returns an error if `local_prefix` is invalid. Tracker failures and
/// parent records that cannot be written are counted as failed, not
/// returned.
pub fn sync_all(
    store: &StateStore,
    tracker: &dyn RemoteTracker,
    local_prefix: &str,
) -> Result<SyncReport> {
    let local_ids = local_id_pattern(local_prefix)?;
    let mut report = SyncReport::default();

    for issue_id in store.list_issue_ids() {
        if local_ids.is_match(&issue_id) {
            debug!(issue_id = %issue_id, "Skipping local issue");
            report.skipped += 1;
            continue;
        }

        let Some(parent) = store.read_parent_spec(&issue_id) else {
            debug!(issue_id = %issue_id, "Skipping directory without parent record");
            report.skipped += 1;
            continue;
        };

        let remote_status = match tracker.fetch_issue_status(&issue_id) {
            Ok(Some(status)) => status,
            Ok(None) => {
                warn!(issue_id = %issue_id, "Tracker returned no status");
                report.failed += 1;
                continue;
            }
            Err(err) => {
                warn!(issue_id = %issue_id, error = %err, "Status fetch failed");
                report.failed += 1;
                continue;
            }
        };

        let remote_status = remote_status.trim();
        if parent.status.trim() != remote_status {
            if let Err(err) = store.update_parent_status(&issue_id, remote_status) {
                warn!(issue_id = %issue_id, error = %err, "Parent record write failed");
                report.failed += 1;
                continue;
            }
            debug!(
                issue_id = %issue_id,
                old = %parent.status,
                new = remote_status,
                "Parent status reconciled"
            );
            report.updated += 1;
        }
        report.synced += 1;
    }

    info!(
        synced = report.synced,
        updated = report.updated,
        failed = report.failed,
        skipped = report.skipped,
        "Reconciliation finished"
    );
    Ok(report)
}

/// Reconcile `store` against the tracker selected by `settings.backend`.
///
/// A project on the local backend has no tracker: every issue directory is
/// reported as skipped and nothing is queried.
///
/// # Errors
///
/// Returns an error if no client is registered for a remote backend, or
/// [`sync_all`] fails.
pub fn reconcile(
    store: &StateStore,
    settings: &Settings,
    trackers: &TrackerSet,
) -> Result<SyncReport> {
    if settings.backend == Backend::Local {
        let skipped = store.list_issue_ids().len();
        debug!(skipped, "Local backend, nothing to reconcile");
        return Ok(SyncReport {
            skipped,
            ..SyncReport::default()
        });
    }

    let tracker = trackers.for_backend(settings.backend).ok_or_else(|| {
        LoopError::Config(format!(
            "no tracker client registered for backend '{}'",
            settings.backend
        ))
    })?;
    sync_all(store, tracker, &settings.prefix)
}

/// Fetch a parent and its sub-tasks and build a fresh graph.
///
/// Returns `None` when the tracker has no such parent or no sub-task list
/// for it.
///
/// # Errors
///
/// Returns an error if either fetch fails.
pub fn fetch_graph(tracker: &dyn RemoteTracker, parent_id: &str) -> Result<Option<TaskGraph>> {
    let Some(parent) = tracker.fetch_parent_issue(parent_id)? else {
        debug!(parent_id, "Parent not found on tracker");
        return Ok(None);
    };
    let Some(items) = tracker.fetch_sub_tasks(&parent.id)? else {
        debug!(parent_id, "No sub-task list for parent");
        return Ok(None);
    };
    Ok(Some(TaskGraph::build(parent.id, parent.identifier, items)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ParentSpec, RelationRef, TaskStatus};
    use crate::storage::atomic::temp_path_for;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeTracker {
        statuses: HashMap<String, Option<String>>,
        parents: HashMap<String, RemoteParent>,
        sub_tasks: HashMap<String, Vec<GraphItem>>,
    }

    impl RemoteTracker for FakeTracker {
        fn fetch_parent_issue(&self, id: &str) -> Result<Option<RemoteParent>> {
            Ok(self.parents.get(id).cloned())
        }

        fn fetch_sub_tasks(&self, parent_ref: &str) -> Result<Option<Vec<GraphItem>>> {
            Ok(self.sub_tasks.get(parent_ref).cloned())
        }

        fn fetch_issue_status(&self, id: &str) -> Result<Option<String>> {
            match self.statuses.get(id) {
                Some(status) => Ok(status.clone()),
                None => Err(LoopError::Remote {
                    id: id.to_string(),
                    reason: "connection reset".to_string(),
                }),
            }
        }
    }

    fn write_parent(store: &StateStore, id: &str, status: &str) {
        store
            .write_parent_spec(
                id,
                &ParentSpec {
                    id: format!("uuid-{id}"),
                    identifier: id.to_string(),
                    title: "Parent".to_string(),
                    status: status.to_string(),
                    ..Default::default()
                },
            )
            .unwrap();
    }

    #[test]
    fn counts_each_category() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path());
        write_parent(&store, "MOB-1", "Backlog");
        write_parent(&store, "MOB-2", "Done");
        write_parent(&store, "MOB-3", "Todo");
        write_parent(&store, "MOB-4", "Todo");
        write_parent(&store, "LOC-001", "Todo");
        std::fs::create_dir_all(store.issue_dir("MOB-5")).unwrap();

        let mut tracker = FakeTracker::default();
        tracker.statuses.insert("MOB-1".into(), Some("In Progress".into()));
        tracker.statuses.insert("MOB-2".into(), Some("Done".into()));
        tracker.statuses.insert("MOB-3".into(), None);
        tracker.statuses.insert("LOC-001".into(), Some("Done".into()));

        let report = sync_all(&store, &tracker, "LOC").unwrap();
        assert_eq!(
            report,
            SyncReport {
                synced: 2,
                failed: 2,
                skipped: 2,
                updated: 1
            }
        );
        assert_eq!(store.read_parent_spec("MOB-1").unwrap().status, "In Progress");
        assert_eq!(store.read_parent_spec("MOB-3").unwrap().status, "Todo");
        assert_eq!(store.read_parent_spec("LOC-001").unwrap().status, "Todo");
    }

    #[test]
    fn second_pass_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path());
        write_parent(&store, "MOB-1", "Backlog");
        let mut tracker = FakeTracker::default();
        tracker.statuses.insert("MOB-1".into(), Some(" Done ".into()));

        let first = sync_all(&store, &tracker, "LOC").unwrap();
        let second = sync_all(&store, &tracker, "LOC").unwrap();

        assert_eq!(first.updated, 1);
        assert_eq!(second.updated, 0);
        assert_eq!(
            (first.synced, first.failed, first.skipped),
            (second.synced, second.failed, second.skipped)
        );
        assert_eq!(store.read_parent_spec("MOB-1").unwrap().status, "Done");
    }

    #[test]
    fn write_failure_does_not_stop_the_pass() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path());
        write_parent(&store, "MOB-1", "Todo");
        write_parent(&store, "MOB-2", "Todo");
        // A directory squatting on the temp path makes the publish fail.
        std::fs::create_dir_all(temp_path_for(&store.parent_path("MOB-1"))).unwrap();

        let mut tracker = FakeTracker::default();
        tracker.statuses.insert("MOB-1".into(), Some("Done".into()));
        tracker.statuses.insert("MOB-2".into(), Some("Done".into()));

        let report = sync_all(&store, &tracker, "LOC").unwrap();
        assert_eq!(
            report,
            SyncReport {
                synced: 1,
                failed: 1,
                skipped: 0,
                updated: 1
            }
        );
        assert_eq!(store.read_parent_spec("MOB-1").unwrap().status, "Todo");
        assert_eq!(store.read_parent_spec("MOB-2").unwrap().status, "Done");
    }

    fn settings(backend: Backend) -> Settings {
        Settings {
            backend,
            ..Settings::default()
        }
    }

    #[test]
    fn reconcile_picks_tracker_by_backend() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path());
        write_parent(&store, "MOB-1", "Todo");

        let mut linear = FakeTracker::default();
        linear.statuses.insert("MOB-1".into(), Some("Done".into()));
        let mut jira = FakeTracker::default();
        jira.statuses.insert("MOB-1".into(), Some("In Progress".into()));
        let mut trackers = TrackerSet::new();
        trackers.register(Backend::Linear, Box::new(linear));
        trackers.register(Backend::Jira, Box::new(jira));

        let report = reconcile(&store, &settings(Backend::Jira), &trackers).unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(store.read_parent_spec("MOB-1").unwrap().status, "In Progress");

        reconcile(&store, &settings(Backend::Linear), &trackers).unwrap();
        assert_eq!(store.read_parent_spec("MOB-1").unwrap().status, "Done");
    }

    #[test]
    fn local_backend_queries_nothing() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path());
        write_parent(&store, "MOB-1", "Todo");
        write_parent(&store, "MOB-2", "Todo");

        let mut trackers = TrackerSet::new();
        trackers.register(Backend::Linear, Box::new(FakeTracker::default()));
        let report = reconcile(&store, &settings(Backend::Local), &trackers).unwrap();

        assert_eq!(
            report,
            SyncReport {
                skipped: 2,
                ..SyncReport::default()
            }
        );
        assert_eq!(store.read_parent_spec("MOB-1").unwrap().status, "Todo");
    }

    #[test]
    fn unregistered_backend_is_a_config_error() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path());
        let err = reconcile(&store, &settings(Backend::Jira), &TrackerSet::new())
            .expect_err("no jira client");
        assert!(matches!(err, LoopError::Config(ref msg) if msg.contains("jira")));
    }

    #[test]
    fn fetch_graph_builds_from_tracker() {
        let mut tracker = FakeTracker::default();
        tracker.parents.insert(
            "MOB-1".into(),
            RemoteParent {
                id: "uuid-1".into(),
                identifier: "MOB-1".into(),
                title: "Parent".into(),
                git_branch_name: "feature/mob-1".into(),
            },
        );
        tracker.sub_tasks.insert(
            "uuid-1".into(),
            vec![
                GraphItem {
                    id: "a".into(),
                    identifier: "MOB-2".into(),
                    title: "A".into(),
                    status: Some("Done".into()),
                    blocked_by: vec![],
                    blocks: vec![],
                },
                GraphItem {
                    id: "b".into(),
                    identifier: "MOB-3".into(),
                    title: "B".into(),
                    status: None,
                    blocked_by: vec![RelationRef::from("a")],
                    blocks: vec![],
                },
            ],
        );

        let graph = fetch_graph(&tracker, "MOB-1").unwrap().expect("graph");
        assert_eq!(graph.parent_identifier, "MOB-1");
        assert_eq!(graph.get("b").unwrap().status, TaskStatus::Ready);

        assert!(fetch_graph(&tracker, "MOB-9").unwrap().is_none());
    }
}
