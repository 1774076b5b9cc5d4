//! Task dependency graph.
//!
//! A [`TaskGraph`] is built once per fetch cycle from a flat list of items
//! and is never mutated afterwards; a new fetch builds a new graph. Live
//! progress from the current run is layered on top through
//! [`StatusOverrides`] instead of being written into the graph.

use crate::model::{RelationRef, SubTaskSpec, TaskStatus};
use crate::storage::StateStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// Live status per task id, taking precedence over stored status.
pub type StatusOverrides = HashMap<String, TaskStatus>;

/// Raw item as delivered by a tracker or read from local records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphItem {
    pub id: String,
    pub identifier: String,
    #[serde(default)]
    pub title: String,
    /// Tracker status; `None` means no authoritative status yet.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub blocked_by: Vec<RelationRef>,
    #[serde(default)]
    pub blocks: Vec<RelationRef>,
}

impl From<SubTaskSpec> for GraphItem {
    fn from(spec: SubTaskSpec) -> Self {
        let status = Some(spec.status).filter(|s| !s.trim().is_empty());
        Self {
            id: spec.id,
            identifier: spec.identifier,
            title: spec.title,
            status,
            blocked_by: spec.blocked_by,
            blocks: spec.blocks,
        }
    }
}

/// A node of the graph with normalized relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub identifier: String,
    pub title: String,
    pub status: TaskStatus,
    pub blocked_by: Vec<String>,
    pub blocks: Vec<String>,
}

/// Count of tasks per derived status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub total: usize,
    pub done: usize,
    pub ready: usize,
    pub blocked: usize,
    pub in_progress: usize,
    pub failed: usize,
}

impl GraphStats {
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.total > 0 && self.done == self.total
    }

    fn record(&mut self, status: TaskStatus) {
        self.total += 1;
        match status {
            TaskStatus::Done => self.done += 1,
            TaskStatus::Ready | TaskStatus::Pending => self.ready += 1,
            TaskStatus::Blocked => self.blocked += 1,
            TaskStatus::InProgress => self.in_progress += 1,
            TaskStatus::Failed => self.failed += 1,
        }
    }
}

/// Immutable dependency graph for one parent issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskGraph {
    pub parent_id: String,
    pub parent_identifier: String,
    pub tasks: BTreeMap<String, Task>,
}

fn push_unique(list: &mut Vec<String>, id: &str) {
    if !list.iter().any(|existing| existing == id) {
        list.push(id.to_string());
    }
}

impl TaskGraph {
    /// Build a graph from raw items.
    ///
    /// Relations are normalized to task ids (references by identifier are
    /// resolved when they match a task), self-references and duplicates are
    /// dropped, and `blocked_by`/`blocks` are made symmetric for every task
    /// present. Missing statuses start as `pending`; the stored status of
    /// each task is then its derived status without overrides.
    #[must_use]
    pub fn build(
        parent_id: impl Into<String>,
        parent_identifier: impl Into<String>,
        items: Vec<GraphItem>,
    ) -> Self {
        let parent_id = parent_id.into();
        let parent_identifier = parent_identifier.into();

        let id_by_identifier: HashMap<String, String> = items
            .iter()
            .map(|item| (item.identifier.clone(), item.id.clone()))
            .collect();
        let known_ids: HashSet<&str> = items.iter().map(|item| item.id.as_str()).collect();
        let resolve = |relation: &RelationRef| -> String {
            let raw = relation.id();
            if known_ids.contains(raw) {
                return raw.to_string();
            }
            id_by_identifier
                .get(raw)
                .cloned()
                .unwrap_or_else(|| raw.to_string())
        };

        // (blocker, dependent) pairs from both relation directions.
        let mut edges: Vec<(String, String)> = Vec::new();
        let mut tasks: BTreeMap<String, Task> = BTreeMap::new();

        for item in &items {
            if tasks.contains_key(&item.id) {
                warn!(id = %item.id, identifier = %item.identifier, "Duplicate item ignored");
                continue;
            }
            for relation in &item.blocked_by {
                edges.push((resolve(relation), item.id.clone()));
            }
            for relation in &item.blocks {
                edges.push((item.id.clone(), resolve(relation)));
            }

            let status = item
                .status
                .as_deref()
                .map_or(TaskStatus::Pending, TaskStatus::from_backend);
            tasks.insert(
                item.id.clone(),
                Task {
                    id: item.id.clone(),
                    identifier: item.identifier.clone(),
                    title: item.title.clone(),
                    status,
                    blocked_by: Vec::new(),
                    blocks: Vec::new(),
                },
            );
        }

        for (blocker, dependent) in &edges {
            if blocker == dependent {
                continue;
            }
            if let Some(task) = tasks.get_mut(dependent) {
                push_unique(&mut task.blocked_by, blocker);
            }
            if let Some(task) = tasks.get_mut(blocker) {
                push_unique(&mut task.blocks, dependent);
            }
        }

        let mut graph = Self {
            parent_id,
            parent_identifier,
            tasks,
        };

        let derived = graph.derived_statuses(&StatusOverrides::new());
        for (id, status) in derived {
            if let Some(task) = graph.tasks.get_mut(&id) {
                task.status = status;
            }
        }

        debug!(
            parent = %graph.parent_identifier,
            tasks = graph.tasks.len(),
            edges = edges.len(),
            "Task graph built"
        );
        graph
    }

    /// Build the graph for `issue_id` from local records only.
    ///
    /// Returns `None` when the issue has no parent record.
    #[must_use]
    pub fn from_local(store: &StateStore, issue_id: &str) -> Option<Self> {
        let parent = store.read_parent_spec(issue_id)?;
        let items = store
            .read_subtasks(issue_id)
            .into_iter()
            .map(GraphItem::from)
            .collect();
        Some(Self::build(parent.id, parent.identifier, items))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    #[must_use]
    pub fn find_by_identifier(&self, identifier: &str) -> Option<&Task> {
        self.tasks.values().find(|task| task.identifier == identifier)
    }

    /// Tasks blocking `id`. Dangling references are skipped.
    #[must_use]
    pub fn get_blockers(&self, id: &str) -> Vec<&Task> {
        self.tasks.get(id).map_or_else(Vec::new, |task| {
            task.blocked_by
                .iter()
                .filter_map(|blocker| self.tasks.get(blocker))
                .collect()
        })
    }

    /// Tasks that `id` blocks. Dangling references are skipped.
    #[must_use]
    pub fn get_dependents(&self, id: &str) -> Vec<&Task> {
        self.tasks.get(id).map_or_else(Vec::new, |task| {
            task.blocks
                .iter()
                .filter_map(|dependent| self.tasks.get(dependent))
                .collect()
        })
    }

    /// Status of `id` for blocker resolution: override first, then stored.
    #[must_use]
    pub fn effective_status(&self, id: &str, overrides: &StatusOverrides) -> Option<TaskStatus> {
        overrides
            .get(id)
            .copied()
            .or_else(|| self.tasks.get(id).map(|task| task.status))
    }

    /// Derived status of `task`.
    ///
    /// An override on the task itself wins (a `pending` override means "no
    /// opinion"). Authoritative statuses pass through. Otherwise the task is
    /// `ready` when every existing blocker is effectively `done`, else
    /// `blocked`.
    #[must_use]
    pub fn derive_status(&self, task: &Task, overrides: &StatusOverrides) -> TaskStatus {
        if let Some(status) = overrides.get(&task.id) {
            if *status != TaskStatus::Pending {
                return *status;
            }
        }
        if task.status.is_authoritative() {
            return task.status;
        }

        let unresolved = task
            .blocked_by
            .iter()
            .filter(|blocker| self.tasks.contains_key(blocker.as_str()))
            .filter(|blocker| {
                self.effective_status(blocker.as_str(), overrides) != Some(TaskStatus::Done)
            })
            .count();

        if unresolved == 0 {
            TaskStatus::Ready
        } else {
            TaskStatus::Blocked
        }
    }

    /// Derived status of every task, keyed by id.
    #[must_use]
    pub fn derived_statuses(&self, overrides: &StatusOverrides) -> BTreeMap<String, TaskStatus> {
        self.tasks
            .values()
            .map(|task| (task.id.clone(), self.derive_status(task, overrides)))
            .collect()
    }

    /// Counts per derived status.
    #[must_use]
    pub fn stats(&self, overrides: &StatusOverrides) -> GraphStats {
        let mut stats = GraphStats::default();
        for task in self.tasks.values() {
            stats.record(self.derive_status(task, overrides));
        }
        stats
    }

    /// All tasks ordered by identifier.
    #[must_use]
    pub fn sorted_tasks(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.values().collect();
        tasks.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        tasks
    }

    /// Tasks whose derived status is `ready`, ordered by identifier.
    #[must_use]
    pub fn ready_tasks(&self, overrides: &StatusOverrides) -> Vec<&Task> {
        self.sorted_tasks()
            .into_iter()
            .filter(|task| self.derive_status(task, overrides) == TaskStatus::Ready)
            .collect()
    }

    /// Find one cycle in the blocking relation, if any.
    ///
    /// Returns the ids along the cycle, starting and ending at the same id.
    /// The graph does not reject cycles; tasks on one simply never become
    /// ready.
    #[must_use]
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Visiting,
            Visited,
        }

        let mut marks: HashMap<&str, Mark> = HashMap::new();

        for start in self.tasks.keys() {
            if marks.contains_key(start.as_str()) {
                continue;
            }
            // Iterative DFS over blocked_by edges; the stack doubles as the path.
            let mut stack: Vec<(&str, usize)> = vec![(start.as_str(), 0)];
            marks.insert(start.as_str(), Mark::Visiting);

            while let Some((node, next_edge)) = stack.last().copied() {
                let blockers = &self.tasks[node].blocked_by;
                if next_edge >= blockers.len() {
                    marks.insert(node, Mark::Visited);
                    stack.pop();
                    continue;
                }
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }

                let Some((blocker, _)) = self.tasks.get_key_value(blockers[next_edge].as_str())
                else {
                    continue;
                };
                match marks.get(blocker.as_str()) {
                    Some(Mark::Visiting) => {
                        let from = stack
                            .iter()
                            .position(|(id, _)| *id == blocker.as_str())
                            .unwrap_or(0);
                        let mut cycle: Vec<String> =
                            stack[from..].iter().map(|(id, _)| (*id).to_string()).collect();
                        cycle.push(blocker.clone());
                        return Some(cycle);
                    }
                    Some(Mark::Visited) => {}
                    None => {
                        marks.insert(blocker.as_str(), Mark::Visiting);
                        stack.push((blocker.as_str(), 0));
                    }
                }
            }
        }
        None
    }
}
