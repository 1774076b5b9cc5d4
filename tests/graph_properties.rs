//! Property and end-to-end tests for the dependency graph.
//!
//! Verifies that:
//! - A task without an authoritative status is ready exactly when every
//!   blocker is done
//! - `blocked_by` and `blocks` stay symmetric
//! - Completing tasks of a chain unblocks them one at a time

mod common;

use chrono::Utc;
use common::TestProject;
use common::fixtures::{complete_report, item, write_abc_chain};
use loopwork::graph::{StatusOverrides, TaskGraph};
use loopwork::model::TaskStatus;
use loopwork::outcome::{apply_outcome, parse};
use proptest::prelude::*;
use tracing::info;

const STATUSES: [&str; 4] = ["Done", "In Progress", "Failed", "Todo"];

/// Random DAG: task `i` may only wait on tasks `j < i`.
fn dag_strategy() -> impl Strategy<Value = Vec<(Option<&'static str>, Vec<bool>)>> {
    (1usize..10).prop_flat_map(|n| {
        (0..n)
            .map(|i| {
                (
                    prop::option::of(prop::sample::select(STATUSES.to_vec())),
                    prop::collection::vec(any::<bool>(), i),
                )
            })
            .collect::<Vec<_>>()
    })
}

fn build(dag: &[(Option<&'static str>, Vec<bool>)]) -> TaskGraph {
    let ids: Vec<String> = (0..dag.len()).map(|i| format!("t{i}")).collect();
    let items = dag
        .iter()
        .enumerate()
        .map(|(i, (status, edges))| {
            let blockers: Vec<&str> = edges
                .iter()
                .enumerate()
                .filter(|(_, on)| **on)
                .map(|(j, _)| ids[j].as_str())
                .collect();
            item(&ids[i], *status, &blockers)
        })
        .collect();
    TaskGraph::build("parent", "MOB-1", items)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        ..Default::default()
    })]

    /// Property: placeholder statuses resolve to ready iff all blockers are done
    #[test]
    fn ready_iff_all_blockers_done(dag in dag_strategy()) {
        common::init_test_logging();
        let graph = build(&dag);
        let overrides = StatusOverrides::new();
        info!("proptest_graph_ready: tasks={}", graph.len());

        for (i, (status, edges)) in dag.iter().enumerate() {
            let task = graph.get(&format!("t{i}")).expect("task present");
            let derived = graph.derive_status(task, &overrides);
            let authoritative = status
                .map(TaskStatus::from_backend)
                .filter(TaskStatus::is_authoritative);

            let expected = authoritative.unwrap_or_else(|| {
                let all_done = edges
                    .iter()
                    .enumerate()
                    .filter(|(_, on)| **on)
                    .all(|(j, _)| dag[j].0 == Some("Done"));
                if all_done { TaskStatus::Ready } else { TaskStatus::Blocked }
            });
            prop_assert_eq!(derived, expected, "task t{}", i);
        }
    }

    /// Property: every blocking edge is visible from both ends
    #[test]
    fn relations_are_symmetric(dag in dag_strategy()) {
        let graph = build(&dag);
        for task in graph.sorted_tasks() {
            for blocker in graph.get_blockers(&task.id) {
                prop_assert!(
                    blocker.blocks.contains(&task.id),
                    "{} should list {} in blocks", blocker.id, task.id
                );
            }
            for dependent in graph.get_dependents(&task.id) {
                prop_assert!(dependent.blocked_by.contains(&task.id));
            }
        }
        prop_assert!(graph.find_cycle().is_none());
    }

    /// Property: stats account for every task exactly once
    #[test]
    fn stats_partition_tasks(dag in dag_strategy()) {
        let graph = build(&dag);
        let stats = graph.stats(&StatusOverrides::new());
        prop_assert_eq!(stats.total, graph.len());
        prop_assert_eq!(
            stats.done + stats.ready + stats.blocked + stats.in_progress + stats.failed,
            stats.total
        );
    }
}

fn statuses(graph: &TaskGraph, overrides: &StatusOverrides) -> Vec<(String, TaskStatus)> {
    graph
        .sorted_tasks()
        .into_iter()
        .map(|task| (task.identifier.clone(), graph.derive_status(task, overrides)))
        .collect()
}

#[test]
fn abc_chain_unblocks_in_order() {
    let project = TestProject::new();
    let store = project.store();
    write_abc_chain(&store);
    let none = StatusOverrides::new();

    let graph = TaskGraph::from_local(&store, "MOB-100").expect("graph");
    assert_eq!(
        statuses(&graph, &none),
        vec![
            ("MOB-101".to_string(), TaskStatus::Ready),
            ("MOB-102".to_string(), TaskStatus::Blocked),
            ("MOB-103".to_string(), TaskStatus::Blocked),
        ]
    );

    // Live progress first arrives as an override, before any re-read.
    let outcome = parse(&complete_report("MOB-101")).expect("report");
    let applied = apply_outcome(&store, "MOB-100", &outcome, Utc::now()).expect("apply");
    let (task_id, status) = applied.status_override.expect("override");
    let mut overrides = StatusOverrides::new();
    overrides.insert(task_id, status);

    let ready: Vec<_> = graph
        .ready_tasks(&overrides)
        .into_iter()
        .map(|task| task.identifier.as_str())
        .collect();
    assert_eq!(ready, vec!["MOB-102"]);

    // A fresh graph sees the persisted status without overrides.
    let graph = TaskGraph::from_local(&store, "MOB-100").expect("graph");
    assert_eq!(
        statuses(&graph, &none),
        vec![
            ("MOB-101".to_string(), TaskStatus::Done),
            ("MOB-102".to_string(), TaskStatus::Ready),
            ("MOB-103".to_string(), TaskStatus::Blocked),
        ]
    );

    for subtask in ["MOB-102", "MOB-103"] {
        let outcome = parse(&complete_report(subtask)).expect("report");
        apply_outcome(&store, "MOB-100", &outcome, Utc::now()).expect("apply");
    }

    let graph = TaskGraph::from_local(&store, "MOB-100").expect("graph");
    let stats = graph.stats(&none);
    assert!(stats.is_complete(), "{stats:?}");
    assert_eq!(store.read_pending_updates("MOB-100").len(), 3);
    assert_eq!(store.read_iterations("MOB-100").len(), 3);
}

#[test]
fn cycle_members_stay_blocked() {
    let graph = TaskGraph::build(
        "parent",
        "MOB-1",
        vec![
            item("a", None, &["b"]),
            item("b", None, &["a"]),
            item("c", None, &[]),
        ],
    );
    let overrides = StatusOverrides::new();

    assert_eq!(graph.get("a").unwrap().status, TaskStatus::Blocked);
    assert_eq!(graph.get("b").unwrap().status, TaskStatus::Blocked);
    assert_eq!(graph.get("c").unwrap().status, TaskStatus::Ready);

    let cycle = graph.find_cycle().expect("cycle");
    assert_eq!(cycle.first(), cycle.last());
    assert_eq!(cycle.len(), 3);
    assert_eq!(graph.stats(&overrides).blocked, 2);
}
