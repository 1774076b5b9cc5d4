//! `lw graph` command implementation.
//!
//! Builds the graph from local records only and prints each task with its
//! derived status.

use super::{GlobalOptions, existing_issue_store, print_json};
use crate::cli::GraphArgs;
use crate::error::{LoopError, Result};
use crate::graph::{GraphStats, StatusOverrides, Task, TaskGraph};
use crate::model::TaskStatus;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskRow<'a> {
    id: &'a str,
    identifier: &'a str,
    title: &'a str,
    status: TaskStatus,
    blocked_by: Vec<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphOutput<'a> {
    parent_id: &'a str,
    parent_identifier: &'a str,
    tasks: Vec<TaskRow<'a>>,
    stats: GraphStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    cycle: Option<Vec<String>>,
}

/// Execute the graph command.
///
/// # Errors
///
/// Returns an error if the issue has no local parent record.
pub fn execute(args: &GraphArgs, options: &GlobalOptions) -> Result<()> {
    let store = existing_issue_store(options, &args.issue)?;
    let graph =
        TaskGraph::from_local(&store, &args.issue).ok_or_else(|| LoopError::IssueNotFound {
            id: args.issue.clone(),
        })?;
    let overrides = StatusOverrides::new();

    let cycle = graph.find_cycle();
    if let Some(cycle) = &cycle {
        warn!(cycle = ?cycle, "Blocking cycle detected; tasks on it stay blocked");
    }

    let tasks = if args.ready {
        graph.ready_tasks(&overrides)
    } else {
        graph.sorted_tasks()
    };
    debug!(shown = tasks.len(), total = graph.len(), "Rendering graph");

    let output = GraphOutput {
        parent_id: &graph.parent_id,
        parent_identifier: &graph.parent_identifier,
        tasks: tasks
            .into_iter()
            .map(|task| row(&graph, task, &overrides))
            .collect(),
        stats: graph.stats(&overrides),
        cycle,
    };

    if options.json {
        print_json(&output)
    } else {
        print_text_output(&output);
        Ok(())
    }
}

fn row<'a>(graph: &'a TaskGraph, task: &'a Task, overrides: &StatusOverrides) -> TaskRow<'a> {
    TaskRow {
        id: &task.id,
        identifier: &task.identifier,
        title: &task.title,
        status: graph.derive_status(task, overrides),
        blocked_by: graph
            .get_blockers(&task.id)
            .into_iter()
            .map(|blocker| blocker.identifier.as_str())
            .collect(),
    }
}

fn print_text_output(output: &GraphOutput<'_>) {
    println!(
        "{} ({} tasks)",
        output.parent_identifier, output.stats.total
    );
    for task in &output.tasks {
        let mut line = format!(
            "  {:<12} {:<10} {}",
            task.status.as_str(),
            task.identifier,
            task.title
        );
        if !task.blocked_by.is_empty() && task.status != TaskStatus::Done {
            line.push_str(&format!("  <- {}", task.blocked_by.join(", ")));
        }
        println!("{line}");
    }
    let stats = &output.stats;
    println!(
        "{} done, {} ready, {} blocked, {} in progress, {} failed",
        stats.done, stats.ready, stats.blocked, stats.in_progress, stats.failed
    );
    if let Some(cycle) = &output.cycle {
        println!("cycle: {}", cycle.join(" -> "));
    }
}
