//! `lw log` command implementation.

use super::{GlobalOptions, existing_issue_store, print_json};
use crate::cli::LogArgs;
use crate::error::Result;
use crate::model::{CompletionSummary, IterationEntry, IterationStatus};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogOutput<'a> {
    issue_id: &'a str,
    iterations: Vec<IterationEntry>,
    pending_updates: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<CompletionSummary>,
}

/// Execute the log command.
///
/// # Errors
///
/// Returns an error if the issue has no local directory.
pub fn execute(args: &LogArgs, options: &GlobalOptions) -> Result<()> {
    let store = existing_issue_store(options, &args.issue)?;

    let mut iterations = store.read_iterations(&args.issue);
    if let Some(subtask) = &args.subtask {
        iterations.retain(|entry| &entry.subtask_id == subtask);
    }

    let output = LogOutput {
        issue_id: &args.issue,
        iterations,
        pending_updates: store.unsynced_update_count(&args.issue),
        summary: store.read_completion_summary(&args.issue),
    };

    if options.json {
        print_json(&output)
    } else {
        print_text_output(&output);
        Ok(())
    }
}

const fn status_label(status: IterationStatus) -> &'static str {
    match status {
        IterationStatus::Success => "success",
        IterationStatus::Partial => "partial",
        IterationStatus::Failed => "failed",
    }
}

fn print_text_output(output: &LogOutput<'_>) {
    if output.iterations.is_empty() {
        println!("No iterations recorded for {}", output.issue_id);
    }
    for entry in &output.iterations {
        let mut line = format!(
            "{}  {} #{}  {}",
            entry.started_at.to_rfc3339(),
            entry.subtask_id,
            entry.attempt,
            status_label(entry.status)
        );
        if let Some(error) = &entry.error {
            line.push_str(&format!("  ({error})"));
        }
        println!("{line}");
    }
    println!("{} pending update(s)", output.pending_updates);
    if let Some(summary) = &output.summary {
        println!(
            "Completed {}/{} tasks at {}",
            summary.completed_tasks,
            summary.total_tasks,
            summary.completed_at.to_rfc3339()
        );
    }
}
