//! `lw summary` command implementation.

use super::{GlobalOptions, existing_issue_store, print_json};
use crate::cli::SummaryArgs;
use crate::error::{LoopError, Result};
use crate::outcome::record_completion_summary;

/// Build, write and print the completion summary.
///
/// # Errors
///
/// Returns an error if the issue has no parent record or the summary cannot
/// be written.
pub fn execute(args: &SummaryArgs, options: &GlobalOptions) -> Result<()> {
    let store = existing_issue_store(options, &args.issue)?;
    let summary =
        record_completion_summary(&store, &args.issue)?.ok_or_else(|| LoopError::IssueNotFound {
            id: args.issue.clone(),
        })?;

    if options.json {
        return print_json(&summary);
    }

    println!(
        "{}: {}/{} tasks done, {} failed, {} iteration(s)",
        summary.parent_id,
        summary.completed_tasks,
        summary.total_tasks,
        summary.failed_tasks,
        summary.total_iterations
    );
    for task in &summary.task_outcomes {
        println!(
            "  {:<10} {:<12} {} attempt(s)",
            task.identifier,
            task.status.as_str(),
            task.iterations
        );
    }
    Ok(())
}
