//! `lw parse` command implementation.

use super::{GlobalOptions, existing_issue_store, print_json};
use crate::cli::ParseArgs;
use crate::error::{LoopError, Result};
use crate::model::TaskStatus;
use crate::outcome::{self, AppliedOutcome, Outcome, OutcomeKind};
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use tracing::debug;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Classification {
    status: OutcomeKind,
    terminal: bool,
    success: bool,
    failure: bool,
}

impl From<OutcomeKind> for Classification {
    fn from(kind: OutcomeKind) -> Self {
        Self {
            status: kind,
            terminal: kind.is_terminal(),
            success: kind.is_success(),
            failure: kind.is_failure(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ParseOutput<'a> {
    #[serde(flatten)]
    classification: Classification,
    #[serde(skip_serializing_if = "Option::is_none")]
    transition: Option<(&'a str, TaskStatus)>,
    outcome: &'a Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    applied: Option<AppliedOutcome>,
}

fn read_input(args: &ParseArgs) -> Result<String> {
    match &args.file {
        Some(path) => Ok(fs::read_to_string(path)?),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

/// Execute the parse command.
///
/// # Errors
///
/// Returns an outcome error (exit code 2) if the report is malformed, or an
/// I/O or store error otherwise.
pub fn execute(args: &ParseArgs, options: &GlobalOptions) -> Result<()> {
    let raw = read_input(args)?;
    debug!(bytes = raw.len(), "Read outcome report");

    if args.status_only {
        let kind = outcome::extract_status(&raw).ok_or_else(|| LoopError::OutcomeParse {
            reason: "no recognizable status".to_string(),
            raw: raw.clone(),
        })?;
        if options.json {
            return print_json(&Classification::from(kind));
        }
        println!("{kind}");
        return Ok(());
    }

    let outcome = outcome::parse(&raw)?;

    let applied = match &args.apply {
        Some(issue_id) => {
            let store = existing_issue_store(options, issue_id)?;
            let started_at = args.started_at.unwrap_or_else(Utc::now);
            Some(outcome::apply_outcome(&store, issue_id, &outcome, started_at)?)
        }
        None => None,
    };

    let output = ParseOutput {
        classification: Classification::from(outcome.kind()),
        transition: outcome.status_transition(),
        outcome: &outcome,
        applied,
    };

    if options.json {
        print_json(&output)
    } else {
        print_text_output(&output);
        Ok(())
    }
}

const fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn print_text_output(output: &ParseOutput<'_>) {
    let class = &output.classification;
    println!("{}", class.status);
    println!(
        "  terminal: {}  success: {}  failure: {}",
        yes_no(class.terminal),
        yes_no(class.success),
        yes_no(class.failure)
    );
    if let Some((subtask, status)) = output.transition {
        println!("  {subtask} -> {status}");
    }
    if let Some(summary) = &output.outcome.summary {
        println!("  {summary}");
    }
    if let Some(applied) = &output.applied {
        if let Some(attempt) = applied.attempt {
            println!("  recorded attempt {attempt}");
        }
        if applied.status_changed {
            println!("  status change queued");
        }
    }
}
