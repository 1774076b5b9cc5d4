//! Structured error output for the CLI.
//!
//! Wraps a [`LoopError`] with a machine code, a hint, and context data so
//! scripts driving `lw` can react without parsing messages.

use super::LoopError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A structured error suitable for JSON or human output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional hint for fixing the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether repeating the operation may succeed
    pub retryable: bool,
    /// Process exit code
    pub exit_code: i32,
    /// Additional context data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl StructuredError {
    #[must_use]
    pub fn from_error(err: &LoopError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            hint: err.suggestion().map(ToString::to_string),
            retryable: matches!(
                err,
                LoopError::OutcomeParse { .. }
                    | LoopError::OutcomeValidation { .. }
                    | LoopError::Remote { .. }
            ),
            exit_code: err.exit_code(),
            context: Self::context_for(err),
        }
    }

    /// Issue lookup failure with suggestions drawn from `existing_ids`.
    #[must_use]
    pub fn issue_not_found(searched_id: &str, existing_ids: &[String]) -> Self {
        let similar = find_similar_ids(searched_id, existing_ids, 3);
        let hint = match similar.as_slice() {
            [] => Some("No local issue directory matches that id.".to_string()),
            [only] => Some(format!("Did you mean '{only}'?")),
            many => Some(format!("Did you mean one of: {}?", many.join(", "))),
        };

        let err = LoopError::IssueNotFound {
            id: searched_id.to_string(),
        };
        Self {
            hint,
            context: Some(json!({
                "searched_id": searched_id,
                "similar_ids": similar,
            })),
            ..Self::from_error(&err)
        }
    }

    fn context_for(err: &LoopError) -> Option<Value> {
        match err {
            LoopError::OutcomeValidation { status, errors, .. } => Some(json!({
                "status": status,
                "fields": errors
                    .iter()
                    .map(|e| json!({"field": e.field, "message": e.message}))
                    .collect::<Vec<_>>(),
            })),
            LoopError::OutcomeParse { reason, .. } => Some(json!({"reason": reason})),
            LoopError::NotInitialized { path } => {
                Some(json!({"path": path.display().to_string()}))
            }
            LoopError::Remote { id, .. } | LoopError::IssueNotFound { id } => {
                Some(json!({"id": id}))
            }
            _ => None,
        }
    }

    /// Serialize to JSON value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "error": {
                "code": self.code,
                "message": self.message,
                "hint": self.hint,
                "retryable": self.retryable,
                "context": self.context,
            }
        })
    }

    /// Format for human-readable output.
    #[must_use]
    pub fn to_human(&self, color: bool) -> String {
        let mut output = String::new();

        if color {
            output.push_str("\x1b[31mError:\x1b[0m ");
        } else {
            output.push_str("Error: ");
        }
        output.push_str(&self.message);

        if let Some(hint) = &self.hint {
            output.push('\n');
            if color {
                output.push_str("\x1b[33mHint:\x1b[0m ");
            } else {
                output.push_str("Hint: ");
            }
            output.push_str(hint);
        }

        output
    }
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();

    for (i, a_char) in a.iter().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, b_char) in b.iter().enumerate() {
            let cost = usize::from(a_char != b_char);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        previous = current;
    }

    previous[b.len()]
}

/// IDs within edit distance 3 of `searched`, closest first.
#[must_use]
pub fn find_similar_ids(searched: &str, existing: &[String], max_suggestions: usize) -> Vec<String> {
    let mut candidates: Vec<(usize, &str)> = existing
        .iter()
        .map(|id| (levenshtein_distance(searched, id), id.as_str()))
        .filter(|(dist, _)| *dist <= 3)
        .collect();

    candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

    candidates
        .into_iter()
        .take(max_suggestions)
        .map(|(_, id)| id.to_string())
        .collect()
}
