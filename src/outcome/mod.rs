//! Structured completion reports.
//!
//! An execution session finishes by emitting a small report naming what
//! happened (`status`) and when (`timestamp`), plus fields specific to that
//! status. Reports are accepted as JSON, or as YAML when JSON fails, and may
//! be wrapped in a Markdown code fence.
//!
//! Validation does not stop at the first problem: every missing or mistyped
//! field is collected into one [`LoopError::OutcomeValidation`].

mod apply;

pub use apply::{AppliedOutcome, apply_outcome, record_completion_summary};

use crate::error::{LoopError, Result, ValidationError};
use crate::model::{IterationStatus, TaskStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// The fixed vocabulary of report statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    SubtaskComplete,
    SubtaskPartial,
    AllComplete,
    AllBlocked,
    NoSubtasks,
    VerificationFailed,
    NeedsWork,
    Pass,
    Fail,
}

impl OutcomeKind {
    pub const ALL: [Self; 9] = [
        Self::SubtaskComplete,
        Self::SubtaskPartial,
        Self::AllComplete,
        Self::AllBlocked,
        Self::NoSubtasks,
        Self::VerificationFailed,
        Self::NeedsWork,
        Self::Pass,
        Self::Fail,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SubtaskComplete => "SUBTASK_COMPLETE",
            Self::SubtaskPartial => "SUBTASK_PARTIAL",
            Self::AllComplete => "ALL_COMPLETE",
            Self::AllBlocked => "ALL_BLOCKED",
            Self::NoSubtasks => "NO_SUBTASKS",
            Self::VerificationFailed => "VERIFICATION_FAILED",
            Self::NeedsWork => "NEEDS_WORK",
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }

    /// No further attempts are expected after this outcome.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::SubtaskPartial | Self::NeedsWork)
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::SubtaskComplete | Self::AllComplete | Self::Pass)
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::VerificationFailed | Self::Fail)
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutcomeKind {
    type Err = LoopError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| LoopError::InvalidStatus {
                status: wanted.to_string(),
            })
    }
}

/// Fields carried by each outcome kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "status",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum OutcomeDetails {
    SubtaskComplete {
        subtask_id: String,
        commit_hash: String,
        files_modified: Vec<String>,
        verification_results: Map<String, Value>,
    },
    SubtaskPartial {
        subtask_id: String,
        progress_made: Vec<String>,
        remaining_work: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        commit_hash: Option<String>,
        files_modified: Vec<String>,
    },
    AllComplete {
        parent_id: String,
        completed_count: u64,
    },
    AllBlocked {
        parent_id: String,
        blocked_count: u64,
        waiting_on: Vec<String>,
    },
    NoSubtasks {
        parent_id: String,
    },
    VerificationFailed {
        subtask_id: String,
        error_type: String,
        error_output: String,
        attempted_fixes: Vec<String>,
        unedited_files: Vec<String>,
    },
    NeedsWork {
        subtask_id: String,
        issues: Vec<String>,
        suggested_fixes: Vec<String>,
    },
    Pass {
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    Fail {
        reason: String,
        failed_checks: Vec<String>,
    },
}

/// A validated completion report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(flatten)]
    pub details: OutcomeDetails,
}

impl Outcome {
    #[must_use]
    pub const fn kind(&self) -> OutcomeKind {
        match &self.details {
            OutcomeDetails::SubtaskComplete { .. } => OutcomeKind::SubtaskComplete,
            OutcomeDetails::SubtaskPartial { .. } => OutcomeKind::SubtaskPartial,
            OutcomeDetails::AllComplete { .. } => OutcomeKind::AllComplete,
            OutcomeDetails::AllBlocked { .. } => OutcomeKind::AllBlocked,
            OutcomeDetails::NoSubtasks { .. } => OutcomeKind::NoSubtasks,
            OutcomeDetails::VerificationFailed { .. } => OutcomeKind::VerificationFailed,
            OutcomeDetails::NeedsWork { .. } => OutcomeKind::NeedsWork,
            OutcomeDetails::Pass { .. } => OutcomeKind::Pass,
            OutcomeDetails::Fail { .. } => OutcomeKind::Fail,
        }
    }

    /// The sub-task this report is about, if it names one.
    #[must_use]
    pub fn subtask_id(&self) -> Option<&str> {
        match &self.details {
            OutcomeDetails::SubtaskComplete { subtask_id, .. }
            | OutcomeDetails::SubtaskPartial { subtask_id, .. }
            | OutcomeDetails::VerificationFailed { subtask_id, .. }
            | OutcomeDetails::NeedsWork { subtask_id, .. } => Some(subtask_id),
            _ => None,
        }
    }

    /// Status the named sub-task moves to as a result of this report.
    #[must_use]
    pub fn status_transition(&self) -> Option<(&str, TaskStatus)> {
        let status = match self.kind() {
            OutcomeKind::SubtaskComplete => TaskStatus::Done,
            OutcomeKind::SubtaskPartial | OutcomeKind::NeedsWork => TaskStatus::InProgress,
            OutcomeKind::VerificationFailed => TaskStatus::Failed,
            _ => return None,
        };
        self.subtask_id().map(|id| (id, status))
    }

    /// How this report is recorded in the iteration log.
    #[must_use]
    pub const fn iteration_status(&self) -> IterationStatus {
        let kind = self.kind();
        if kind.is_success() {
            IterationStatus::Success
        } else if kind.is_failure() {
            IterationStatus::Failed
        } else {
            IterationStatus::Partial
        }
    }

    /// Error text worth keeping in the iteration log.
    #[must_use]
    pub fn error_detail(&self) -> Option<String> {
        match &self.details {
            OutcomeDetails::VerificationFailed {
                error_type,
                error_output,
                ..
            } => Some(format!("{error_type}: {error_output}")),
            OutcomeDetails::NeedsWork { issues, .. } => Some(issues.join("; ")),
            OutcomeDetails::Fail { reason, .. } => Some(reason.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn files_modified(&self) -> &[String] {
        match &self.details {
            OutcomeDetails::SubtaskComplete { files_modified, .. }
            | OutcomeDetails::SubtaskPartial { files_modified, .. } => files_modified,
            _ => &[],
        }
    }

    #[must_use]
    pub fn commit_hash(&self) -> Option<&str> {
        match &self.details {
            OutcomeDetails::SubtaskComplete { commit_hash, .. } => Some(commit_hash),
            OutcomeDetails::SubtaskPartial { commit_hash, .. } => commit_hash.as_deref(),
            _ => None,
        }
    }
}

/// Remove one surrounding Markdown code fence, if present.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `yaml`, ...) on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Read report text into a JSON object, trying JSON then YAML.
fn parse_object(raw: &str) -> Result<Map<String, Value>> {
    let text = strip_code_fence(raw);
    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(json_err) => match serde_yaml::from_str::<Value>(text) {
            Ok(value) => value,
            Err(yaml_err) => {
                return Err(LoopError::OutcomeParse {
                    reason: format!("not valid JSON ({json_err}) or YAML ({yaml_err})"),
                    raw: raw.to_string(),
                });
            }
        },
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(LoopError::OutcomeParse {
            reason: format!("expected an object, found {}", value_kind(&other)),
            raw: raw.to_string(),
        }),
    }
}

/// Typed field access that records problems instead of failing.
struct FieldReader<'a> {
    fields: &'a Map<String, Value>,
    errors: Vec<ValidationError>,
}

impl<'a> FieldReader<'a> {
    const fn new(fields: &'a Map<String, Value>) -> Self {
        Self {
            fields,
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, field: &str, message: &str) {
        self.errors.push(ValidationError::new(field, message));
    }

    fn present(&mut self, field: &str) -> Option<&'a Value> {
        match self.fields.get(field) {
            None | Some(Value::Null) => {
                self.fail(field, "required field missing");
                None
            }
            Some(value) => Some(value),
        }
    }

    fn string(&mut self, field: &str) -> String {
        match self.present(field) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                let message = format!("expected a string, found {}", value_kind(other));
                self.fail(field, &message);
                String::new()
            }
            None => String::new(),
        }
    }

    /// A string that identifies something and must not be blank.
    fn id(&mut self, field: &str) -> String {
        let errors_before = self.errors.len();
        let value = self.string(field);
        if self.errors.len() == errors_before && value.trim().is_empty() {
            self.fail(field, "cannot be empty");
        }
        value
    }

    fn opt_string(&mut self, field: &str) -> Option<String> {
        match self.fields.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                let message = format!("expected a string, found {}", value_kind(other));
                self.fail(field, &message);
                None
            }
        }
    }

    fn list_from(&mut self, field: &str, value: &Value) -> Vec<String> {
        let Value::Array(items) = value else {
            let message = format!("expected an array of strings, found {}", value_kind(value));
            self.fail(field, &message);
            return Vec::new();
        };
        let strings: Vec<String> = items
            .iter()
            .filter_map(|item| item.as_str().map(ToString::to_string))
            .collect();
        if strings.len() != items.len() {
            self.fail(field, "expected an array of strings");
        }
        strings
    }

    fn string_list(&mut self, field: &str) -> Vec<String> {
        match self.present(field) {
            Some(value) => self.list_from(field, value),
            None => Vec::new(),
        }
    }

    fn opt_string_list(&mut self, field: &str) -> Vec<String> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => self.list_from(field, value),
        }
    }

    fn count(&mut self, field: &str) -> u64 {
        match self.present(field) {
            Some(value) => value.as_u64().unwrap_or_else(|| {
                let message = format!("expected a non-negative integer, found {}", value_kind(value));
                self.fail(field, &message);
                0
            }),
            None => 0,
        }
    }

    fn object(&mut self, field: &str) -> Map<String, Value> {
        match self.present(field) {
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                let message = format!("expected an object, found {}", value_kind(other));
                self.fail(field, &message);
                Map::new()
            }
            None => Map::new(),
        }
    }
}

fn validate_subtask_complete(r: &mut FieldReader<'_>) -> OutcomeDetails {
    OutcomeDetails::SubtaskComplete {
        subtask_id: r.id("subtaskId"),
        commit_hash: r.id("commitHash"),
        files_modified: r.string_list("filesModified"),
        verification_results: r.object("verificationResults"),
    }
}

fn validate_subtask_partial(r: &mut FieldReader<'_>) -> OutcomeDetails {
    OutcomeDetails::SubtaskPartial {
        subtask_id: r.id("subtaskId"),
        progress_made: r.string_list("progressMade"),
        remaining_work: r.string_list("remainingWork"),
        commit_hash: r.opt_string("commitHash"),
        files_modified: r.opt_string_list("filesModified"),
    }
}

fn validate_all_complete(r: &mut FieldReader<'_>) -> OutcomeDetails {
    OutcomeDetails::AllComplete {
        parent_id: r.id("parentId"),
        completed_count: r.count("completedCount"),
    }
}

fn validate_all_blocked(r: &mut FieldReader<'_>) -> OutcomeDetails {
    OutcomeDetails::AllBlocked {
        parent_id: r.id("parentId"),
        blocked_count: r.count("blockedCount"),
        waiting_on: r.string_list("waitingOn"),
    }
}

fn validate_no_subtasks(r: &mut FieldReader<'_>) -> OutcomeDetails {
    OutcomeDetails::NoSubtasks {
        parent_id: r.id("parentId"),
    }
}

fn validate_verification_failed(r: &mut FieldReader<'_>) -> OutcomeDetails {
    OutcomeDetails::VerificationFailed {
        subtask_id: r.id("subtaskId"),
        error_type: r.string("errorType"),
        error_output: r.string("errorOutput"),
        attempted_fixes: r.string_list("attemptedFixes"),
        unedited_files: r.opt_string_list("uneditedFiles"),
    }
}

fn validate_needs_work(r: &mut FieldReader<'_>) -> OutcomeDetails {
    OutcomeDetails::NeedsWork {
        subtask_id: r.id("subtaskId"),
        issues: r.string_list("issues"),
        suggested_fixes: r.string_list("suggestedFixes"),
    }
}

fn validate_pass(r: &mut FieldReader<'_>) -> OutcomeDetails {
    OutcomeDetails::Pass {
        details: r.opt_string("details"),
    }
}

fn validate_fail(r: &mut FieldReader<'_>) -> OutcomeDetails {
    OutcomeDetails::Fail {
        reason: r.string("reason"),
        failed_checks: r.opt_string_list("failedChecks"),
    }
}

/// Single dispatch from kind to its validator.
fn validator_for(kind: OutcomeKind) -> fn(&mut FieldReader<'_>) -> OutcomeDetails {
    match kind {
        OutcomeKind::SubtaskComplete => validate_subtask_complete,
        OutcomeKind::SubtaskPartial => validate_subtask_partial,
        OutcomeKind::AllComplete => validate_all_complete,
        OutcomeKind::AllBlocked => validate_all_blocked,
        OutcomeKind::NoSubtasks => validate_no_subtasks,
        OutcomeKind::VerificationFailed => validate_verification_failed,
        OutcomeKind::NeedsWork => validate_needs_work,
        OutcomeKind::Pass => validate_pass,
        OutcomeKind::Fail => validate_fail,
    }
}

/// Parse and validate a completion report.
///
/// # Errors
///
/// Returns [`LoopError::OutcomeParse`] when the text is not a JSON or YAML
/// object, and [`LoopError::OutcomeValidation`] listing every missing or
/// mistyped field otherwise. Both carry the original text.
pub fn parse(raw: &str) -> Result<Outcome> {
    let fields = parse_object(raw)?;
    let mut reader = FieldReader::new(&fields);

    let status_label = fields
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let kind = match fields.get("status") {
        None | Some(Value::Null) => {
            reader.fail("status", "required field missing");
            None
        }
        Some(Value::String(s)) => {
            let parsed = s.parse::<OutcomeKind>().ok();
            if parsed.is_none() {
                reader.fail("status", &format!("unknown status '{s}'"));
            }
            parsed
        }
        Some(other) => {
            let message = format!("expected a string, found {}", value_kind(other));
            reader.fail("status", &message);
            None
        }
    };

    let timestamp = reader.string("timestamp");
    let summary = reader.opt_string("summary");
    let details = kind.map(|kind| validator_for(kind)(&mut reader));

    match details {
        Some(details) if reader.errors.is_empty() => {
            let outcome = Outcome {
                timestamp,
                summary,
                details,
            };
            debug!(kind = %outcome.kind(), subtask = ?outcome.subtask_id(), "Outcome parsed");
            Ok(outcome)
        }
        _ => Err(LoopError::OutcomeValidation {
            status: status_label,
            errors: reader.errors,
            raw: raw.to_string(),
        }),
    }
}

/// Best-effort status lookup without full validation.
#[must_use]
pub fn extract_status(raw: &str) -> Option<OutcomeKind> {
    let fields = parse_object(raw).ok()?;
    fields.get("status")?.as_str()?.parse().ok()
}
