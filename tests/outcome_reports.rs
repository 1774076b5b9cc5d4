//! Completion report parsing as an execution session would emit it.

mod common;

use loopwork::model::TaskStatus;
use loopwork::outcome::{OutcomeDetails, OutcomeKind, extract_status, parse};
use loopwork::LoopError;
use serde_json::json;

fn field_names(err: &LoopError) -> Vec<&str> {
    err.validation_errors()
        .iter()
        .map(|e| e.field.as_str())
        .collect()
}

#[test]
fn every_kind_parses_from_minimal_report() {
    common::init_test_logging();
    let reports = [
        (
            OutcomeKind::SubtaskComplete,
            json!({"subtaskId": "MOB-2", "commitHash": "abc", "filesModified": [], "verificationResults": {}}),
        ),
        (
            OutcomeKind::SubtaskPartial,
            json!({"subtaskId": "MOB-2", "progressMade": ["parser"], "remainingWork": ["tests"]}),
        ),
        (
            OutcomeKind::AllComplete,
            json!({"parentId": "MOB-1", "completedCount": 4}),
        ),
        (
            OutcomeKind::AllBlocked,
            json!({"parentId": "MOB-1", "blockedCount": 2, "waitingOn": ["MOB-3"]}),
        ),
        (OutcomeKind::NoSubtasks, json!({"parentId": "MOB-1"})),
        (
            OutcomeKind::VerificationFailed,
            json!({"subtaskId": "MOB-2", "errorType": "tests", "errorOutput": "boom", "attemptedFixes": ["retry"]}),
        ),
        (
            OutcomeKind::NeedsWork,
            json!({"subtaskId": "MOB-2", "issues": ["naming"], "suggestedFixes": ["rename"]}),
        ),
        (OutcomeKind::Pass, json!({})),
        (OutcomeKind::Fail, json!({"reason": "missing tests"})),
    ];

    for (kind, mut fields) in reports {
        fields["status"] = json!(kind.as_str());
        fields["timestamp"] = json!("2024-01-15T10:30:00Z");
        let outcome = parse(&fields.to_string())
            .unwrap_or_else(|err| panic!("{kind} should parse: {err}"));
        assert_eq!(outcome.kind(), kind);
        assert_eq!(extract_status(&fields.to_string()), Some(kind));
    }
}

#[test]
fn verification_results_are_preserved_verbatim() {
    let raw = json!({
        "status": "SUBTASK_COMPLETE",
        "timestamp": "2024-01-15T10:30:00Z",
        "subtaskId": "MOB-124",
        "commitHash": "abc1234",
        "filesModified": ["src/a.rs"],
        "verificationResults": {
            "typecheck": "PASS",
            "tests": {"passed": 41, "failed": 0, "suites": ["unit", "e2e"]},
            "lint": null
        },
        "summary": "Implemented the parser"
    });

    let outcome = parse(&raw.to_string()).expect("valid");
    let OutcomeDetails::SubtaskComplete {
        verification_results,
        ..
    } = &outcome.details
    else {
        panic!("wrong variant: {:?}", outcome.details);
    };
    assert_eq!(
        serde_json::Value::Object(verification_results.clone()),
        raw["verificationResults"]
    );
    assert_eq!(outcome.summary.as_deref(), Some("Implemented the parser"));
}

#[test]
fn missing_fields_are_all_named() {
    let raw = r#"{"status": "VERIFICATION_FAILED", "subtaskId": "MOB-2"}"#;
    let err = parse(raw).expect_err("invalid");

    assert_eq!(
        field_names(&err),
        vec!["timestamp", "errorType", "errorOutput", "attemptedFixes"]
    );
    for e in err.validation_errors() {
        assert_eq!(e.message, "required field missing");
    }
    assert_eq!(err.raw_text(), Some(raw));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn missing_status_and_timestamp_reported_together() {
    let err = parse(r#"{"subtaskId": "MOB-2"}"#).expect_err("invalid");
    assert_eq!(field_names(&err), vec!["status", "timestamp"]);
    assert!(err.to_string().starts_with("Invalid unknown report"));
}

#[test]
fn yaml_report_inside_markdown_fence() {
    let raw = "```yaml
status: SUBTASK_PARTIAL
timestamp: '2024-01-15T10:30:00Z'
subtaskId: MOB-7
progressMade:
  - wired the store
remainingWork:
  - integration tests
commitHash: def5678
```";
    let outcome = parse(raw).expect("yaml");
    assert_eq!(outcome.kind(), OutcomeKind::SubtaskPartial);
    assert_eq!(outcome.commit_hash(), Some("def5678"));
    assert_eq!(
        outcome.status_transition(),
        Some(("MOB-7", TaskStatus::InProgress))
    );
    assert!(!outcome.kind().is_terminal());
}

#[test]
fn malformed_text_has_no_status() {
    for raw in ["", "   ", "{\"status\": ", "- just\n- a list", "plain words"] {
        assert_eq!(extract_status(raw), None, "{raw:?}");
        assert!(parse(raw).is_err());
    }
}
