#![allow(dead_code)]

use loopwork::StateStore;
use loopwork::graph::GraphItem;
use loopwork::model::{ParentSpec, RelationRef, SubTaskSpec};

pub fn parent(identifier: &str, status: &str) -> ParentSpec {
    ParentSpec {
        id: format!("uuid-{identifier}"),
        identifier: identifier.to_string(),
        title: format!("Parent {identifier}"),
        status: status.to_string(),
        git_branch_name: format!("feature/{}", identifier.to_lowercase()),
        ..Default::default()
    }
}

pub fn subtask(identifier: &str, blocked_by: &[&str]) -> SubTaskSpec {
    SubTaskSpec {
        id: format!("uuid-{identifier}"),
        identifier: identifier.to_string(),
        title: format!("Task {identifier}"),
        status: "pending".to_string(),
        blocked_by: blocked_by
            .iter()
            .map(|blocker| RelationRef::from(format!("uuid-{blocker}").as_str()))
            .collect(),
        ..Default::default()
    }
}

pub fn item(id: &str, status: Option<&str>, blocked_by: &[&str]) -> GraphItem {
    GraphItem {
        id: id.to_string(),
        identifier: id.to_uppercase(),
        title: format!("Task {id}"),
        status: status.map(ToString::to_string),
        blocked_by: blocked_by.iter().map(|b| RelationRef::from(*b)).collect(),
        blocks: Vec::new(),
    }
}

/// Parent `MOB-100` with the chain A <- B <- C (B waits on A, C on B).
pub fn write_abc_chain(store: &StateStore) {
    store
        .write_parent_spec("MOB-100", &parent("MOB-100", "Backlog"))
        .expect("parent");
    store
        .write_subtask_spec("MOB-100", &subtask("MOB-101", &[]))
        .expect("A");
    store
        .write_subtask_spec("MOB-100", &subtask("MOB-102", &["MOB-101"]))
        .expect("B");
    store
        .write_subtask_spec("MOB-100", &subtask("MOB-103", &["MOB-102"]))
        .expect("C");
}

pub fn complete_report(subtask: &str) -> String {
    format!(
        r#"{{
            "status": "SUBTASK_COMPLETE",
            "timestamp": "2024-01-15T10:30:00Z",
            "subtaskId": "{subtask}",
            "commitHash": "abc1234",
            "filesModified": ["src/lib.rs"],
            "verificationResults": {{"typecheck": "PASS", "tests": "PASS"}}
        }}"#
    )
}
