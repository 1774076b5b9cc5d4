//! Command implementations for `lw`.

pub mod config;
pub mod graph;
pub mod log;
pub mod next_id;
pub mod parse;
pub mod summary;

use crate::cli::Cli;
use crate::config::{CliOverrides, ProjectContext, Settings};
use crate::error::{LoopError, Result};
use crate::storage::StateStore;
use serde::Serialize;
use std::path::PathBuf;

/// Flags shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub dir: Option<PathBuf>,
    pub json: bool,
    pub overrides: CliOverrides,
}

impl GlobalOptions {
    #[must_use]
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            dir: cli.dir.clone(),
            json: cli.json,
            overrides: CliOverrides {
                prefix: cli.prefix.clone(),
                backend: cli.backend.clone(),
            },
        }
    }

    /// Resolve the project, honoring `--dir` before discovery.
    ///
    /// # Errors
    ///
    /// Returns an error if no project can be located.
    pub fn project(&self) -> Result<ProjectContext> {
        match &self.dir {
            Some(dir) => Ok(ProjectContext::from_state_dir(dir)),
            None => ProjectContext::discover(None),
        }
    }

    /// Resolve settings for `project` with CLI overrides on top.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file or a merged value is invalid.
    pub fn settings(&self, project: &ProjectContext) -> Result<Settings> {
        crate::config::load_settings(project, &self.overrides)
    }
}

/// Store for an issue that must already exist locally.
fn existing_issue_store(options: &GlobalOptions, issue_id: &str) -> Result<StateStore> {
    let store = options.project()?.store();
    if !store.issue_exists(issue_id) {
        return Err(LoopError::IssueNotFound {
            id: issue_id.to_string(),
        });
    }
    Ok(store)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let output = serde_json::to_string_pretty(value)?;
    println!("{output}");
    Ok(())
}
