#![allow(dead_code)]

use loopwork::StateStore;
use loopwork::config::ProjectContext;
use std::sync::Once;
use tempfile::TempDir;

pub mod cli;
pub mod fixtures;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        loopwork::logging::init_test_logging();
    });
}

/// A throwaway project with its own `.loopwork` directory.
pub struct TestProject {
    pub temp_dir: TempDir,
    pub context: ProjectContext,
}

impl TestProject {
    pub fn new() -> Self {
        init_test_logging();
        let temp_dir = TempDir::new().expect("temp dir");
        let context = ProjectContext::new(temp_dir.path());
        std::fs::create_dir_all(&context.state_dir).expect("state dir");
        Self { temp_dir, context }
    }

    pub fn store(&self) -> StateStore {
        self.context.store()
    }
}
