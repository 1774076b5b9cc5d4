#![allow(dead_code)]

use super::TestProject;
use assert_cmd::Command;
use std::ffi::OsStr;

#[derive(Debug)]
pub struct LwRun {
    pub stdout: String,
    pub stderr: String,
    pub status: std::process::ExitStatus,
}

impl LwRun {
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(self.stdout.trim()).expect("stdout is JSON")
    }
}

pub fn lw_command(project: &TestProject) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("lw"));
    cmd.current_dir(project.temp_dir.path());
    cmd.env("LOOPWORK_DIR", &project.context.state_dir);
    cmd.env_remove("LOOPWORK_PREFIX");
    cmd.env_remove("LOOPWORK_BACKEND");
    cmd.env("NO_COLOR", "1");
    cmd.env("RUST_LOG", "loopwork=debug");
    cmd
}

pub fn run_lw<I, S>(project: &TestProject, args: I) -> LwRun
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = lw_command(project).args(args).output().expect("run lw");
    LwRun {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        status: output.status,
    }
}
