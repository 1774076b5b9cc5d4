//! `lw config` command implementation.

use super::{GlobalOptions, print_json};
use crate::error::Result;
use crate::model::Backend;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigOutput<'a> {
    state_dir: &'a Path,
    config_file: Option<&'a Path>,
    prefix: &'a str,
    backend: &'a str,
    remote: bool,
}

/// Print the settings after defaults, `config.yaml`, env and flags merge.
///
/// # Errors
///
/// Returns an error if the project cannot be located or a merged value is
/// invalid.
pub fn execute(options: &GlobalOptions) -> Result<()> {
    let project = options.project()?;
    let settings = options.settings(&project)?;
    let config_path = project.config_path();

    let output = ConfigOutput {
        state_dir: &project.state_dir,
        config_file: config_path.is_file().then_some(config_path.as_path()),
        prefix: &settings.prefix,
        backend: settings.backend.as_str(),
        remote: settings.backend != Backend::Local,
    };

    if options.json {
        return print_json(&output);
    }

    println!("state dir: {}", output.state_dir.display());
    match output.config_file {
        Some(path) => println!("config:    {}", path.display()),
        None => println!("config:    (none)"),
    }
    println!("prefix:    {}", output.prefix);
    println!("backend:   {}", output.backend);
    Ok(())
}
