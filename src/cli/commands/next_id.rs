//! `lw next-id` command implementation.

use super::{GlobalOptions, print_json};
use crate::error::Result;
use serde_json::json;
use tracing::info;

/// Allocate and print the next local issue id.
///
/// # Errors
///
/// Returns an error if the project cannot be located, the prefix is invalid,
/// or the counter cannot be written.
pub fn execute(options: &GlobalOptions) -> Result<()> {
    let project = options.project()?;
    let settings = options.settings(&project)?;
    let id = project.store().allocate_next_id(&settings.prefix)?;
    info!(id = %id, "Allocated local issue id");

    if options.json {
        print_json(&json!({ "id": id }))
    } else {
        println!("{id}");
        Ok(())
    }
}
