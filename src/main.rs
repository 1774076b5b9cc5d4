use clap::Parser;
use loopwork::cli::commands::{self, GlobalOptions};
use loopwork::cli::{Cli, Commands};
use loopwork::logging::init_logging;
use loopwork::{LoopError, StructuredError};
use std::io::{self, IsTerminal};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.quiet, cli.log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {e:#}");
    }

    let options = GlobalOptions::from_cli(&cli);

    let result = match &cli.command {
        Commands::NextId => commands::next_id::execute(&options),
        Commands::Graph(args) => commands::graph::execute(args, &options),
        Commands::Parse(args) => commands::parse::execute(args, &options),
        Commands::Log(args) => commands::log::execute(args, &options),
        Commands::Summary(args) => commands::summary::execute(args, &options),
        Commands::Config => commands::config::execute(&options),
    };

    if let Err(e) = result {
        handle_error(&e, &options);
    }
}

/// Handle errors with structured output support.
///
/// When --json is set or stdout is not a TTY, outputs structured JSON to stderr.
/// Otherwise, outputs human-readable error with optional color.
fn handle_error(err: &LoopError, options: &GlobalOptions) -> ! {
    let structured = match err {
        LoopError::IssueNotFound { id } => {
            let known = options
                .project()
                .map(|project| project.store().list_issue_ids())
                .unwrap_or_default();
            StructuredError::issue_not_found(id, &known)
        }
        _ => StructuredError::from_error(err),
    };

    let use_json = options.json || !io::stdout().is_terminal();

    if use_json {
        let json = structured.to_json();
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
        );
    } else {
        let use_color = io::stderr().is_terminal();
        eprintln!("{}", structured.to_human(use_color));
    }

    std::process::exit(structured.exit_code);
}
