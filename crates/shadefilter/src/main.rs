//! Entry point: parses the CLI, initialises tracing, and dispatches to the
//! viewer or the offline `check` command in `run.rs`.
//!
//! Any startup failure is returned from `main`, which exits with status 1.

mod cli;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    let result = match cli.command {
        Some(Command::Check(args)) => run::check(args),
        None => run::run(cli.run),
    };
    if let Err(err) = &result {
        tracing::error!("{err:#}");
    }
    result
}
