use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use serde_json::Value;

mod cmd;
mod dispatch;
mod error;
mod runner;
mod utils;

use dispatch::Dispatched;

/// shellkit - run shell commands concurrently and dispatch registered subcommands
///
/// Layout:
///   shellkit [-v|-vv] [-q] <subcommand> [ARGS...]
///
/// Built-in subcommands:
///   run    Run commands concurrently, print progress and a combined report
///   hosts  Show host identity / test allow-list entries
///   add    Add two integers
///
/// Env:
///   SHELLKIT_LOG    tracing filter override (e.g. "shellkit=debug")
///   SHELLKIT_HOSTS  Fallback allow-list for `run` (comma separated)
///
/// Examples:
///   shellkit run "make test" "sh -c 'exit 3'" @hostname
///   shellkit run --batch-file jobs.yaml --json
///   shellkit add 2 3
#[derive(Parser, Debug)]
#[command(
    name = "shellkit",
    version,
    author,
    about = "shellkit - concurrent shell command runner and subcommand dispatcher",
    propagate_version = true,
    disable_help_subcommand = true
)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silence all non-error output
    #[arg(short, long)]
    quiet: bool,

    /// Subcommand and its arguments
    #[arg(
        trailing_var_arg = true,
        allow_hyphen_values = true,
        required = true,
        value_name = "SUBCOMMAND"
    )]
    command: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = utils::derive_level(cli.verbose, cli.quiet);
    utils::init_logging(level);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(exit_status(&err))
        }
    }
}

/// 2 for bad invocations, 1 for anything that failed while running.
fn exit_status(err: &anyhow::Error) -> u8 {
    let invalid = err
        .downcast_ref::<error::Error>()
        .is_some_and(error::Error::is_invalid_argument);
    if invalid { 2 } else { 1 }
}

fn run(cli: &Cli) -> Result<()> {
    let registry = cmd::registry()?;
    match dispatch::dispatch(&cli.command, &registry, cmd::SUBCOMMAND_PREFIX, "shellkit")? {
        Dispatched::Help(text) => print!("{text}"),
        Dispatched::Output(Value::Null) => {}
        Dispatched::Output(Value::String(s)) => println!("{s}"),
        Dispatched::Output(other) => println!("{}", serde_json::to_string_pretty(&other)?),
    }
    Ok(())
}
