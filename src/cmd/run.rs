/*!
`run.rs`

Implements the `run` subcommand: launch several commands at once, show
progress as they finish, and print one combined report.

  shellkit run "make test" "sh -c 'exit 3'" @hostname
  shellkit run --batch-file jobs.yaml --hosts build01,build02 --json

Sources of settings (first wins):
  hosts    : --hosts > batch file `hosts` > SHELLKIT_HOSTS env
  interval : --interval > batch file `interval` > 2 seconds

Human output:
  [1] Command: make test          (listing, before launch)
  [1] done with return code 0     (progress, as each command exits)
  ===== ... report ... =====
  summary table

JSON output (--json): the serialized `Report` plus `exit_codes`.
*/

use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde_json::Value;

use super::format::{Role, StyleOptions, color, table, truncate_ellipsis};
use crate::dispatch::convert;
use crate::dispatch::{ArgSpec, Arity, Call, CommandDescriptor, FnCommand, OptionSpec};
use crate::runner::{
    self, BatchFile, CommandSpec, HostIdentity, Outcome, Report, RunOptions, callables,
    parse_command_line,
};

/// Environment fallback for `--hosts` (comma separated).
pub const HOSTS_ENV: &str = "SHELLKIT_HOSTS";

pub fn command() -> FnCommand {
    FnCommand::new(descriptor(), execute_run)
}

fn descriptor() -> CommandDescriptor {
    CommandDescriptor::new(
        "cmd_run",
        "Run commands concurrently and print one combined report",
    )
    .argument(
        ArgSpec::new("commands", convert::string)
            .arity(Arity::ZeroOrMore)
            .help("Command lines to run; '@name args...' calls an in-process callable"),
    )
    .option(
        OptionSpec::valued("hosts", convert::list)
            .help("Only run external commands on these hosts (comma separated)"),
    )
    .option(OptionSpec::valued("interval", convert::number).help("Seconds between polling sweeps"))
    .option(
        OptionSpec::valued("batch-file", convert::path)
            .help("JSON or YAML file listing commands (plus optional hosts/interval)"),
    )
    .option(OptionSpec::flag("json").help("Output the report as JSON"))
    .option(OptionSpec::flag("no-progress").help("Do not print listing/progress lines"))
}

/// Resolved inputs for one `run` invocation.
#[derive(Debug)]
struct RunPlan {
    specs: Vec<CommandSpec>,
    options: RunOptions,
    json: bool,
    progress: bool,
}

fn plan(call: &Call) -> Result<RunPlan> {
    let batch = match call.kwarg("batch_file") {
        Some(Value::String(path)) => BatchFile::load(path)?,
        _ => BatchFile::default(),
    };

    let mut specs = batch.commands;
    for line in call.string_list_arg(0) {
        specs.push(parse_command_line(&line).with_context(|| format!("invalid command: {line}"))?);
    }
    if specs.is_empty() {
        bail!("no commands given (pass COMMAND... or --batch-file)");
    }

    let mut hosts = call.string_list_kwarg("hosts");
    if hosts.is_empty() {
        hosts = batch.hosts;
    }
    if hosts.is_empty()
        && let Ok(env_hosts) = std::env::var(HOSTS_ENV)
    {
        hosts = env_hosts
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(String::from)
            .collect();
    }

    let interval_secs = match call.kwarg("interval").and_then(Value::as_f64) {
        Some(secs) => Some(secs),
        None => batch.interval_secs,
    };
    let poll_interval = match interval_secs {
        Some(secs) => Duration::try_from_secs_f64(secs).map_err(|_| {
            anyhow::anyhow!("interval must be a non-negative number of seconds, got {secs}")
        })?,
        None => runner::DEFAULT_POLL_INTERVAL,
    };

    let json = call.flag("json");
    Ok(RunPlan {
        specs,
        options: RunOptions {
            poll_interval,
            hosts,
        },
        json,
        progress: !json && !call.flag("no_progress"),
    })
}

pub fn execute_run(call: Call) -> Result<Value> {
    let plan = plan(&call)?;
    let style = StyleOptions::detect();

    if plan.progress {
        for (i, spec) in plan.specs.iter().enumerate() {
            println!("[{}] {}", i + 1, spec.call_string());
        }
    }

    let host = HostIdentity::detect();
    let show_progress = plan.progress;
    let report = runner::run_batch(
        plan.specs,
        &plan.options,
        &callables::builtin(),
        &host,
        |index, code| {
            if show_progress {
                println!("{}", progress_line(index, code, &style));
            }
        },
    )?;

    if plan.json {
        return Ok(report.to_json());
    }

    Ok(Value::String(format!("{report}\n{}", summary(&report, &style))))
}

fn progress_line(index: usize, code: Option<i32>, style: &StyleOptions) -> String {
    let (role, text) = match code {
        Some(0) => (Role::Success, "0".to_string()),
        Some(c) => (Role::Warning, c.to_string()),
        None => (Role::Error, "none (terminated by signal)".to_string()),
    };
    format!(
        "[{}] done with return code {}",
        index + 1,
        color(role, text, style)
    )
}

/// One row per entry: index, outcome, command.
fn summary(report: &Report, style: &StyleOptions) -> String {
    let rows: Vec<Vec<String>> = report
        .entries
        .iter()
        .map(|e| {
            let role = match &e.outcome {
                o if o.is_success() => Role::Success,
                Outcome::Skipped { .. } => Role::Dim,
                Outcome::Exited { .. } => Role::Warning,
                _ => Role::Error,
            };
            let first_line = e.command.lines().next().unwrap_or_default();
            vec![
                (e.index + 1).to_string(),
                color(role, e.outcome.label(), style),
                truncate_ellipsis(first_line, 120),
            ]
        })
        .collect();
    table(&["#", "STATUS", "COMMAND"], &rows, style)
}
