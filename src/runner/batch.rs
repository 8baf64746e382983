/*!
Execution batch lifecycle: submit -> wait -> collect_report.

  submit   : callables run synchronously right away; external commands are
             host-checked and launched without waiting.
  wait     : sweeps every running handle with a non-blocking poll, reports
             each exit once through the progress callback, sleeps once per
             sweep until nothing is left running.
  collect  : reads captured output back and builds the ordered `Report`.

One failed or skipped entry never affects the others.
*/

use std::time::Duration;

use anyhow::{Result, bail};

use super::callables::CallableRegistry;
use super::handle::{ProcessHandle, exit_code};
use super::hosts::HostIdentity;
use super::report::{Outcome, Report, ReportEntry};
use super::spec::CommandSpec;
use crate::error::Error;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Sleep between two polling sweeps.
    pub poll_interval: Duration,
    /// Batch-wide host allow-list; empty means run everywhere.
    pub hosts: Vec<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            hosts: Vec::new(),
        }
    }
}

#[derive(Debug)]
enum Slot {
    Running(ProcessHandle),
    Returned(String),
    Failed(String),
    Skipped(String),
}

#[derive(Debug)]
struct Entry {
    description: String,
    slot: Slot,
}

#[derive(Debug)]
pub struct Batch {
    host: String,
    interval: Duration,
    entries: Vec<Entry>,
}

impl Batch {
    /// Start every entry. Must run inside a tokio runtime (external commands
    /// are spawned through `tokio::process`).
    pub fn submit(
        specs: Vec<CommandSpec>,
        options: &RunOptions,
        callables: &CallableRegistry,
        host: &HostIdentity,
    ) -> Self {
        let entries = specs
            .into_iter()
            .enumerate()
            .map(|(index, spec)| Entry {
                description: spec.call_string(),
                slot: start(index, &spec, options, callables, host),
            })
            .collect();

        Self {
            host: host.name().to_string(),
            interval: options.poll_interval,
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of external commands still running.
    pub fn outstanding(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(&e.slot, Slot::Running(h) if !h.is_finished()))
            .count()
    }

    /// One pass over all running handles. Every handle seen exiting during
    /// this pass is reported as `(index, exit code)`. Returns how many are
    /// still running.
    pub fn sweep(&mut self, progress: &mut impl FnMut(usize, Option<i32>)) -> usize {
        let mut remaining = 0;
        for (index, entry) in self.entries.iter_mut().enumerate() {
            let Slot::Running(handle) = &mut entry.slot else {
                continue;
            };
            if handle.is_finished() {
                continue;
            }
            match handle.poll() {
                Ok(Some(status)) => {
                    let code = exit_code(status);
                    tracing::info!(index = index + 1, ?code, "command finished");
                    progress(index, code);
                }
                Ok(None) => remaining += 1,
                Err(e) => {
                    tracing::warn!(index = index + 1, "polling failed: {e}");
                    let reason = Error::execution(entry.description.clone(), e).to_string();
                    entry.slot = Slot::Failed(reason);
                }
            }
        }
        remaining
    }

    /// Poll until every external command has exited.
    pub async fn wait(&mut self, mut progress: impl FnMut(usize, Option<i32>)) {
        loop {
            let remaining = self.sweep(&mut progress);
            if remaining == 0 {
                return;
            }
            tracing::trace!(remaining, "sleeping {:?}", self.interval);
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Build the ordered report. Fails if a command is still running.
    pub fn collect_report(self) -> Result<Report> {
        let outstanding = self.outstanding();
        if outstanding > 0 {
            bail!("{outstanding} command(s) still running; wait for the batch first");
        }

        let mut entries = Vec::with_capacity(self.entries.len());
        for (index, entry) in self.entries.into_iter().enumerate() {
            let mut report = ReportEntry {
                index,
                command: entry.description,
                stdout: String::new(),
                stderr: String::new(),
                outcome: Outcome::Returned,
            };
            match entry.slot {
                Slot::Running(handle) => {
                    let code = handle.status().and_then(exit_code);
                    match handle.into_output() {
                        Ok(out) => {
                            report.stdout = out.stdout;
                            report.stderr = out.stderr;
                            report.outcome = Outcome::Exited { code };
                        }
                        Err(e) => {
                            report.outcome = Outcome::Failed {
                                reason: format!("could not read captured output: {e}"),
                            };
                        }
                    }
                }
                Slot::Returned(out) => report.stdout = out,
                Slot::Failed(reason) => report.outcome = Outcome::Failed { reason },
                Slot::Skipped(host) => report.outcome = Outcome::Skipped { host },
            }
            entries.push(report);
        }

        Ok(Report {
            host: self.host,
            entries,
        })
    }
}

fn start(
    index: usize,
    spec: &CommandSpec,
    options: &RunOptions,
    callables: &CallableRegistry,
    host: &HostIdentity,
) -> Slot {
    match spec {
        CommandSpec::Callable(invocation) => match callables.invoke(invocation) {
            Ok(out) => {
                tracing::debug!(
                    index = index + 1,
                    callable = %invocation.name,
                    "callable returned"
                );
                Slot::Returned(out)
            }
            Err(e) => {
                tracing::warn!(
                    index = index + 1,
                    callable = %invocation.name,
                    "callable failed: {e:#}"
                );
                Slot::Failed(Error::execution(spec.to_string(), format!("{e:#}")).to_string())
            }
        },
        CommandSpec::External(ext) => {
            let allowed = if ext.hosts.is_empty() {
                &options.hosts
            } else {
                &ext.hosts
            };
            if !host.is_allowed(allowed) {
                tracing::info!(
                    index = index + 1,
                    host = %host.name(),
                    "skipped by host allow-list"
                );
                return Slot::Skipped(host.name().to_string());
            }
            match ProcessHandle::spawn(&ext.argv) {
                Ok(handle) => Slot::Running(handle),
                Err(e) => {
                    tracing::warn!(index = index + 1, "{e}");
                    Slot::Failed(e.to_string())
                }
            }
        }
    }
}
