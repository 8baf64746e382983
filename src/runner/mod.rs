//! Multi-process runner.
//!
//! run_batch(specs, options, callables, host, progress) -> Report
//!   spec.rs       CommandSpec, command-line / batch-file parsing
//!   hosts.rs      HostIdentity + allow-list predicate
//!   handle.rs     ProcessHandle (one child + its captured output)
//!   batch.rs      Batch: submit / sweep / wait / collect_report
//!   report.rs     Report, ReportEntry, Outcome
//!   callables.rs  CallableRegistry for in-process entries

pub mod batch;
pub mod callables;
pub mod handle;
pub mod hosts;
pub mod report;
pub mod spec;

use anyhow::{Context, Result};

pub use batch::{Batch, DEFAULT_POLL_INTERVAL, RunOptions};
pub use callables::CallableRegistry;
pub use hosts::HostIdentity;
pub use report::{Outcome, Report, ReportEntry};
pub use spec::{BatchFile, CommandSpec, parse_command_line};

/// Submit, wait for and report on a batch.
pub async fn run_batch_async(
    specs: Vec<CommandSpec>,
    options: &RunOptions,
    callables: &CallableRegistry,
    host: &HostIdentity,
    progress: impl FnMut(usize, Option<i32>),
) -> Result<Report> {
    tracing::info!(
        entries = specs.len(),
        interval = ?options.poll_interval,
        "submitting batch"
    );
    let mut batch = Batch::submit(specs, options, callables, host);
    batch.wait(progress).await;
    batch.collect_report()
}

/// Synchronous wrapper: runs the batch on a single-threaded tokio runtime.
pub fn run_batch(
    specs: Vec<CommandSpec>,
    options: &RunOptions,
    callables: &CallableRegistry,
    host: &HostIdentity,
    progress: impl FnMut(usize, Option<i32>),
) -> Result<Report> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;
    rt.block_on(run_batch_async(specs, options, callables, host, progress))
}
