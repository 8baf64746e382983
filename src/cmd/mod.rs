/*!
Built-in subcommands.

Each module exposes a `command()` returning a `FnCommand` whose descriptor
name carries `SUBCOMMAND_PREFIX`; the user types the bare name.

  run.rs     (run: concurrent batch + combined report)
  hosts.rs   (hosts: identity + allow-list check)
  add.rs     (add: integer sum)
  format.rs  (colors / tables for human output)
*/

pub mod add;
pub mod format;
pub mod hosts;
pub mod run;

use anyhow::Result;

use crate::dispatch::Registry;

/// Registered names look like `cmd_run`; `run` on the command line.
pub const SUBCOMMAND_PREFIX: &str = "cmd_";

pub fn registry() -> Result<Registry> {
    let mut registry = Registry::new();
    registry.register(run::command())?;
    registry.register(hosts::command())?;
    registry.register(add::command())?;
    Ok(registry)
}
