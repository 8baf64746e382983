//! `add A B`: integer sum. Small enough to double as a dispatcher smoke test.

use anyhow::{Context, Result};
use serde_json::Value;

use crate::dispatch::convert;
use crate::dispatch::{ArgSpec, Call, CommandDescriptor, FnCommand};

pub fn command() -> FnCommand {
    FnCommand::new(
        CommandDescriptor::new("cmd_add", "Add two integers")
            .argument(ArgSpec::new("a", convert::integer).help("First addend"))
            .argument(ArgSpec::new("b", convert::integer).help("Second addend")),
        execute_add,
    )
}

pub fn execute_add(call: Call) -> Result<Value> {
    let a = call.int_arg(0)?;
    let b = call.int_arg(1)?;
    let sum = a.checked_add(b).context("integer overflow")?;
    Ok(Value::from(sum))
}
