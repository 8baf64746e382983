/*!
Explicit registration table of subcommands.

Commands are registered once at startup under a namespace name such as
`cmd_add`; the dispatcher discovers the ones carrying its prefix and exposes
them on the command line with the prefix removed (`add`).
*/

use std::collections::BTreeMap;

use serde_json::Value;

use super::descriptor::CommandDescriptor;
use crate::error::{Error, Result};

/// Bound invocation: positional values in declaration order plus keyword
/// values keyed by option keyword.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Call {
    pub args: Vec<Value>,
    pub kwargs: BTreeMap<String, Value>,
}

impl Call {
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Keyword value, treating `null` as absent.
    pub fn kwarg(&self, name: &str) -> Option<&Value> {
        self.kwargs.get(name).filter(|v| !v.is_null())
    }

    pub fn flag(&self, name: &str) -> bool {
        self.kwargs
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn int_arg(&self, index: usize) -> anyhow::Result<i64> {
        self.arg(index)
            .and_then(Value::as_i64)
            .ok_or_else(|| anyhow::anyhow!("argument {index} is not an integer"))
    }

    /// Positional array argument as strings (missing/null -> empty).
    pub fn string_list_arg(&self, index: usize) -> Vec<String> {
        string_list(self.arg(index))
    }

    /// Keyword array (or scalar) as strings (missing/null -> empty).
    pub fn string_list_kwarg(&self, name: &str) -> Vec<String> {
        string_list(self.kwarg(name))
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .flat_map(|v| match v {
                Value::Array(inner) => inner.iter().map(value_to_string).collect::<Vec<_>>(),
                other => vec![value_to_string(other)],
            })
            .collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![value_to_string(other)],
    }
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A command the dispatcher can invoke.
pub trait Subcommand {
    /// Structured argument/option metadata.
    fn descriptor(&self) -> CommandDescriptor;

    fn call(&self, call: Call) -> anyhow::Result<Value>;
}

type Handler = Box<dyn Fn(Call) -> anyhow::Result<Value>>;

/// Closure-backed command.
pub struct FnCommand {
    descriptor: CommandDescriptor,
    handler: Handler,
}

impl FnCommand {
    pub fn new<F>(descriptor: CommandDescriptor, handler: F) -> Self
    where
        F: Fn(Call) -> anyhow::Result<Value> + 'static,
    {
        Self {
            descriptor,
            handler: Box::new(handler),
        }
    }
}

impl Subcommand for FnCommand {
    fn descriptor(&self) -> CommandDescriptor {
        self.descriptor.clone()
    }

    fn call(&self, call: Call) -> anyhow::Result<Value> {
        (self.handler)(call)
    }
}

/// Fetch and validate a command's descriptor.
pub fn build_descriptor(command: &dyn Subcommand) -> Result<CommandDescriptor> {
    let descriptor = command.descriptor();
    descriptor.validate()?;
    Ok(descriptor)
}

pub(crate) struct Registered {
    pub descriptor: CommandDescriptor,
    pub command: Box<dyn Subcommand>,
}

#[derive(Default)]
pub struct Registry {
    entries: BTreeMap<String, Registered>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command under its descriptor name. Invalid descriptors and
    /// duplicate names are rejected.
    pub fn register(&mut self, command: impl Subcommand + 'static) -> Result<()> {
        let descriptor = build_descriptor(&command)?;
        if self.entries.contains_key(&descriptor.name) {
            return Err(Error::registration(
                &descriptor.name,
                "a command with this name is already registered",
            ));
        }
        tracing::trace!(name = %descriptor.name, "registered command");
        self.entries.insert(
            descriptor.name.clone(),
            Registered {
                descriptor,
                command: Box::new(command),
            },
        );
        Ok(())
    }

    /// Every registered name starting with `prefix`, sorted.
    pub fn discover(&self, prefix: &str) -> Vec<&str> {
        self.entries
            .keys()
            .filter(|name| name.starts_with(prefix))
            .map(String::as_str)
            .collect()
    }

    pub fn descriptor(&self, name: &str) -> Option<&CommandDescriptor> {
        self.entries.get(name).map(|r| &r.descriptor)
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Registered> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/* ---- Prefix helpers ---- */

/// Command-line subcommand -> registered name.
pub fn add_subcommand_prefix(subcommand: &str, prefix: &str) -> String {
    format!("{prefix}{subcommand}")
}

/// Registered name -> command-line subcommand.
pub fn remove_subcommand_prefix<'a>(name: &'a str, prefix: &str) -> &'a str {
    name.strip_prefix(prefix).unwrap_or(name)
}

pub fn add_option_prefix(option: &str) -> String {
    format!("--{option}")
}

pub fn remove_option_prefix(option: &str) -> &str {
    option.strip_prefix("--").unwrap_or(option)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::convert;
    use crate::dispatch::descriptor::{ArgSpec, Arity};
    use serde_json::json;

    fn noop(name: &str) -> FnCommand {
        FnCommand::new(CommandDescriptor::new(name, "noop"), |_| Ok(Value::Null))
    }

    #[test]
    fn discover_by_prefix() {
        let mut reg = Registry::new();
        reg.register(noop("cmd_add")).unwrap();
        reg.register(noop("cmd_run")).unwrap();
        reg.register(noop("helper_thing")).unwrap();
        assert_eq!(reg.discover("cmd_"), vec!["cmd_add", "cmd_run"]);
        assert_eq!(reg.discover("nothing_"), Vec::<&str>::new());
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut reg = Registry::new();
        reg.register(noop("cmd_add")).unwrap();
        let err = reg.register(noop("cmd_add")).unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn invalid_descriptor_rejected_at_registration() {
        let mut reg = Registry::new();
        let bad = FnCommand::new(
            CommandDescriptor::new("cmd_bad", "")
                .argument(ArgSpec::new("rest", convert::string).arity(Arity::ZeroOrMore))
                .argument(ArgSpec::new("tail", convert::string)),
            |_| Ok(Value::Null),
        );
        assert!(matches!(
            reg.register(bad),
            Err(Error::Registration { .. })
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn prefix_helpers() {
        assert_eq!(add_subcommand_prefix("add", "cmd_"), "cmd_add");
        assert_eq!(remove_subcommand_prefix("cmd_add", "cmd_"), "add");
        assert_eq!(add_option_prefix("hosts"), "--hosts");
        assert_eq!(remove_option_prefix("--hosts"), "hosts");
        assert_eq!(remove_option_prefix("hosts"), "hosts");
    }

    #[test]
    fn call_accessors() {
        let mut call = Call {
            args: vec![json!(2), json!(["a", "b"])],
            ..Default::default()
        };
        call.kwargs.insert("json".into(), json!(true));
        call.kwargs.insert("hosts".into(), Value::Null);
        call.kwargs.insert("tags".into(), json!("solo"));

        assert_eq!(call.int_arg(0).unwrap(), 2);
        assert!(call.int_arg(1).is_err());
        assert_eq!(call.string_list_arg(1), vec!["a", "b"]);
        assert!(call.flag("json"));
        assert!(!call.flag("missing"));
        assert!(call.kwarg("hosts").is_none());
        assert!(call.string_list_kwarg("hosts").is_empty());
        assert_eq!(call.string_list_kwarg("tags"), vec!["solo"]);
    }
}
