/*!
Command descriptors: the structured metadata describing how one subcommand
parses its command-line input.

A descriptor is built once per registered command, validated by
`CommandDescriptor::validate` at registration time and never mutated
afterwards.

Example:
  CommandDescriptor::new("cmd_add", "Add two integers")
      .argument(ArgSpec::new("a", convert::integer).help("left operand"))
      .argument(ArgSpec::new("b", convert::integer).help("right operand"))
      .option(OptionSpec::flag("verbose-sum"))
*/

use std::collections::HashSet;

use serde_json::Value;

use super::convert::{self, Converter};
use crate::error::{Error, Result};

/// How many raw values an argument or valued option consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly one value, bound as a scalar.
    One,
    /// Zero or one value, bound as a scalar (or the default).
    Optional,
    ZeroOrMore,
    OneOrMore,
    /// Exactly `n` values, bound as an array.
    Exactly(usize),
}

impl Arity {
    /// Binds to an array rather than a scalar.
    pub fn is_multi(self) -> bool {
        matches!(
            self,
            Arity::ZeroOrMore | Arity::OneOrMore | Arity::Exactly(_)
        )
    }

    /// A positional with this arity must appear on the command line.
    pub fn requires_value(self) -> bool {
        matches!(self, Arity::One | Arity::OneOrMore | Arity::Exactly(_))
    }

    /// (min, max) number of raw values; `None` max means unbounded.
    pub fn bounds(self) -> (usize, Option<usize>) {
        match self {
            Arity::One => (1, Some(1)),
            Arity::Optional => (0, Some(1)),
            Arity::ZeroOrMore => (0, None),
            Arity::OneOrMore => (1, None),
            Arity::Exactly(n) => (n, Some(n)),
        }
    }
}

/// A positional argument.
#[derive(Debug, Clone)]
pub struct ArgSpec {
    pub name: String,
    pub arity: Arity,
    pub default: Option<Value>,
    pub converter: Converter,
    pub help: String,
}

impl ArgSpec {
    pub fn new(name: impl Into<String>, converter: Converter) -> Self {
        Self {
            name: name.into(),
            arity: Arity::One,
            default: None,
            converter,
            help: String::new(),
        }
    }

    pub fn arity(mut self, arity: Arity) -> Self {
        self.arity = arity;
        self
    }

    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    /// Required unless its arity allows zero values or it has a default.
    pub fn is_required(&self) -> bool {
        self.arity.requires_value() && self.default.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// `--name` present -> true, absent -> false.
    Flag,
    /// `--name VALUE...`
    Valued(Arity),
}

/// A `--name` option. Options are never required.
#[derive(Debug, Clone)]
pub struct OptionSpec {
    pub name: String,
    pub kind: OptionKind,
    pub default: Option<Value>,
    pub converter: Converter,
    pub help: String,
}

impl OptionSpec {
    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: OptionKind::Flag,
            default: None,
            converter: convert::boolean,
            help: String::new(),
        }
    }

    pub fn valued(name: impl Into<String>, converter: Converter) -> Self {
        Self {
            name: name.into(),
            kind: OptionKind::Valued(Arity::One),
            default: None,
            converter,
            help: String::new(),
        }
    }

    /// Only meaningful for valued options.
    pub fn arity(mut self, arity: Arity) -> Self {
        if let OptionKind::Valued(_) = self.kind {
            self.kind = OptionKind::Valued(arity);
        }
        self
    }

    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn is_flag(&self) -> bool {
        matches!(self.kind, OptionKind::Flag)
    }

    /// Keyword the bound value is passed under (`batch-file` -> `batch_file`).
    pub fn keyword(&self) -> String {
        option_keyword(&self.name)
    }
}

/// Translate an option name into a call keyword.
pub fn option_keyword(name: &str) -> String {
    name.trim().replace('-', "_")
}

/// Everything the dispatcher needs to parse input for one subcommand.
#[derive(Debug, Clone)]
pub struct CommandDescriptor {
    pub name: String,
    pub help: String,
    pub arguments: Vec<ArgSpec>,
    pub options: Vec<OptionSpec>,
}

impl CommandDescriptor {
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            arguments: Vec::new(),
            options: Vec::new(),
        }
    }

    pub fn argument(mut self, arg: ArgSpec) -> Self {
        self.arguments.push(arg);
        self
    }

    pub fn option(mut self, opt: OptionSpec) -> Self {
        self.options.push(opt);
        self
    }

    /// Check the descriptor can be turned into an unambiguous parser.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(Error::registration(&self.name, reason));

        if self.name.trim().is_empty() {
            return fail("command name is empty".into());
        }

        let mut seen: HashSet<&str> = HashSet::new();
        let names = self
            .arguments
            .iter()
            .map(|a| a.name.as_str())
            .chain(self.options.iter().map(|o| o.name.as_str()));
        for name in names {
            if let Err(reason) = check_name(name) {
                return fail(reason);
            }
            if !seen.insert(name) {
                return fail(format!("duplicate argument/option name '{name}'"));
            }
        }

        let last = self.arguments.len().saturating_sub(1);
        let mut optional_seen: Option<&str> = None;
        for (i, arg) in self.arguments.iter().enumerate() {
            if arg.arity == Arity::Exactly(0) {
                return fail(format!("argument '{}' takes zero values", arg.name));
            }
            if arg.arity.is_multi() && i != last {
                return fail(format!(
                    "only the last positional may take several values ('{}' is not last)",
                    arg.name
                ));
            }
            if arg.is_required() {
                if let Some(prev) = optional_seen {
                    return fail(format!(
                        "required argument '{}' follows optional argument '{prev}'",
                        arg.name
                    ));
                }
            } else {
                optional_seen.get_or_insert(arg.name.as_str());
            }
        }

        for opt in &self.options {
            match opt.kind {
                OptionKind::Valued(Arity::Exactly(0)) => {
                    return fail(format!("option '{}' takes zero values", opt.name));
                }
                OptionKind::Flag => {
                    if let Some(d) = &opt.default
                        && d != &Value::Bool(false)
                    {
                        return fail(format!("flag '{}' cannot have a default", opt.name));
                    }
                }
                OptionKind::Valued(_) => {}
            }
        }

        Ok(())
    }
}

fn check_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("empty argument/option name".into());
    }
    if name.starts_with('-') {
        return Err(format!("'{name}' must be given without leading dashes"));
    }
    if name == "help" {
        return Err("'help' is reserved".into());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(format!("'{name}' contains invalid characters"));
    }
    Ok(())
}
