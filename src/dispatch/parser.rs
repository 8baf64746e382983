/*!
`dispatch`: argument vector + registry -> exactly one invocation.

Flow:
  1. `argv[0]` selects the subcommand; empty or unknown -> InvalidArgument.
  2. A clap `Command` is generated from every discovered descriptor.
  3. clap tokenizes the rest; its errors become InvalidArgument.
  4. Raw strings are converted (arguments in declaration order, options by
     keyword); any converter failure -> InvalidArgument naming the token.
  5. The selected command is called with the bound `Call`.

Nothing is invoked unless steps 1-4 all succeed.
*/

use anyhow::Result;
use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::Value;

use super::descriptor::{ArgSpec, Arity, CommandDescriptor, OptionKind, OptionSpec};
use super::registry::{Call, Registry, add_subcommand_prefix, remove_subcommand_prefix};
use crate::error::Error;

/// What a successful dispatch produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    /// Return value of the invoked command.
    Output(Value),
    /// `--help` was requested; rendered help text, nothing invoked.
    Help(String),
}

/// Parse `argv` (without the program name) and invoke the matching command.
///
/// Errors from parsing are `crate::error::Error::InvalidArgument`; errors
/// returned by the command itself pass through unchanged.
pub fn dispatch(
    argv: &[String],
    registry: &Registry,
    prefix: &str,
    program: &str,
) -> Result<Dispatched> {
    let (name, call) = match parse(argv, registry, prefix, program)? {
        Parsed::Call { name, call } => (name, call),
        Parsed::Help(text) => return Ok(Dispatched::Help(text)),
    };

    let entry = registry
        .get(&name)
        .ok_or_else(|| Error::invalid(&name, "unknown subcommand"))?;
    tracing::debug!(
        command = %name,
        args = call.args.len(),
        kwargs = call.kwargs.len(),
        "invoking"
    );
    let out = entry.command.call(call)?;
    Ok(Dispatched::Output(out))
}

enum Parsed {
    Call { name: String, call: Call },
    Help(String),
}

/// Steps 1-4: resolve and bind, without invoking anything.
fn parse(
    argv: &[String],
    registry: &Registry,
    prefix: &str,
    program: &str,
) -> crate::error::Result<Parsed> {
    let subcommand = match argv.first() {
        None => return Err(Error::invalid("", "missing subcommand")),
        Some(first) => first.as_str(),
    };

    // Top-level help/version style tokens are left to clap.
    if !subcommand.starts_with('-') {
        let full = add_subcommand_prefix(subcommand, prefix);
        if registry.descriptor(&full).is_none() {
            return Err(Error::invalid(subcommand, "unknown subcommand"));
        }
    }

    let command = build_command(registry, prefix, program);
    let matches = match command.try_get_matches_from(argv) {
        Ok(m) => m,
        Err(err) => {
            return match err.kind() {
                ErrorKind::DisplayHelp
                | ErrorKind::DisplayVersion
                | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                    Ok(Parsed::Help(err.render().to_string()))
                }
                _ => Err(invalid_from_clap(&err)),
            };
        }
    };

    let Some((selected, sub_matches)) = matches.subcommand() else {
        return Err(Error::invalid("", "missing subcommand"));
    };
    let name = add_subcommand_prefix(selected, prefix);
    let descriptor = registry
        .descriptor(&name)
        .ok_or_else(|| Error::invalid(selected, "unknown subcommand"))?;

    let call = bind(descriptor, sub_matches)?;
    Ok(Parsed::Call { name, call })
}

/// Generate the clap parser for every command carrying `prefix`.
pub fn build_command(registry: &Registry, prefix: &str, program: &str) -> Command {
    let mut command = Command::new(program.to_string())
        .no_binary_name(true)
        .subcommand_required(true)
        .disable_help_subcommand(true);

    for name in registry.discover(prefix) {
        let Some(descriptor) = registry.descriptor(name) else {
            continue;
        };
        command = command.subcommand(subcommand_for(
            remove_subcommand_prefix(name, prefix),
            descriptor,
        ));
    }
    command
}

fn subcommand_for(cli_name: &str, descriptor: &CommandDescriptor) -> Command {
    let mut sub = Command::new(cli_name.to_string()).about(descriptor.help.clone());
    for (i, arg) in descriptor.arguments.iter().enumerate() {
        sub = sub.arg(positional(arg, i + 1));
    }
    for opt in &descriptor.options {
        sub = sub.arg(option(opt));
    }
    sub
}

fn positional(spec: &ArgSpec, index: usize) -> Arg {
    let arg = Arg::new(spec.name.clone())
        .index(index)
        .value_name(spec.name.to_ascii_uppercase())
        .help(spec.help.clone())
        .required(spec.is_required());
    with_arity(arg, spec.arity, true)
}

fn option(spec: &OptionSpec) -> Arg {
    let arg = Arg::new(spec.name.clone())
        .long(spec.name.clone())
        .help(spec.help.clone());
    match spec.kind {
        OptionKind::Flag => arg.action(ArgAction::SetTrue),
        OptionKind::Valued(arity) => {
            with_arity(arg.value_name(spec.name.to_ascii_uppercase()), arity, false)
        }
    }
}

/// Positionals always take at least one value; their optionality comes
/// from `required(false)` instead. Values like `-2` are values, not flags.
fn with_arity(arg: Arg, arity: Arity, positional: bool) -> Arg {
    let (mut min, max) = arity.bounds();
    if positional {
        min = min.max(1);
    }
    let arg = arg
        .value_parser(clap::value_parser!(String))
        .allow_negative_numbers(true);
    let arg = match max {
        Some(max) => arg.num_args(min..=max),
        None => arg.num_args(min..),
    };
    if arity.is_multi() {
        arg.action(ArgAction::Append)
    } else {
        arg.action(ArgAction::Set)
    }
}

/// Convert raw matches into a `Call`, applying declared converters.
fn bind(descriptor: &CommandDescriptor, matches: &ArgMatches) -> crate::error::Result<Call> {
    let mut call = Call::default();

    for spec in &descriptor.arguments {
        let raw = raw_values(matches, &spec.name);
        call.args.push(convert_values(
            &spec.name,
            spec.arity,
            spec.converter,
            raw,
            spec.default.as_ref(),
        )?);
    }

    for spec in &descriptor.options {
        let value = match spec.kind {
            OptionKind::Flag => Value::Bool(matches.get_flag(&spec.name)),
            OptionKind::Valued(arity) => {
                let raw = raw_values(matches, &spec.name);
                convert_values(&spec.name, arity, spec.converter, raw, spec.default.as_ref())?
            }
        };
        call.kwargs.insert(spec.keyword(), value);
    }

    Ok(call)
}

/// `None` when the argument was not given at all.
fn raw_values(matches: &ArgMatches, id: &str) -> Option<Vec<String>> {
    matches
        .get_many::<String>(id)
        .map(|values| values.cloned().collect())
}

fn convert_values(
    name: &str,
    arity: Arity,
    converter: super::convert::Converter,
    raw: Option<Vec<String>>,
    default: Option<&Value>,
) -> crate::error::Result<Value> {
    let raw = match raw {
        Some(values) if !values.is_empty() => values,
        _ => return Ok(default.cloned().unwrap_or(Value::Null)),
    };

    let mut converted = Vec::with_capacity(raw.len());
    for token in &raw {
        let value = converter(token)
            .map_err(|reason| Error::invalid(token, format!("{name}: {reason}")))?;
        converted.push(value);
    }

    if arity.is_multi() {
        Ok(Value::Array(converted))
    } else {
        Ok(converted.into_iter().next().unwrap_or(Value::Null))
    }
}

/// Pull the offending token out of a clap error.
fn invalid_from_clap(err: &clap::Error) -> Error {
    let token = [
        ContextKind::InvalidSubcommand,
        ContextKind::InvalidArg,
        ContextKind::InvalidValue,
    ]
    .into_iter()
    .find_map(|kind| match err.get(kind) {
        Some(ContextValue::String(s)) => Some(s.clone()),
        Some(ContextValue::Strings(v)) => Some(v.join(", ")),
        _ => None,
    })
    .unwrap_or_default();

    Error::invalid(token, err.render().to_string().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::convert;
    use crate::dispatch::registry::FnCommand;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    const PREFIX: &str = "cmd_";

    fn argv(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    /// Registry with `add` and `tag`, recording every call made.
    fn registry(calls: Rc<RefCell<Vec<(String, Call)>>>) -> Registry {
        let mut reg = Registry::new();

        let log = calls.clone();
        reg.register(FnCommand::new(
            CommandDescriptor::new("cmd_add", "Add two integers")
                .argument(ArgSpec::new("a", convert::integer))
                .argument(ArgSpec::new("b", convert::integer)),
            move |call| {
                log.borrow_mut().push(("add".into(), call.clone()));
                Ok(json!(call.int_arg(0)? + call.int_arg(1)?))
            },
        ))
        .unwrap();

        let log = calls;
        reg.register(FnCommand::new(
            CommandDescriptor::new("cmd_tag", "Tag some files")
                .argument(ArgSpec::new("label", convert::string))
                .argument(ArgSpec::new("files", convert::path).arity(Arity::ZeroOrMore))
                .option(OptionSpec::flag("dry-run"))
                .option(OptionSpec::valued("retries", convert::integer).default(json!(3)))
                .option(OptionSpec::valued("hosts", convert::list)),
            move |call| {
                log.borrow_mut().push(("tag".into(), call.clone()));
                Ok(Value::Null)
            },
        ))
        .unwrap();

        reg
    }

    fn setup() -> (Registry, Rc<RefCell<Vec<(String, Call)>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        (registry(calls.clone()), calls)
    }

    #[test]
    fn add_invokes_with_converted_positionals() {
        let (reg, calls) = setup();
        let out = dispatch(&argv(&["add", "2", "3"]), &reg, PREFIX, "t").unwrap();
        assert_eq!(out, Dispatched::Output(json!(5)));

        let calls = calls.borrow();
        assert_eq!(calls.len(), 1, "exactly one invocation");
        assert_eq!(calls[0].0, "add");
        assert_eq!(calls[0].1.args, vec![json!(2), json!(3)]);
        assert!(calls[0].1.kwargs.is_empty());
    }

    #[test]
    fn negative_numbers_are_values() {
        let (reg, calls) = setup();
        let out = dispatch(&argv(&["add", "-2", "3"]), &reg, PREFIX, "t").unwrap();
        assert_eq!(out, Dispatched::Output(json!(1)));
        assert_eq!(calls.borrow()[0].1.args, vec![json!(-2), json!(3)]);

        let out = dispatch(&argv(&["tag", "x", "--retries", "-1"]), &reg, PREFIX, "t").unwrap();
        assert_eq!(out, Dispatched::Output(Value::Null));
        assert_eq!(calls.borrow()[1].1.kwargs["retries"], json!(-1));
    }

    #[test]
    fn options_flags_and_defaults_bind_as_keywords() {
        let (reg, calls) = setup();
        dispatch(
            &argv(&["tag", "release", "a.txt", "b.txt", "--dry-run", "--hosts", "x,y"]),
            &reg,
            PREFIX,
            "t",
        )
        .unwrap();

        let calls = calls.borrow();
        let call = &calls[0].1;
        assert_eq!(call.args[0], json!("release"));
        assert_eq!(call.args[1], json!(["a.txt", "b.txt"]));
        assert_eq!(call.kwargs["dry_run"], json!(true));
        assert_eq!(call.kwargs["retries"], json!(3), "default used when absent");
        assert_eq!(call.kwargs["hosts"], json!(["x", "y"]));
    }

    #[test]
    fn absent_flag_is_false_and_absent_option_is_null() {
        let (reg, calls) = setup();
        dispatch(&argv(&["tag", "only"]), &reg, PREFIX, "t").unwrap();
        let calls = calls.borrow();
        let call = &calls[0].1;
        assert_eq!(call.args[1], Value::Null);
        assert_eq!(call.kwargs["dry_run"], json!(false));
        assert_eq!(call.kwargs["hosts"], Value::Null);
    }

    #[test]
    fn unknown_subcommand_is_invalid_and_not_invoked() {
        let (reg, calls) = setup();
        let err = dispatch(&argv(&["frobnicate", "1"]), &reg, PREFIX, "t").unwrap_err();
        let err = err.downcast_ref::<Error>().expect("crate error");
        match err {
            Error::InvalidArgument { token, .. } => assert_eq!(token, "frobnicate"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn prefixed_name_is_not_a_subcommand() {
        let (reg, _) = setup();
        let err = dispatch(&argv(&["cmd_add", "1", "2"]), &reg, PREFIX, "t").unwrap_err();
        assert!(err.downcast_ref::<Error>().unwrap().is_invalid_argument());
    }

    #[test]
    fn empty_argv_is_invalid() {
        let (reg, _) = setup();
        let err = dispatch(&[], &reg, PREFIX, "t").unwrap_err();
        assert!(err.downcast_ref::<Error>().unwrap().is_invalid_argument());
    }

    #[test]
    fn converter_failure_names_token() {
        let (reg, calls) = setup();
        let err = dispatch(&argv(&["add", "2", "three"]), &reg, PREFIX, "t").unwrap_err();
        match err.downcast_ref::<Error>().unwrap() {
            Error::InvalidArgument { token, reason } => {
                assert_eq!(token, "three");
                assert!(reason.starts_with("b:"), "reason names the argument: {reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(calls.borrow().is_empty(), "no partial invocation");
    }

    #[test]
    fn missing_required_positional_is_invalid() {
        let (reg, calls) = setup();
        let err = dispatch(&argv(&["add", "2"]), &reg, PREFIX, "t").unwrap_err();
        assert!(err.downcast_ref::<Error>().unwrap().is_invalid_argument());
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn unknown_option_is_invalid() {
        let (reg, _) = setup();
        let err = dispatch(&argv(&["tag", "x", "--nope"]), &reg, PREFIX, "t").unwrap_err();
        match err.downcast_ref::<Error>().unwrap() {
            Error::InvalidArgument { token, .. } => assert!(token.contains("--nope")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn help_is_rendered_not_invoked() {
        let (reg, calls) = setup();
        match dispatch(&argv(&["add", "--help"]), &reg, PREFIX, "t").unwrap() {
            Dispatched::Help(text) => assert!(text.contains("Add two integers")),
            other => panic!("expected help, got {other:?}"),
        }
        match dispatch(&argv(&["--help"]), &reg, PREFIX, "t").unwrap() {
            Dispatched::Help(text) => {
                assert!(text.contains("add"));
                assert!(text.contains("tag"));
            }
            other => panic!("expected help, got {other:?}"),
        }
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn command_errors_pass_through() {
        let mut reg = Registry::new();
        reg.register(FnCommand::new(CommandDescriptor::new("cmd_boom", ""), |_| {
            anyhow::bail!("kaboom")
        }))
        .unwrap();
        let err = dispatch(&argv(&["boom"]), &reg, PREFIX, "t").unwrap_err();
        assert!(err.downcast_ref::<Error>().is_none());
        assert_eq!(err.to_string(), "kaboom");
    }
}
