/*!
Batch entry specifications.

A batch entry is either an external command (argv, optionally restricted to
some hosts) or a call to a named in-process callable.

Parsing helpers:
  - parse_command_line("sh -c 'exit 3'")  -> External (shell-words splitting)
  - parse_command_line("@echo a b")       -> Callable named `echo`
  - BatchFile::load(path)                 -> JSON or YAML batch description

Batch file shape (YAML shown, JSON equivalent accepted):

  hosts: [build01, 10.0.0.7]   # optional batch-wide allow-list
  interval: 0.5                # optional poll interval (seconds)
  commands:
    - ["sh", "-c", "echo hi"]  # argv array
    - "ls -la /tmp"            # shell-style string
    - call: echo               # in-process callable
      args: [a, b]
      kwargs: { sep: "," }
    - argv: ["make", "deploy"] # external with its own allow-list
      hosts: [deploy01]
*/

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use shell_words::split as shell_split;

/// Marks an in-process callable on the command line (`@echo hi`).
pub const CALLABLE_SIGIL: char = '@';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCommand {
    pub argv: Vec<String>,
    /// Per-entry allow-list; empty defers to the batch allow-list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallableInvocation {
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub kwargs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    External(ExternalCommand),
    Callable(CallableInvocation),
}

impl CommandSpec {
    pub fn external<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::External(ExternalCommand {
            argv: argv.into_iter().map(Into::into).collect(),
            hosts: Vec::new(),
        })
    }

    pub fn callable<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::Callable(CallableInvocation {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
            kwargs: BTreeMap::new(),
        })
    }

    /// Restrict an external command to `hosts`. No effect on callables.
    pub fn with_hosts(mut self, hosts: Vec<String>) -> Self {
        if let CommandSpec::External(ref mut ext) = self {
            ext.hosts = hosts;
        }
        self
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, CommandSpec::Callable(_))
    }

    /// Multi-line description used in listings and reports.
    pub fn call_string(&self) -> String {
        match self {
            CommandSpec::External(ext) => format!("Command: {}", shell_words::join(&ext.argv)),
            CommandSpec::Callable(c) => {
                let mut s = format!("Callable: {}", c.name);
                if !c.args.is_empty() {
                    s.push_str(&format!("\nArgs: {}", shell_words::join(&c.args)));
                }
                if !c.kwargs.is_empty() {
                    let kw = c
                        .kwargs
                        .iter()
                        .map(|(k, v)| format!("{k}={v}"))
                        .collect::<Vec<_>>()
                        .join(" ");
                    s.push_str(&format!("\nKwargs: {kw}"));
                }
                s
            }
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandSpec::External(ext) => f.write_str(&shell_words::join(&ext.argv)),
            CommandSpec::Callable(c) => {
                write!(f, "{CALLABLE_SIGIL}{}", c.name)?;
                if !c.args.is_empty() {
                    write!(f, " {}", shell_words::join(&c.args))?;
                }
                Ok(())
            }
        }
    }
}

/// Parse one command line. A leading `@` selects an in-process callable,
/// whose remaining tokens become positional args (`key=value` tokens after
/// `--` become kwargs).
pub fn parse_command_line(raw: &str) -> Result<CommandSpec> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("command line is empty");
    }

    if let Some(rest) = trimmed.strip_prefix(CALLABLE_SIGIL) {
        let parts = shell_split(rest).context("failed to split callable invocation")?;
        let Some((name, tokens)) = parts.split_first() else {
            bail!("callable name missing after '{CALLABLE_SIGIL}'");
        };
        if name.is_empty() {
            bail!("callable name missing after '{CALLABLE_SIGIL}'");
        }
        let mut args = Vec::new();
        let mut kwargs = BTreeMap::new();
        let mut keywords = false;
        for token in tokens {
            if !keywords && token == "--" {
                keywords = true;
                continue;
            }
            if keywords {
                let Some((k, v)) = token.split_once('=') else {
                    bail!("invalid keyword (expected KEY=VALUE): {token}");
                };
                kwargs.insert(k.trim().to_string(), v.to_string());
            } else {
                args.push(token.clone());
            }
        }
        return Ok(CommandSpec::Callable(CallableInvocation {
            name: name.clone(),
            args,
            kwargs,
        }));
    }

    let parts = shell_split(trimmed).context("failed to split command line (shell quoting)")?;
    if parts.first().is_none_or(|p| p.is_empty()) {
        bail!("empty program name in command line");
    }
    Ok(CommandSpec::external(parts))
}

/* ---- Batch files ---- */

/// One entry as written in a batch file.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Line(String),
    Argv(Vec<String>),
    Call {
        call: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        kwargs: BTreeMap<String, String>,
    },
    External {
        argv: Vec<String>,
        #[serde(default)]
        hosts: Vec<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct RawBatch {
    #[serde(default)]
    hosts: Vec<String>,
    interval: Option<f64>,
    #[serde(default)]
    commands: Vec<RawEntry>,
}

/// Parsed batch file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchFile {
    pub hosts: Vec<String>,
    pub interval_secs: Option<f64>,
    pub commands: Vec<CommandSpec>,
}

impl BatchFile {
    /// Load a batch file; `.yaml` / `.yml` are parsed as YAML, anything else as JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read batch file: {}", path.display()))?;
        let lower = path.to_string_lossy().to_ascii_lowercase();
        if lower.ends_with(".yaml") || lower.ends_with(".yml") {
            Self::from_yaml(&raw)
        } else {
            Self::from_json(&raw)
        }
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let batch: RawBatch = serde_yaml::from_str(raw).context("failed to parse YAML batch file")?;
        Self::from_raw(batch)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let batch: RawBatch = serde_json::from_str(raw).context("failed to parse JSON batch file")?;
        Self::from_raw(batch)
    }

    fn from_raw(batch: RawBatch) -> Result<Self> {
        if let Some(secs) = batch.interval
            && !(secs.is_finite() && secs >= 0.0)
        {
            bail!("batch file interval must be a non-negative number of seconds");
        }

        let mut commands = Vec::with_capacity(batch.commands.len());
        for (i, entry) in batch.commands.into_iter().enumerate() {
            let spec = match entry {
                RawEntry::Line(line) => parse_command_line(&line)
                    .with_context(|| format!("batch entry {}", i + 1))?,
                RawEntry::Argv(argv) | RawEntry::External { argv, .. } if argv.is_empty() => {
                    bail!("batch entry {}: empty argv", i + 1)
                }
                RawEntry::Argv(argv) => CommandSpec::external(argv),
                RawEntry::External { argv, hosts } => CommandSpec::external(argv).with_hosts(hosts),
                RawEntry::Call { call, args, kwargs } => CommandSpec::Callable(CallableInvocation {
                    name: call,
                    args,
                    kwargs,
                }),
            };
            commands.push(spec);
        }

        Ok(BatchFile {
            hosts: batch.hosts,
            interval_secs: batch.interval,
            commands,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_external_with_quotes() {
        let spec = parse_command_line(r#"sh -c 'exit 3'"#).unwrap();
        assert_eq!(spec, CommandSpec::external(["sh", "-c", "exit 3"]));
        assert_eq!(spec.call_string(), "Command: sh -c 'exit 3'");
    }

    #[test]
    fn parse_callable_with_kwargs() {
        let spec = parse_command_line("@echo a 'b c' -- sep=,").unwrap();
        let CommandSpec::Callable(c) = &spec else {
            panic!("expected callable");
        };
        assert_eq!(c.name, "echo");
        assert_eq!(c.args, vec!["a", "b c"]);
        assert_eq!(c.kwargs.get("sep").map(String::as_str), Some(","));
        assert_eq!(spec.call_string(), "Callable: echo\nArgs: a 'b c'\nKwargs: sep=,");
        assert_eq!(spec.to_string(), "@echo a 'b c'");
    }

    #[test]
    fn parse_rejects_empty() {
        assert!(parse_command_line("   ").is_err());
        assert!(parse_command_line("@").is_err());
        assert!(parse_command_line("@echo -- novalue").is_err());
        assert!(parse_command_line("sh -c 'unterminated").is_err());
    }

    #[test]
    fn with_hosts_only_touches_external() {
        let ext = CommandSpec::external(["true"]).with_hosts(vec!["a".into()]);
        let CommandSpec::External(e) = ext else {
            panic!("expected external");
        };
        assert_eq!(e.hosts, vec!["a"]);

        let call = CommandSpec::callable("echo", ["x"]).with_hosts(vec!["a".into()]);
        assert!(call.is_callable());
    }

    const YAML: &str = r#"
hosts: [build01]
interval: 0.25
commands:
  - ["sh", "-c", "echo hi"]
  - "ls -la /tmp"
  - call: echo
    args: [a, b]
    kwargs: { sep: "," }
  - argv: ["make", "deploy"]
    hosts: [deploy01]
"#;

    const JSON: &str = r#"{
  "hosts": ["build01"],
  "interval": 0.25,
  "commands": [
    ["sh", "-c", "echo hi"],
    "ls -la /tmp",
    {"call": "echo", "args": ["a", "b"], "kwargs": {"sep": ","}},
    {"argv": ["make", "deploy"], "hosts": ["deploy01"]}
  ]
}"#;

    #[test]
    fn yaml_and_json_batches_agree() {
        let yaml = BatchFile::from_yaml(YAML).unwrap();
        let json = BatchFile::from_json(JSON).unwrap();
        assert_eq!(yaml, json);

        assert_eq!(yaml.hosts, vec!["build01"]);
        assert_eq!(yaml.interval_secs, Some(0.25));
        assert_eq!(yaml.commands.len(), 4);
        assert_eq!(yaml.commands[1], CommandSpec::external(["ls", "-la", "/tmp"]));
        assert!(yaml.commands[2].is_callable());
        assert_eq!(
            yaml.commands[3],
            CommandSpec::external(["make", "deploy"]).with_hosts(vec!["deploy01".into()])
        );
    }

    #[test]
    fn batch_file_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.yml");
        std::fs::write(&path, YAML).unwrap();
        let batch = BatchFile::load(&path).unwrap();
        assert_eq!(batch.commands.len(), 4);

        let missing = dir.path().join("missing.json");
        assert!(BatchFile::load(&missing).is_err());
    }

    #[test]
    fn batch_rejects_bad_entries() {
        assert!(BatchFile::from_json(r#"{"commands": [[]]}"#).is_err());
        assert!(BatchFile::from_json(r#"{"interval": -1, "commands": []}"#).is_err());
    }
}
