/*!
`hosts.rs`

Implements the `hosts` subcommand: show how this machine identifies itself
and, when candidate names are given, whether a `run --hosts` allow-list
made of them would let external commands execute here.

  shellkit hosts
  shellkit hosts build01 10.0.0.5 --json
*/

use anyhow::Result;
use serde_json::{Value, json};

use super::format::{Role, StyleOptions, color, table};
use crate::dispatch::convert;
use crate::dispatch::{ArgSpec, Arity, Call, CommandDescriptor, FnCommand, OptionSpec};
use crate::runner::HostIdentity;

pub fn command() -> FnCommand {
    FnCommand::new(descriptor(), |call| execute_hosts(call, &HostIdentity::detect()))
}

fn descriptor() -> CommandDescriptor {
    CommandDescriptor::new("cmd_hosts", "Show host identity and allow-list matches")
        .argument(
            ArgSpec::new("hosts", convert::string)
                .arity(Arity::ZeroOrMore)
                .help("Host names or addresses to test against this machine"),
        )
        .option(OptionSpec::flag("json").help("Output as JSON"))
}

pub fn execute_hosts(call: Call, identity: &HostIdentity) -> Result<Value> {
    let candidates = call.string_list_arg(0);
    // Each name is checked alone so the answer is per candidate.
    let matches: Vec<(String, bool)> = candidates
        .into_iter()
        .map(|h| {
            let allowed = identity.is_allowed(std::slice::from_ref(&h));
            (h, allowed)
        })
        .collect();

    if call.flag("json") {
        let checks: Vec<Value> = matches
            .iter()
            .map(|(host, allowed)| json!({ "host": host, "allowed": allowed }))
            .collect();
        return Ok(json!({ "identity": identity, "checks": checks }));
    }

    let style = StyleOptions::detect();
    let mut out = format!(
        "hostname   : {}\nshort name : {}\nfqdn       : {}\naddresses  : {}",
        identity.hostname,
        identity.short_name,
        identity.fqdn,
        identity
            .addresses
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    if !matches.is_empty() {
        let rows: Vec<Vec<String>> = matches
            .iter()
            .map(|(host, allowed)| {
                let mark = if *allowed {
                    color(Role::Success, "yes", &style)
                } else {
                    color(Role::Dim, "no", &style)
                };
                vec![host.clone(), mark]
            })
            .collect();
        out.push_str("\n\n");
        out.push_str(&table(&["HOST", "MATCHES"], &rows, &style));
    }
    Ok(Value::String(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Subcommand;
    use std::collections::BTreeMap;
    use std::net::IpAddr;

    fn identity() -> HostIdentity {
        let ip: IpAddr = "10.1.2.3".parse().unwrap();
        HostIdentity::from_hostname("build01.example.com", vec![ip])
    }

    fn call(hosts: &[&str], json_out: bool) -> Call {
        Call {
            args: vec![json!(hosts)],
            kwargs: BTreeMap::from([("json".to_string(), json!(json_out))]),
        }
    }

    #[test]
    fn descriptor_is_valid() {
        assert!(command().descriptor().validate().is_ok());
    }

    #[test]
    fn json_checks_each_candidate() {
        let out = execute_hosts(call(&["BUILD01", "10.1.2.3", "other"], true), &identity()).unwrap();
        assert_eq!(out["identity"]["short_name"], "build01");
        assert_eq!(out["checks"][0]["allowed"], true);
        assert_eq!(out["checks"][1]["allowed"], true);
        assert_eq!(out["checks"][2]["allowed"], false);
    }

    #[test]
    fn text_without_candidates_has_no_table() {
        let out = execute_hosts(call(&[], false), &identity()).unwrap();
        let text = out.as_str().unwrap();
        assert!(text.contains("short name : build01"));
        assert!(text.contains("10.1.2.3"));
        assert!(!text.contains("MATCHES"));
    }
}
