//! Caller-supplied table of in-process callables a batch may invoke by name.
//!
//! Only names registered here can be run in-process; everything else in a
//! batch is an external command.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;

use super::spec::CallableInvocation;

type Callable = Box<dyn Fn(&[String], &BTreeMap<String, String>) -> Result<String>>;

#[derive(Default)]
pub struct CallableRegistry {
    callables: HashMap<String, Callable>,
}

impl CallableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a callable.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&[String], &BTreeMap<String, String>) -> Result<String> + 'static,
    {
        self.callables.insert(name.into(), Box::new(f));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.callables.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.callables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Invoke synchronously. Unknown names are an error.
    pub fn invoke(&self, invocation: &CallableInvocation) -> Result<String> {
        let f = self
            .callables
            .get(&invocation.name)
            .ok_or_else(|| anyhow::anyhow!("no callable named '{}'", invocation.name))?;
        f(&invocation.args, &invocation.kwargs)
    }
}

/// Callables every `run` invocation gets: `echo` and `hostname`.
pub fn builtin() -> CallableRegistry {
    let mut reg = CallableRegistry::new();
    reg.register("echo", |args, kwargs| {
        let sep = kwargs.get("sep").map(String::as_str).unwrap_or(" ");
        Ok(args.join(sep))
    })
    .register("hostname", |_, _| {
        Ok(super::hosts::HostIdentity::detect().short_name)
    });
    reg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(name: &str, args: &[&str]) -> CallableInvocation {
        CallableInvocation {
            name: name.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
            kwargs: BTreeMap::new(),
        }
    }

    #[test]
    fn echo_joins_with_separator() {
        let reg = builtin();
        assert_eq!(reg.invoke(&invocation("echo", &["a", "b"])).unwrap(), "a b");

        let mut inv = invocation("echo", &["a", "b"]);
        inv.kwargs.insert("sep".into(), ",".into());
        assert_eq!(reg.invoke(&inv).unwrap(), "a,b");
    }

    #[test]
    fn unknown_name_is_error() {
        let reg = builtin();
        let err = reg.invoke(&invocation("rm_rf", &[])).unwrap_err();
        assert!(err.to_string().contains("rm_rf"));
    }

    #[test]
    fn names_sorted() {
        let mut reg = builtin();
        reg.register("alpha", |_, _| Ok(String::new()));
        assert_eq!(reg.names(), vec!["alpha", "echo", "hostname"]);
        assert!(reg.contains("echo"));
    }
}
