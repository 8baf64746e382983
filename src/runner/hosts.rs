//! Host-restriction predicate.
//!
//! An allow-list admits the current machine if any entry matches its OS
//! hostname, short name, fully-qualified name (as the resolver reports it) or
//! one of its resolved addresses. An empty allow-list admits every host.

use std::net::{IpAddr, ToSocketAddrs};

use serde::Serialize;

/// Names and addresses the current machine answers to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostIdentity {
    /// Hostname as reported by the OS.
    pub hostname: String,
    pub short_name: String,
    pub fqdn: String,
    pub addresses: Vec<IpAddr>,
}

impl HostIdentity {
    /// Build an identity without consulting the resolver; `name` doubles as
    /// the fqdn.
    pub fn from_hostname(name: &str, addresses: Vec<IpAddr>) -> Self {
        Self::new(name, name, addresses)
    }

    pub fn new(hostname: &str, fqdn: &str, addresses: Vec<IpAddr>) -> Self {
        let hostname = hostname.trim().to_string();
        let fqdn = fqdn.trim().to_string();
        let short_name = hostname.split('.').next().unwrap_or_default().to_string();
        Self {
            hostname,
            short_name,
            fqdn,
            addresses,
        }
    }

    /// Query the OS hostname, resolve it, then reverse-resolve the addresses
    /// for the canonical name. Lookup failures fall back to the OS hostname.
    pub fn detect() -> Self {
        let name = match hostname::get() {
            Ok(h) => h.to_string_lossy().to_string(),
            Err(e) => {
                tracing::warn!("could not read hostname: {e}");
                String::new()
            }
        };
        let addresses = resolve(&name);
        let fqdn = canonical_name(&name, &addresses);
        let identity = Self::new(&name, &fqdn, addresses);
        tracing::debug!(
            hostname = %identity.hostname,
            fqdn = %identity.fqdn,
            addresses = identity.addresses.len(),
            "detected host identity"
        );
        identity
    }

    /// Display name used in skip reports.
    pub fn name(&self) -> &str {
        if self.fqdn.is_empty() {
            &self.short_name
        } else {
            &self.fqdn
        }
    }

    /// Whether `allowed` admits this host.
    pub fn is_allowed(&self, allowed: &[String]) -> bool {
        if allowed.is_empty() {
            return true;
        }
        allowed.iter().any(|entry| self.matches(entry))
    }

    fn matches(&self, entry: &str) -> bool {
        let entry = entry.trim();
        if entry.is_empty() {
            return false;
        }
        if [&self.hostname, &self.short_name, &self.fqdn]
            .iter()
            .any(|name| !name.is_empty() && entry.eq_ignore_ascii_case(name))
        {
            return true;
        }
        entry
            .parse::<IpAddr>()
            .map(|ip| self.addresses.contains(&ip))
            .unwrap_or(false)
    }
}

fn resolve(name: &str) -> Vec<IpAddr> {
    if name.is_empty() {
        return Vec::new();
    }
    match (name, 0u16).to_socket_addrs() {
        Ok(addrs) => {
            let mut ips: Vec<IpAddr> = Vec::new();
            for addr in addrs {
                if !ips.contains(&addr.ip()) {
                    ips.push(addr.ip());
                }
            }
            ips
        }
        Err(e) => {
            tracing::debug!("could not resolve '{name}': {e}");
            Vec::new()
        }
    }
}

/// Reverse names of `addresses`, in resolver order, skipping numeric answers.
fn reverse_names(addresses: &[IpAddr]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for addr in addresses {
        match dns_lookup::lookup_addr(addr) {
            Ok(name) if name.parse::<IpAddr>().is_err() => {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("no reverse name for {addr}: {e}"),
        }
    }
    names
}

fn canonical_name(hostname: &str, addresses: &[IpAddr]) -> String {
    pick_fqdn(hostname, &reverse_names(addresses))
}

/// First dotted candidate, else the first candidate, else `hostname`.
fn pick_fqdn(hostname: &str, candidates: &[String]) -> String {
    candidates
        .iter()
        .find(|c| c.contains('.'))
        .or_else(|| candidates.first())
        .cloned()
        .unwrap_or_else(|| hostname.to_string())
}
