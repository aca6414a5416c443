//! Host names and addresses for the subject alternative names of a server certificate.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{CaError, Result};

static DNS_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\*\.)?[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("DNS name pattern is valid")
});

/// A single subject alternative name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Host {
    Ip(IpAddr),
    Dns(String),
}

impl Host {
    /// Classifies one token as an IP literal or a dotted DNS name.
    pub fn parse(token: &str) -> Result<Self> {
        let token = token.trim();
        if let Ok(ip) = token.parse::<IpAddr>() {
            return Ok(Host::Ip(ip));
        }
        if token.contains('.') && DNS_NAME.is_match(token) {
            return Ok(Host::Dns(token.to_ascii_lowercase()));
        }
        Err(CaError::Usage(format!("{token:?}: must be an IP or DNS")))
    }
}

impl fmt::Display for Host {
    /// Configuration-file form: `IP:10.0.0.1` or `DNS:example.com`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Ip(ip) => write!(f, "IP:{ip}"),
            Host::Dns(dns) => write!(f, "DNS:{dns}"),
        }
    }
}

/// Comma-separated list of hosts as given on the command line,
/// e.g. `10.0.0.1,example.com`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostList(pub Vec<Host>);

impl HostList {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn dns_names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter_map(|host| match host {
            Host::Dns(dns) => Some(dns.as_str()),
            Host::Ip(_) => None,
        })
    }

    /// Parses the value of a `subjectAltName` configuration line,
    /// e.g. `IP:10.0.0.1, DNS:example.com`.
    pub fn from_config_value(value: &str) -> Result<Self> {
        let mut hosts = Vec::new();
        for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (kind, name) = entry
                .split_once(':')
                .ok_or_else(|| CaError::InvalidInput(format!("malformed alt name {entry:?}")))?;
            let host = match kind.trim() {
                "IP" => Host::Ip(name.trim().parse().map_err(|_| {
                    CaError::InvalidInput(format!("malformed IP address {name:?}"))
                })?),
                "DNS" => Host::Dns(name.trim().to_string()),
                other => {
                    return Err(CaError::InvalidInput(format!(
                        "unsupported alt name type {other:?}"
                    )));
                }
            };
            hosts.push(host);
        }
        Ok(HostList(hosts))
    }
}

impl FromStr for HostList {
    type Err = CaError;

    fn from_str(s: &str) -> Result<Self> {
        s.split(',').map(Host::parse).collect::<Result<Vec<_>>>().map(HostList)
    }
}

impl fmt::Display for HostList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(Host::to_string).collect();
        f.write_str(&parts.join(", "))
    }
}
