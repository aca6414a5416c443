//! The CA configuration file.
//!
//! `setup` renders [`TEMPLATE`] into `openssl.cfg`; `req --host` renders it
//! again into a per-server `<name>.cfg` that carries the subject alternative
//! names. Both files use OpenSSL's configuration syntax so that the
//! directory stays usable with the `openssl ca` tooling, and both are read
//! back into [`Settings`].

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::cert::params::DistinguishedName;
use crate::error::{CaError, Result};
use crate::hosts::HostList;
use crate::key::RsaKeySize;

/// Configuration template. `{{root_dir}}`, `{{host_name}}` and
/// `{{subject_alt_name}}` are substituted when rendering.
pub const TEMPLATE: &str = r#"# Local certificate authority.

HOME = {{root_dir}}

[ ca ]
default_ca = CA_default

[ CA_default ]
dir = {{root_dir}}
certs = $dir/certs
crl_dir = $dir/crl
new_certs_dir = $dir/newcerts
database = $dir/index.txt
serial = $dir/serial
certificate = $dir/certs/ca.crt
private_key = $dir/private/ca.key
default_days = 365
default_crl_days = 30
default_md = sha256
policy = policy_anything
copy_extensions = copy

[ policy_anything ]
countryName = optional
stateOrProvinceName = optional
localityName = optional
organizationName = optional
organizationalUnitName = optional
commonName = supplied
emailAddress = optional

[ req ]
default_bits = 2048
default_md = sha256
prompt = no
string_mask = utf8only
distinguished_name = req_distinguished_name
req_extensions = v3_req
x509_extensions = v3_ca

[ req_distinguished_name ]
organizationName = Local CA
commonName = {{host_name}}

[ v3_req ]
basicConstraints = CA:FALSE
keyUsage = digitalSignature, keyEncipherment
extendedKeyUsage = serverAuth, clientAuth
{{subject_alt_name}}

[ v3_ca ]
subjectKeyIdentifier = hash
authorityKeyIdentifier = keyid:always
basicConstraints = critical, CA:TRUE
keyUsage = critical, keyCertSign, cRLSign
"#;

/// Renders [`TEMPLATE`]. An empty host list leaves out the
/// `subjectAltName` line.
pub fn render(root_dir: &Path, host_name: &str, hosts: &HostList) -> String {
    let subject_alt_name = if hosts.is_empty() {
        String::new()
    } else {
        format!("subjectAltName = {hosts}")
    };
    TEMPLATE
        .replace("{{root_dir}}", &root_dir.display().to_string())
        .replace("{{host_name}}", host_name)
        .replace("{{subject_alt_name}}", &subject_alt_name)
}

/// Name of this machine: `/etc/hostname`, then `$HOSTNAME`, then `localhost`.
pub fn machine_host_name() -> String {
    fs::read_to_string("/etc/hostname")
        .ok()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .or_else(|| {
            std::env::var("HOSTNAME")
                .ok()
                .filter(|name| !name.trim().is_empty())
        })
        .unwrap_or_else(|| "localhost".to_string())
}

/// Sections of an OpenSSL-style configuration file.
///
/// Keys before the first section header belong to the `""` section.
/// Values are not expanded.
#[derive(Debug, Default)]
pub struct ConfigFile {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl ConfigFile {
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let mut sections: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        let mut current = String::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(header) = line.strip_prefix('[') {
                let name = header
                    .strip_suffix(']')
                    .ok_or_else(|| format!("line {}: unterminated section header", number + 1))?;
                current = name.trim().to_string();
                sections.entry(current.clone()).or_default();
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| format!("line {}: expected `key = value`", number + 1))?;
            sections
                .entry(current.clone())
                .or_default()
                .insert(key.trim().to_string(), value.trim().to_string());
        }
        Ok(Self { sections })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(CaError::io(path))?;
        Self::parse(&text).map_err(|message| CaError::ConfigError {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|keys| keys.get(key))
            .map(String::as_str)
    }
}

/// Typed view of a rendered configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Subject used for requests; the CA overrides the common name.
    pub distinguished_name: DistinguishedName,
    pub default_bits: RsaKeySize,
    pub default_days: u32,
    /// From `[ v3_req ] subjectAltName`; empty in `openssl.cfg`.
    pub subject_alt_names: HostList,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let file = ConfigFile::load(path)?;
        Self::from_config(&file).map_err(|message| CaError::ConfigError {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_config(file: &ConfigFile) -> std::result::Result<Self, String> {
        let dn = |key: &str| {
            file.get("req_distinguished_name", key)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        let distinguished_name = DistinguishedName {
            common_name: dn("commonName").unwrap_or_default(),
            country: dn("countryName"),
            state: dn("stateOrProvinceName"),
            locality: dn("localityName"),
            organization: dn("organizationName"),
            organization_unit: dn("organizationalUnitName"),
        };

        let default_bits = match file.get("req", "default_bits") {
            Some(bits) => bits.parse::<RsaKeySize>().map_err(|e| e.to_string())?,
            None => RsaKeySize::default(),
        };
        let default_days = match file.get("CA_default", "default_days") {
            Some(days) => days
                .parse::<u32>()
                .map_err(|e| format!("default_days {days:?}: {e}"))?,
            None => 365,
        };
        let subject_alt_names = match file.get("v3_req", "subjectAltName") {
            Some(value) => HostList::from_config_value(value).map_err(|e| e.to_string())?,
            None => HostList::default(),
        };

        Ok(Self {
            distinguished_name,
            default_bits,
            default_days,
            subject_alt_names,
        })
    }
}
