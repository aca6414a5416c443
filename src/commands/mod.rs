//! One function per CLI subcommand.
//!
//! Every operation takes a [`Context`] and returns what it prints on stdout,
//! so the binary only has to write the string and map errors to exit codes.

mod ca;
mod lang;
mod req;
mod setup;
mod show;
mod sign;

pub use ca::{CaOptions, create_ca};
pub use lang::{LangOptions, lang};
pub use req::{ReqOptions, create_request};
pub use setup::setup;
pub use show::{ListFilter, cat, chk, info, ls};
pub use sign::{SignOptions, sign_request};

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use tracing::warn;

use crate::cert::params::Validity;
use crate::cert::{Certificate, CertificateWithPrivateKey};
use crate::config::Settings;
use crate::error::{CaError, Result};
use crate::key::KeyPair;
use crate::layout::{CA_NAME, CaLayout};
use crate::request::CertificateRequest;

/// Explicit state shared by the operations of one invocation.
#[derive(Debug, Clone)]
pub struct Context {
    pub layout: CaLayout,
}

impl Context {
    pub fn new(layout: CaLayout) -> Self {
        Self { layout }
    }

    /// Settings from `openssl.cfg`.
    pub fn settings(&self) -> Result<Settings> {
        Settings::load(&self.layout.config_file())
    }

    /// The CA certificate and key, checked to belong together.
    pub fn load_ca(&self) -> Result<CertificateWithPrivateKey> {
        let cert = load_certificate(&self.layout.cert_path(CA_NAME))?;
        let key = load_key(&self.layout.key_path(CA_NAME))?;
        CertificateWithPrivateKey::new(cert, key)
    }
}

pub(crate) fn read_existing(path: &Path, what: &'static str) -> Result<String> {
    if !path.exists() {
        return Err(CaError::NotFound {
            what,
            path: path.to_path_buf(),
        });
    }
    fs::read_to_string(path).map_err(CaError::io(path))
}

pub(crate) fn load_certificate(path: &Path) -> Result<Certificate> {
    Certificate::from_pem(&read_existing(path, "certificate")?)
}

pub(crate) fn load_request(path: &Path) -> Result<CertificateRequest> {
    CertificateRequest::from_pem(&read_existing(path, "certificate request")?)
}

pub(crate) fn load_key(path: &Path) -> Result<KeyPair> {
    KeyPair::import_from_pem(&read_existing(path, "private key")?)
}

pub(crate) fn ensure_absent(path: &Path, what: &'static str) -> Result<()> {
    if path.exists() {
        return Err(CaError::AlreadyExists {
            what,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Creates `path`, failing if it exists, and restricts it to `mode`.
pub(crate) fn write_new(path: &Path, contents: &str, mode: Option<u32>) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(CaError::io(path))?;
    file.write_all(contents.as_bytes())
        .map_err(CaError::io(path))?;
    if let Some(mode) = mode {
        set_mode(path, mode);
    }
    Ok(())
}

/// Private keys are written once, readable by the owner only.
pub(crate) fn write_private_key(path: &Path, key: &KeyPair) -> Result<()> {
    write_new(path, &key.to_pkcs8_pem()?, Some(0o400))
}

/// Best-effort permission change; failures are logged.
#[cfg(unix)]
pub(crate) fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(err) = fs::set_permissions(path, fs::Permissions::from_mode(mode)) {
        warn!(path = %path.display(), mode = %format!("{mode:o}"), %err, "could not change permissions");
    }
}

#[cfg(not(unix))]
pub(crate) fn set_mode(path: &Path, mode: u32) {
    warn!(path = %path.display(), mode = %format!("{mode:o}"), "file modes are not supported on this platform");
}

/// `years` × 365 days, or the configured default when not given.
pub(crate) fn validity_for(years: Option<u32>, default_days: u32) -> Result<Validity> {
    match years {
        Some(0) => Err(CaError::Usage("years must be at least 1".into())),
        Some(years) => Validity::for_years(years),
        None => Validity::for_days(i64::from(default_days)),
    }
}

/// Removes a consumed file; a failure leaves a stale file behind and is logged.
pub(crate) fn remove_consumed(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        warn!(path = %path.display(), %err, "could not remove consumed file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_for() {
        let validity = validity_for(Some(2), 365).unwrap();
        assert_eq!(
            validity.not_after - validity.not_before,
            time::Duration::days(730)
        );
        let validity = validity_for(None, 30).unwrap();
        assert_eq!(
            validity.not_after - validity.not_before,
            time::Duration::days(30)
        );
        assert_eq!(validity_for(Some(0), 365).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn test_write_new_refuses_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.txt");
        write_new(&path, "one", None).unwrap();
        assert!(write_new(&path, "two", None).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "one");
        assert!(ensure_absent(&path, "file").is_err());
    }
}
