//! On-disk layout of a CA home directory.
//!
//! ```text
//! <root>/
//!   certs/<name>.crt     issued certificates
//!   private/<name>.key   private keys (0710)
//!   newcerts/<SERIAL>.pem
//!   crl/
//!   index.txt  serial  openssl.cfg
//!   <name>.csr  <name>.cfg   pending requests and their server config
//! ```

use std::fs;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use crate::error::{CaError, Result};

/// Reserved name of the CA certificate and key.
pub const CA_NAME: &str = "ca";

pub const EXT_CERT: &str = "crt";
pub const EXT_KEY: &str = "key";
pub const EXT_REQUEST: &str = "csr";
pub const EXT_CONFIG: &str = "cfg";
pub const EXT_PEM: &str = "pem";

const DIR_CERTS: &str = "certs";
const DIR_PRIVATE: &str = "private";
const DIR_NEWCERTS: &str = "newcerts";
const DIR_CRL: &str = "crl";
const FILE_INDEX: &str = "index.txt";
const FILE_SERIAL: &str = "serial";
const FILE_CONFIG: &str = "openssl.cfg";

/// The kind of file a name or path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Cert,
    Request,
    Key,
}

impl FileKind {
    pub fn extension(&self) -> &'static str {
        match self {
            FileKind::Cert => EXT_CERT,
            FileKind::Request => EXT_REQUEST,
            FileKind::Key => EXT_KEY,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            FileKind::Cert => "certificate",
            FileKind::Request => "certificate request",
            FileKind::Key => "private key",
        }
    }
}

/// Paths of a CA rooted at one home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaLayout {
    root: PathBuf,
}

impl CaLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$HOME/.cert`.
    pub fn default_root() -> Result<PathBuf> {
        std::env::var_os("HOME")
            .filter(|home| !home.is_empty())
            .map(|home| PathBuf::from(home).join(".cert"))
            .ok_or_else(|| {
                CaError::Usage("HOME is not set; pass --home or set LOCALCA_HOME".into())
            })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn certs_dir(&self) -> PathBuf {
        self.root.join(DIR_CERTS)
    }

    pub fn private_dir(&self) -> PathBuf {
        self.root.join(DIR_PRIVATE)
    }

    pub fn newcerts_dir(&self) -> PathBuf {
        self.root.join(DIR_NEWCERTS)
    }

    pub fn crl_dir(&self) -> PathBuf {
        self.root.join(DIR_CRL)
    }

    pub fn index_file(&self) -> PathBuf {
        self.root.join(FILE_INDEX)
    }

    pub fn serial_file(&self) -> PathBuf {
        self.root.join(FILE_SERIAL)
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(FILE_CONFIG)
    }

    pub fn cert_path(&self, name: &str) -> PathBuf {
        self.certs_dir().join(format!("{name}.{EXT_CERT}"))
    }

    pub fn key_path(&self, name: &str) -> PathBuf {
        self.private_dir().join(format!("{name}.{EXT_KEY}"))
    }

    pub fn request_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{EXT_REQUEST}"))
    }

    /// Per-server configuration written by `req --host`.
    pub fn server_config_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{EXT_CONFIG}"))
    }

    /// Copy of an issued certificate, named by its serial.
    pub fn newcert_path(&self, serial_hex: &str) -> PathBuf {
        self.newcerts_dir().join(format!("{serial_hex}.{EXT_PEM}"))
    }

    pub fn path_for(&self, kind: FileKind, name: &str) -> PathBuf {
        match kind {
            FileKind::Cert => self.cert_path(name),
            FileKind::Request => self.request_path(name),
            FileKind::Key => self.key_path(name),
        }
    }

    /// Resolves a FILE argument: paths starting with `.` or containing a
    /// separator are used as given, anything else is a conventional name.
    pub fn resolve(&self, kind: FileKind, arg: &str) -> Result<PathBuf> {
        if is_explicit_path(arg) {
            return Ok(PathBuf::from(arg));
        }
        validate_name(arg)?;
        Ok(self.path_for(kind, arg))
    }

    /// Fails unless `setup` has created the structure.
    pub fn ensure_initialized(&self) -> Result<()> {
        for path in [self.root.clone(), self.certs_dir(), self.private_dir()] {
            if !path.is_dir() {
                return Err(CaError::NotFound {
                    what: "CA directory structure",
                    path,
                });
            }
        }
        Ok(())
    }

    /// Base names of the files of `kind`, sorted.
    pub fn list(&self, kind: FileKind) -> Result<Vec<String>> {
        let dir = match kind {
            FileKind::Cert => self.certs_dir(),
            FileKind::Request => self.root.clone(),
            FileKind::Key => self.private_dir(),
        };
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir).map_err(CaError::io(&dir))? {
            let path = entry.map_err(CaError::io(&dir))?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|ext| ext.to_str()) != Some(kind.extension()) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn is_explicit_path(arg: &str) -> bool {
    arg.starts_with('.') || arg.contains('/') || arg.contains(MAIN_SEPARATOR)
}

/// A certificate name must be non-empty, must not start with `.` and must
/// not contain a path separator.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CaError::Usage("name must not be empty".into()));
    }
    if is_explicit_path(name) {
        return Err(CaError::Usage(format!(
            "{name:?}: name must not start with '.' or contain a path separator"
        )));
    }
    Ok(())
}
