//! Error type shared by the library and the CLI.

use std::path::PathBuf;

use thiserror::Error;

/// Represents errors that can occur while managing the local certificate authority.
///
/// Every error is terminal for the running command. [`CaError::exit_code`]
/// separates usage mistakes from operation failures.
#[derive(Debug, Error)]
pub enum CaError {
    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Bad flags or arguments on the command line.
    #[error("{0}")]
    Usage(String),

    /// Error during key generation.
    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    /// Error related to certificate operations.
    #[error("Certificate error: {0}")]
    CertificateError(String),

    /// A signature or validity check did not pass.
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// Error from RSA operations.
    #[error("RSA error: {0}")]
    RsaError(String),

    /// Error from elliptic curve operations.
    #[error("EC error: {0}")]
    EcError(String),

    /// A file or directory that must not exist is already there.
    #[error("{what} already exists: {path:?}")]
    AlreadyExists { what: &'static str, path: PathBuf },

    /// A file or directory that is required is missing.
    #[error("{what} not found: {path:?}")]
    NotFound { what: &'static str, path: PathBuf },

    /// Malformed configuration file.
    #[error("Configuration error in {path:?}: {message}")]
    ConfigError { path: PathBuf, message: String },

    /// Filesystem failure.
    #[error("{path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CaError {
    /// Process exit status for this error: 2 for usage errors, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        match self {
            CaError::Usage(_) => 2,
            _ => 1,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> CaError {
        let path = path.into();
        move |source| CaError::Io { path, source }
    }
}

/// A specialized Result type for CA operations.
pub type Result<T> = std::result::Result<T, CaError>;

impl From<der::Error> for CaError {
    /// Converts a `der::Error` into a `CaError`.
    fn from(err: der::Error) -> Self {
        CaError::DecodingError(err.to_string())
    }
}

impl From<rsa::Error> for CaError {
    fn from(err: rsa::Error) -> Self {
        CaError::RsaError(err.to_string())
    }
}

impl From<rsa::pkcs1::Error> for CaError {
    fn from(err: rsa::pkcs1::Error) -> Self {
        CaError::RsaError(err.to_string())
    }
}

impl From<pkcs8::Error> for CaError {
    fn from(err: pkcs8::Error) -> Self {
        CaError::DecodingError(err.to_string())
    }
}

impl From<spki::Error> for CaError {
    fn from(err: spki::Error) -> Self {
        CaError::DecodingError(err.to_string())
    }
}

impl From<p256::elliptic_curve::Error> for CaError {
    fn from(err: p256::elliptic_curve::Error) -> Self {
        CaError::EcError(err.to_string())
    }
}

impl From<pem::PemError> for CaError {
    fn from(err: pem::PemError) -> Self {
        CaError::DecodingError(err.to_string())
    }
}

impl From<time::error::Format> for CaError {
    fn from(err: time::error::Format) -> Self {
        CaError::EncodingError(err.to_string())
    }
}
