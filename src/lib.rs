//! # localca - A Local Certificate Authority
//!
//! localca runs a small certificate authority out of one home directory
//! (`~/.cert` by default) for development and intranet TLS. The directory is
//! laid out the way `openssl ca` expects it, so the same CA can be driven by
//! either tool. Everything is built with the RustCrypto crates.
//!
//! ## Supported Key Types
//!
//! - **RSA**: 2048 bits or more, in multiples of 1024
//! - **ECDSA**: P-256 and P-384 curves
//!
//! ## Key Features
//!
//! - **Self-signed root**: one CA certificate and key per home directory
//! - **Requests and signing**: keys and PKCS#10 requests with IP and DNS
//!   subject alternative names, signed into server/client certificates
//! - **Ledger**: `serial`, `index.txt` and `newcerts/` kept in OpenSSL format
//! - **Inspection**: text dumps, `openssl x509`-style metadata and subject
//!   hashes, verification of certificates, requests and keys
//! - **Code emission**: Rust or Go source files embedding the CA and a
//!   server certificate for TLS setup without files at run time
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use localca::commands::{self, CaOptions, Context, ReqOptions, SignOptions};
//! use localca::layout::CaLayout;
//!
//! # fn main() -> Result<(), localca::error::CaError> {
//! let ctx = Context::new(CaLayout::new("/tmp/ca-home"));
//! commands::setup(&ctx, Some("dev.local"))?;
//! commands::create_ca(&ctx, &CaOptions::builder().build())?;
//!
//! let request = ReqOptions::builder()
//!     .name("web".to_string())
//!     .hosts("127.0.0.1,web.dev.local".parse()?)
//!     .build();
//! commands::create_request(&ctx, &request)?;
//! commands::sign_request(&ctx, &SignOptions::builder().name("web".to_string()).build())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every failure is a [`error::CaError`]; usage errors map to exit code 2,
//! everything else to 1:
//!
//! ```rust
//! use localca::key::RsaKeySize;
//!
//! let err = "3000".parse::<RsaKeySize>().unwrap_err();
//! assert_eq!(err.to_string(), "key size must be multiple of 1024");
//! assert_eq!(err.exit_code(), 2);
//! ```
//!
//! ## Module Organization
//!
//! - [`layout`]: Paths inside the CA home directory
//! - [`config`]: The rendered `openssl.cfg` and the settings read back from it
//! - [`ledger`]: Serial counter, `index.txt` and `newcerts/`
//! - [`key`]: Key generation, import/export and signatures
//! - [`cert`]: Certificates, their parameters and extensions
//! - [`request`]: PKCS#10 certificate requests
//! - [`issuer`]: Certificate issuing
//! - [`hosts`]: IP/DNS host lists for subject alternative names
//! - [`inspect`]: Text dumps, metadata and checks
//! - [`emit`]: Source file generation
//! - [`commands`]: One function per CLI subcommand
//! - [`error`]: Error type and exit codes

pub mod cert;
pub mod commands;
pub mod config;
pub mod emit;
pub mod error;
pub mod hosts;
pub mod inspect;
pub mod issuer;
pub mod key;
pub mod layout;
pub mod ledger;
mod pem_utils;
pub mod request;
pub mod tbs_certificate;
