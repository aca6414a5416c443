//! Source files that embed the CA certificate and a server's certificate and
//! key as byte-array literals, so a program can set up TLS without reading
//! files at run time.

use std::fmt;
use std::str::FromStr;

use time::OffsetDateTime;
use time::macros::format_description;

use crate::error::{CaError, Result};

/// Bytes per line in the generated literals.
const BYTES_PER_LINE: usize = 18;

/// Target language of the generated files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lang {
    #[default]
    Rust,
    Go,
}

impl Lang {
    pub fn server_file_name(&self) -> &'static str {
        match self {
            Lang::Rust => "server_tls.rs",
            Lang::Go => "server_tls.go",
        }
    }

    pub fn client_file_name(&self) -> &'static str {
        match self {
            Lang::Rust => "client_tls.rs",
            Lang::Go => "client_tls.go",
        }
    }

    /// A byte-slice literal, eighteen values per line.
    pub fn byte_block(&self, bytes: &[u8]) -> String {
        let (open, indent, close) = match self {
            Lang::Rust => ("&[\n", "    ", "]"),
            Lang::Go => ("[]byte{\n", "\t\t", "\t}"),
        };
        let mut out = String::from(open);
        for chunk in bytes.chunks(BYTES_PER_LINE) {
            let values: Vec<String> = chunk.iter().map(u8::to_string).collect();
            out.push_str(indent);
            out.push_str(&values.join(", "));
            out.push_str(",\n");
        }
        out.push_str(close);
        out
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Lang::Rust => "rust",
            Lang::Go => "go",
        })
    }
}

impl FromStr for Lang {
    type Err = CaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rust" | "rs" => Ok(Lang::Rust),
            "go" => Ok(Lang::Go),
            other => Err(CaError::Usage(format!(
                "unknown language {other:?}; expected rust or go"
            ))),
        }
    }
}

/// Everything the templates need.
#[derive(Debug, Clone)]
pub struct EmitData {
    pub system: String,
    pub arch: String,
    pub version: String,
    pub date: String,
    pub ca_cert: Vec<u8>,
    /// End date of the server certificate, e.g. `notAfter=...`.
    pub valid_until: String,
    pub cert: Vec<u8>,
    pub key: Vec<u8>,
}

impl EmitData {
    /// Header fields for this build and the current time.
    pub fn for_this_build(ca_cert: Vec<u8>) -> Result<Self> {
        Ok(Self {
            system: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            version: format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            date: rfc822(OffsetDateTime::now_utc())?,
            ca_cert,
            valid_until: String::new(),
            cert: Vec::new(),
            key: Vec::new(),
        })
    }
}

fn rfc822(at: OffsetDateTime) -> Result<String> {
    Ok(at.format(format_description!(
        "[day] [month repr:short] [year repr:last_two] [hour]:[minute] UTC"
    ))?)
}

const RUST_SERVER: &str = r#"// MACHINE GENERATED BY {{version}}
// From {{system}} ({{arch}}), on {{date}}
// Server valid for: {{valid_until}}

use std::sync::Arc;

pub const CA_CERT_BLOCK: &[u8] = {{ca_cert}};

pub const CERT_BLOCK: &[u8] = {{cert}};

pub const KEY_BLOCK: &[u8] = {{key}};

/// TLS configuration for the server certificate embedded above.
pub fn server_tls_config() -> Result<Arc<rustls::ServerConfig>, Box<dyn std::error::Error>> {
    let certs = rustls_pemfile::certs(&mut &CERT_BLOCK[..]).collect::<Result<Vec<_>, _>>()?;
    let key = rustls_pemfile::private_key(&mut &KEY_BLOCK[..])?
        .ok_or("server: no private key in KEY_BLOCK")?;

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(Arc::new(config))
}
"#;

const RUST_CLIENT: &str = r#"// MACHINE GENERATED BY {{version}}
// From {{system}} ({{arch}}), on {{date}}

use std::sync::Arc;

pub const CA_CERT_BLOCK: &[u8] = {{ca_cert}};

/// TLS configuration trusting only the CA embedded above.
pub fn client_tls_config() -> Result<Arc<rustls::ClientConfig>, Box<dyn std::error::Error>> {
    let mut roots = rustls::RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut &CA_CERT_BLOCK[..]) {
        roots.add(cert?)?;
    }

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(config))
}
"#;

const GO_SERVER: &str = r#"// MACHINE GENERATED BY {{version}}
// From {{system}} ({{arch}}), on {{date}}
// Server valid for: {{valid_until}}

package main

import (
	"crypto/tls"
	"log"
)

var ServerTLSConfig *tls.Config

func init() {
	CERT_BLOCK := {{cert}}

	KEY_BLOCK := {{key}}

	cert, err := tls.X509KeyPair(CERT_BLOCK, KEY_BLOCK)
	if err != nil {
		log.Fatal("server: load keys: ", err)
	}

	ServerTLSConfig = &tls.Config{
		Certificates: []tls.Certificate{cert},
	}
}
"#;

const GO_CLIENT: &str = r#"// MACHINE GENERATED BY {{version}}
// From {{system}} ({{arch}}), on {{date}}

package main

import (
	"crypto/tls"
	"crypto/x509"
	"log"
)

var ClientTLSConfig *tls.Config

func init() {
	CA_CERT_BLOCK := {{ca_cert}}

	certPool := x509.NewCertPool()
	if ok := certPool.AppendCertsFromPEM(CA_CERT_BLOCK); !ok {
		log.Fatal("client: CertPool: CA certificate not valid")
	}

	ClientTLSConfig = &tls.Config{
		RootCAs: certPool,
	}
}
"#;

/// Server file embedding the CA certificate, the certificate and its key.
pub fn render_server(lang: Lang, data: &EmitData) -> String {
    let template = match lang {
        Lang::Rust => RUST_SERVER,
        Lang::Go => GO_SERVER,
    };
    fill(template, lang, data)
}

/// Client file trusting the embedded CA certificate.
pub fn render_client(lang: Lang, data: &EmitData) -> String {
    let template = match lang {
        Lang::Rust => RUST_CLIENT,
        Lang::Go => GO_CLIENT,
    };
    fill(template, lang, data)
}

fn fill(template: &str, lang: Lang, data: &EmitData) -> String {
    template
        .replace("{{version}}", &data.version)
        .replace("{{system}}", &data.system)
        .replace("{{arch}}", &data.arch)
        .replace("{{date}}", &data.date)
        .replace("{{valid_until}}", &data.valid_until)
        .replace("{{ca_cert}}", &lang.byte_block(&data.ca_cert))
        .replace("{{cert}}", &lang.byte_block(&data.cert))
        .replace("{{key}}", &lang.byte_block(&data.key))
}
