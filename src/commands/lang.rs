use std::path::PathBuf;

use bon::Builder;
use tracing::info;

use super::{Context, ensure_absent, read_existing, write_new};
use crate::cert::Certificate;
use crate::emit::{self, EmitData, Lang};
use crate::error::{CaError, Result};
use crate::inspect::openssl_time;
use crate::key::KeyPair;
use crate::layout::{CA_NAME, FileKind, validate_name};

/// Flags of `lang`.
#[derive(Debug, Clone, Builder)]
pub struct LangOptions {
    #[builder(default = CA_NAME.to_string())]
    pub ca: String,
    /// Embed the certificate and key of this name in a server file.
    pub server: Option<String>,
    /// Also emit a client file trusting the CA.
    #[builder(default)]
    pub client: bool,
    #[builder(default)]
    pub lang: Lang,
    #[builder(default = PathBuf::from("."))]
    pub out_dir: PathBuf,
}

/// Writes the server and/or client source files into `out_dir`.
///
/// Nothing is written unless every output is absent.
pub fn lang(ctx: &Context, opts: &LangOptions) -> Result<String> {
    if opts.server.is_none() && !opts.client {
        return Err(CaError::Usage(
            "nothing to generate; give --server NAME and/or --client".into(),
        ));
    }

    let ca_path = ctx.layout.resolve(FileKind::Cert, &opts.ca)?;
    let ca_pem = read_existing(&ca_path, "CA certificate")?;
    Certificate::from_pem(&ca_pem)?;
    let mut data = EmitData::for_this_build(ca_pem.into_bytes())?;

    let mut outputs: Vec<(PathBuf, String, Option<u32>)> = Vec::new();
    if let Some(name) = &opts.server {
        validate_name(name)?;
        let cert_pem = read_existing(&ctx.layout.cert_path(name), "certificate")?;
        let key_pem = read_existing(&ctx.layout.key_path(name), "private key")?;
        let cert = Certificate::from_pem(&cert_pem)?;
        KeyPair::import_from_pem(&key_pem)?;

        data.valid_until = format!("notAfter={}", openssl_time(cert.validity().not_after)?);
        data.cert = cert_pem.into_bytes();
        data.key = key_pem.into_bytes();

        let path = opts.out_dir.join(opts.lang.server_file_name());
        outputs.push((path, emit::render_server(opts.lang, &data), Some(0o600)));
    }
    if opts.client {
        let path = opts.out_dir.join(opts.lang.client_file_name());
        outputs.push((path, emit::render_client(opts.lang, &data), None));
    }

    for (path, _, _) in &outputs {
        ensure_absent(path, "output file")?;
    }
    let mut out = String::from("\n== Generated\n");
    for (path, contents, mode) in &outputs {
        write_new(path, contents, *mode)?;
        info!(path = %path.display(), lang = %opts.lang, "source file generated");
        out.push_str(&format!("- {path:?}\n"));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::commands::{CaOptions, ReqOptions, create_ca, create_request, setup};
    use crate::key::KeyAlgorithm;
    use crate::layout::CaLayout;

    fn with_server() -> (tempfile::TempDir, Context) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(CaLayout::new(dir.path().join("home")));
        setup(&ctx, Some("box.example")).unwrap();
        create_ca(
            &ctx,
            &CaOptions::builder().key_type(KeyAlgorithm::EcdsaP256).build(),
        )
        .unwrap();
        create_request(
            &ctx,
            &ReqOptions::builder()
                .name("web".to_string())
                .hosts("web.example.com".parse().unwrap())
                .key_type(KeyAlgorithm::EcdsaP256)
                .sign(true)
                .build(),
        )
        .unwrap();
        (dir, ctx)
    }

    #[test]
    fn test_lang_writes_server_and_client() {
        let (dir, ctx) = with_server();
        let out_dir = dir.path().join("out");
        fs::create_dir(&out_dir).unwrap();
        let opts = LangOptions::builder()
            .server("web".to_string())
            .client(true)
            .out_dir(out_dir.clone())
            .build();
        lang(&ctx, &opts).unwrap();

        let server = fs::read_to_string(out_dir.join("server_tls.rs")).unwrap();
        // "-----BEGIN" starts every embedded block.
        assert!(server.contains("    45, 45, 45, 45, 45, 66, 69, 71, 73, 78,"));
        assert!(server.contains("Server valid for: notAfter="));
        let client = fs::read_to_string(out_dir.join("client_tls.rs")).unwrap();
        assert!(client.contains("client_tls_config"));

        let err = lang(&ctx, &opts).unwrap_err();
        assert!(matches!(err, CaError::AlreadyExists { .. }));
    }

    #[test]
    fn test_lang_go_client_only() {
        let (dir, ctx) = with_server();
        let opts = LangOptions::builder()
            .client(true)
            .lang(Lang::Go)
            .out_dir(dir.path().to_path_buf())
            .build();
        lang(&ctx, &opts).unwrap();
        assert!(dir.path().join("client_tls.go").exists());
        assert!(!dir.path().join("server_tls.go").exists());
    }

    #[test]
    fn test_lang_needs_a_target() {
        let (_dir, ctx) = with_server();
        let err = lang(&ctx, &LangOptions::builder().build()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
