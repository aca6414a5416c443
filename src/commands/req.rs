use bon::Builder;
use tracing::{debug, info};

use super::{
    Context, SignOptions, ensure_absent, sign_request, validity_for, write_new, write_private_key,
};
use crate::cert::extensions::SubjectAltName;
use crate::cert::params::{CertificationRequestInfo, ExtensionParam};
use crate::config;
use crate::error::{CaError, Result};
use crate::hosts::{Host, HostList};
use crate::key::{KeyAlgorithm, KeyPair, RsaKeySize};
use crate::layout::{CA_NAME, validate_name};
use crate::request::CertificateRequest;

/// Flags of `req`.
#[derive(Debug, Clone, Builder)]
pub struct ReqOptions {
    pub name: String,
    #[builder(default)]
    pub hosts: HostList,
    #[builder(default)]
    pub key_type: KeyAlgorithm,
    pub rsa_size: Option<RsaKeySize>,
    /// Defaults to the first DNS host, then to the name.
    pub common_name: Option<String>,
    /// Sign the request right away.
    #[builder(default)]
    pub sign: bool,
    /// Only used with `sign`.
    pub years: Option<u32>,
}

impl ReqOptions {
    fn subject_common_name(&self) -> String {
        self.common_name
            .clone()
            .or_else(|| self.hosts.dns_names().next().map(str::to_string))
            .unwrap_or_else(|| self.name.clone())
    }
}

/// Generates a key and a certificate request for `name`.
///
/// With hosts, the request carries them as subject alternative names and a
/// per-server configuration is written next to it.
pub fn create_request(ctx: &Context, opts: &ReqOptions) -> Result<String> {
    let layout = &ctx.layout;
    layout.ensure_initialized()?;
    check_server_name(&opts.name)?;

    let request_path = layout.request_path(&opts.name);
    let key_path = layout.key_path(&opts.name);
    let server_config_path = layout.server_config_path(&opts.name);
    ensure_absent(&request_path, "certificate request")?;
    ensure_absent(&key_path, "private key")?;
    if !opts.hosts.is_empty() {
        ensure_absent(&server_config_path, "server configuration")?;
    }
    let settings = ctx.settings()?;
    if opts.sign {
        // Nothing is written unless signing can go ahead.
        ensure_absent(&layout.cert_path(&opts.name), "certificate")?;
        ctx.load_ca()?;
        validity_for(opts.years, settings.default_days)?;
    }

    let rsa_size = opts.rsa_size.unwrap_or(settings.default_bits);
    let mut subject = settings.distinguished_name.clone();
    subject.common_name = opts.subject_common_name();

    let mut extensions = Vec::new();
    if !opts.hosts.is_empty() {
        let san = SubjectAltName::new(opts.hosts.0.clone());
        extensions.push(ExtensionParam::from_extension(san, false)?);
    }

    debug!(name = %opts.name, key_type = %opts.key_type, bits = %rsa_size, "generating key");
    let key = KeyPair::generate(opts.key_type, rsa_size)?;
    let request_info = CertificationRequestInfo::builder()
        .subject(subject)
        .subject_public_key(key.public_key())
        .extensions(extensions)
        .build();
    let request = CertificateRequest::new(&request_info, &key)?;

    write_private_key(&key_path, &key)?;
    write_new(&request_path, &request.to_pem()?, None)?;
    if !opts.hosts.is_empty() {
        let rendered = config::render(layout.root(), &config::machine_host_name(), &opts.hosts);
        write_new(&server_config_path, &rendered, Some(0o600))?;
        debug!(path = %server_config_path.display(), hosts = %opts.hosts, "wrote server configuration");
    }

    info!(name = %opts.name, subject = %request.subject(), "certificate request created");
    let mut out = format!(
        "\n== Generated\n- Request:\t{request_path:?}\n- Private key:\t{key_path:?}\n"
    );

    if opts.sign {
        let sign_opts = SignOptions::builder()
            .name(opts.name.clone())
            .maybe_years(opts.years)
            .build();
        out.push_str(&sign_request(ctx, &sign_opts)?);
    }
    Ok(out)
}

/// Names of issued certificates; `ca` belongs to the authority itself.
pub(crate) fn check_server_name(name: &str) -> Result<()> {
    validate_name(name)?;
    if name == CA_NAME {
        return Err(CaError::Usage(format!(
            "{name:?} is reserved for the CA certificate"
        )));
    }
    Ok(())
}

/// Host names that appear in a request, first DNS name first.
pub(crate) fn describe_hosts(hosts: &[Host]) -> String {
    HostList(hosts.to_vec()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CaOptions, create_ca, load_request, setup};
    use crate::layout::CaLayout;

    fn initialized() -> (tempfile::TempDir, Context) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(CaLayout::new(dir.path().join("home")));
        setup(&ctx, Some("box.example")).unwrap();
        (dir, ctx)
    }

    #[test]
    fn test_request_with_hosts_writes_server_config() {
        let (_dir, ctx) = initialized();
        let opts = ReqOptions::builder()
            .name("web".to_string())
            .hosts("10.0.0.1,web.example.com".parse().unwrap())
            .key_type(KeyAlgorithm::EcdsaP256)
            .build();
        let out = create_request(&ctx, &opts).unwrap();
        assert!(out.contains("== Generated"));

        let request = load_request(&ctx.layout.request_path("web")).unwrap();
        request.verify().unwrap();
        assert_eq!(request.subject().common_name, "web.example.com");
        assert_eq!(
            describe_hosts(&request.subject_alt_names().unwrap()),
            "IP:10.0.0.1, DNS:web.example.com"
        );

        let server = crate::config::Settings::load(&ctx.layout.server_config_path("web")).unwrap();
        assert_eq!(server.subject_alt_names, opts.hosts);

        let err = create_request(&ctx, &opts).unwrap_err();
        assert!(matches!(err, CaError::AlreadyExists { .. }));
    }

    #[test]
    fn test_request_without_hosts_uses_name() {
        let (_dir, ctx) = initialized();
        let opts = ReqOptions::builder()
            .name("plain".to_string())
            .key_type(KeyAlgorithm::EcdsaP256)
            .build();
        create_request(&ctx, &opts).unwrap();

        let request = load_request(&ctx.layout.request_path("plain")).unwrap();
        assert_eq!(request.subject().common_name, "plain");
        assert!(request.subject_alt_names().unwrap().is_empty());
        assert!(!ctx.layout.server_config_path("plain").exists());
    }

    #[test]
    fn test_request_and_sign() {
        let (_dir, ctx) = initialized();
        create_ca(
            &ctx,
            &CaOptions::builder().key_type(KeyAlgorithm::EcdsaP256).build(),
        )
        .unwrap();
        let opts = ReqOptions::builder()
            .name("api".to_string())
            .key_type(KeyAlgorithm::EcdsaP384)
            .sign(true)
            .years(2)
            .build();
        let out = create_request(&ctx, &opts).unwrap();
        assert!(out.contains("== Signed"));
        assert!(ctx.layout.cert_path("api").exists());
        assert!(!ctx.layout.request_path("api").exists());
    }

    #[test]
    fn test_request_and_sign_without_ca_writes_nothing() {
        let (_dir, ctx) = initialized();
        let opts = ReqOptions::builder()
            .name("api".to_string())
            .hosts("api.example.com".parse().unwrap())
            .key_type(KeyAlgorithm::EcdsaP256)
            .sign(true)
            .build();
        let err = create_request(&ctx, &opts).unwrap_err();
        assert!(matches!(err, CaError::NotFound { .. }));
        assert!(!ctx.layout.key_path("api").exists());
        assert!(!ctx.layout.request_path("api").exists());
        assert!(!ctx.layout.server_config_path("api").exists());
    }

    #[test]
    fn test_ca_name_is_reserved() {
        let (_dir, ctx) = initialized();
        let opts = ReqOptions::builder().name(CA_NAME.to_string()).build();
        assert_eq!(create_request(&ctx, &opts).unwrap_err().exit_code(), 2);
        let opts = ReqOptions::builder().name("../evil".to_string()).build();
        assert_eq!(create_request(&ctx, &opts).unwrap_err().exit_code(), 2);
    }
}
