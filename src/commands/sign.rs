use bon::Builder;
use tracing::{debug, info};

use super::req::{check_server_name, describe_hosts};
use super::{Context, ensure_absent, load_request, remove_consumed, validity_for, write_new};
use crate::cert::extensions::{ExtendedKeyUsageOption, SubjectAltName, ToAndFromX509Extension};
use crate::cert::params::ExtensionParam;
use crate::config::Settings;
use crate::error::Result;
use crate::issuer::Issuer;
use crate::ledger::{Ledger, serial_bytes};

/// Flags of `sign`.
#[derive(Debug, Clone, Builder)]
pub struct SignOptions {
    pub name: String,
    /// Defaults to `default_days` from the configuration.
    pub years: Option<u32>,
}

/// Signs the pending request for `name` with the CA.
///
/// Subject alternative names come from the per-server configuration when
/// one exists, otherwise from the request. The request and that
/// configuration are removed once the certificate is written.
pub fn sign_request(ctx: &Context, opts: &SignOptions) -> Result<String> {
    let layout = &ctx.layout;
    layout.ensure_initialized()?;
    check_server_name(&opts.name)?;

    let cert_path = layout.cert_path(&opts.name);
    let request_path = layout.request_path(&opts.name);
    let server_config_path = layout.server_config_path(&opts.name);
    ensure_absent(&cert_path, "certificate")?;

    let request = load_request(&request_path)?;
    request.verify()?;
    let ca = ctx.load_ca()?;
    let settings = ctx.settings()?;
    let validity = validity_for(opts.years, settings.default_days)?;

    let mut cert_info = request.to_cert_info()?;
    cert_info.usages = vec![
        ExtendedKeyUsageOption::ServerAuth,
        ExtendedKeyUsageOption::ClientAuth,
    ];
    if server_config_path.exists() {
        let server = Settings::load(&server_config_path)?;
        if !server.subject_alt_names.is_empty() {
            debug!(path = %server_config_path.display(), "subject alternative names from server configuration");
            cert_info.extensions.retain(|ext| ext.oid != SubjectAltName::OID);
            let san = SubjectAltName::new(server.subject_alt_names.0);
            cert_info.extensions.push(ExtensionParam::from_extension(san, false)?);
        }
    }

    let ledger = Ledger::new(layout);
    let serial = ledger.next_serial()?;
    let cert = ca.issue(&cert_info, &serial_bytes(serial), validity)?;
    let hosts = describe_hosts(&cert.subject_alt_names()?);

    write_new(&cert_path, &cert.to_pem()?, None)?;
    ledger.record(&cert)?;
    ledger.advance(serial)?;

    remove_consumed(&request_path);
    if server_config_path.exists() {
        remove_consumed(&server_config_path);
    }

    info!(
        name = %opts.name,
        serial = %cert.serial_hex(),
        %hosts,
        "certificate signed"
    );
    Ok(format!("\n== Signed\n- Certificate:\t{cert_path:?}\n"))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::commands::{CaOptions, ReqOptions, create_ca, create_request, load_certificate, setup};
    use crate::error::CaError;
    use crate::hosts::Host;
    use crate::key::KeyAlgorithm;
    use crate::layout::CaLayout;

    fn with_ca() -> (tempfile::TempDir, Context) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(CaLayout::new(dir.path().join("home")));
        setup(&ctx, Some("box.example")).unwrap();
        create_ca(
            &ctx,
            &CaOptions::builder().key_type(KeyAlgorithm::EcdsaP256).build(),
        )
        .unwrap();
        (dir, ctx)
    }

    fn request(ctx: &Context, name: &str, hosts: &str) {
        let opts = ReqOptions::builder()
            .name(name.to_string())
            .hosts(hosts.parse().unwrap())
            .key_type(KeyAlgorithm::EcdsaP256)
            .build();
        create_request(ctx, &opts).unwrap();
    }

    #[test]
    fn test_sign_consumes_request() {
        let (_dir, ctx) = with_ca();
        request(&ctx, "web", "10.0.0.1,web.example.com");

        let opts = SignOptions::builder().name("web".to_string()).build();
        sign_request(&ctx, &opts).unwrap();
        assert!(!ctx.layout.request_path("web").exists());
        assert!(!ctx.layout.server_config_path("web").exists());

        let cert = load_certificate(&ctx.layout.cert_path("web")).unwrap();
        let ca = ctx.load_ca().unwrap();
        assert!(cert.is_issued_by(&ca.cert).unwrap());
        assert!(!cert.is_ca().unwrap());
        assert_eq!(cert.serial_hex(), "02");
        assert_eq!(
            cert.subject_alt_names().unwrap(),
            vec![
                Host::Ip("10.0.0.1".parse().unwrap()),
                Host::Dns("web.example.com".to_string())
            ]
        );
        assert_eq!(
            fs::read_to_string(ctx.layout.serial_file()).unwrap(),
            "03\n"
        );
        assert!(ctx.layout.newcert_path("02").exists());

        let err = sign_request(&ctx, &opts).unwrap_err();
        assert!(matches!(err, CaError::AlreadyExists { .. }));
    }

    #[test]
    fn test_server_config_overrides_request_hosts() {
        let (_dir, ctx) = with_ca();
        request(&ctx, "web", "web.example.com");

        let override_hosts = "10.1.1.1,alt.example.com".parse().unwrap();
        let rendered = crate::config::render(ctx.layout.root(), "box.example", &override_hosts);
        fs::write(ctx.layout.server_config_path("web"), rendered).unwrap();

        sign_request(&ctx, &SignOptions::builder().name("web".to_string()).build()).unwrap();
        let cert = load_certificate(&ctx.layout.cert_path("web")).unwrap();
        assert_eq!(cert.subject_alt_names().unwrap(), override_hosts.0);
    }

    #[test]
    fn test_sign_keeps_email_names_with_logging_enabled() {
        use der::asn1::Ia5String;
        use x509_cert::ext::pkix::name::GeneralName;

        use crate::cert::params::{CertificationRequestInfo, DistinguishedName, find_extension};
        use crate::key::KeyPair;
        use crate::request::CertificateRequest;

        let (_dir, ctx) = with_ca();
        let key = KeyPair::generate_ecdsa_p256();
        let san = SubjectAltName {
            names: vec![Host::Dns("ext.example".to_string())],
            other_names: vec![GeneralName::Rfc822Name(
                Ia5String::new("ops@ext.example").unwrap(),
            )],
        };
        let info = CertificationRequestInfo::builder()
            .subject(
                DistinguishedName::builder()
                    .common_name("ext.example".to_string())
                    .build(),
            )
            .subject_public_key(key.public_key())
            .extensions(vec![ExtensionParam::from_extension(san.clone(), false).unwrap()])
            .build();
        let csr = CertificateRequest::new(&info, &key).unwrap();
        fs::write(ctx.layout.request_path("ext"), csr.to_pem().unwrap()).unwrap();

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_test_writer()
            .finish();
        let opts = SignOptions::builder().name("ext".to_string()).build();
        tracing::subscriber::with_default(subscriber, || sign_request(&ctx, &opts)).unwrap();

        let cert = load_certificate(&ctx.layout.cert_path("ext")).unwrap();
        let issued = find_extension::<SubjectAltName>(&cert.extensions())
            .unwrap()
            .unwrap();
        assert_eq!(issued, san);
        assert_eq!(issued.to_string(), "DNS:ext.example, email:ops@ext.example");
    }

    #[test]
    fn test_sign_without_request_fails() {
        let (_dir, ctx) = with_ca();
        let err = sign_request(&ctx, &SignOptions::builder().name("nope".to_string()).build())
            .unwrap_err();
        assert!(matches!(err, CaError::NotFound { .. }));
    }
}
