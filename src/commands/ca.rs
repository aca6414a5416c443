use std::fs;

use bon::Builder;
use tracing::{debug, info, warn};

use super::{Context, ensure_absent, validity_for, write_new, write_private_key};
use crate::cert::Certificate;
use crate::cert::params::CertificationRequestInfo;
use crate::error::Result;
use crate::key::{KeyAlgorithm, KeyPair, RsaKeySize};
use crate::layout::CA_NAME;
use crate::ledger::{Ledger, serial_bytes};

/// Flags of `ca`.
#[derive(Debug, Clone, Builder)]
pub struct CaOptions {
    #[builder(default)]
    pub key_type: KeyAlgorithm,
    /// Defaults to `default_bits` from the configuration.
    pub rsa_size: Option<RsaKeySize>,
    #[builder(default = 10)]
    pub years: u32,
    /// Defaults to `<host name> Root CA`.
    pub common_name: Option<String>,
}

/// Generates the self-signed root certificate and its key.
pub fn create_ca(ctx: &Context, opts: &CaOptions) -> Result<String> {
    let layout = &ctx.layout;
    layout.ensure_initialized()?;

    let cert_path = layout.cert_path(CA_NAME);
    let key_path = layout.key_path(CA_NAME);
    ensure_absent(&cert_path, "CA certificate")?;
    ensure_absent(&key_path, "CA private key")?;

    let settings = ctx.settings()?;
    let validity = validity_for(Some(opts.years), settings.default_days)?;
    let rsa_size = opts.rsa_size.unwrap_or(settings.default_bits);

    let mut subject = settings.distinguished_name.clone();
    subject.common_name = opts.common_name.clone().unwrap_or_else(|| {
        format!("{} Root CA", settings.distinguished_name.common_name)
            .trim()
            .to_string()
    });

    debug!(key_type = %opts.key_type, bits = %rsa_size, "generating CA key");
    let key = KeyPair::generate(opts.key_type, rsa_size)?;
    let cert_info = CertificationRequestInfo::builder()
        .subject(subject)
        .subject_public_key(key.public_key())
        .is_ca(true)
        .build();

    let ledger = Ledger::new(layout);
    let serial = ledger.next_serial()?;
    let cert = Certificate::new_self_signed(&cert_info, &key, &serial_bytes(serial), validity)?;

    // A CA key is only kept next to a written certificate.
    write_new(&cert_path, &cert.to_pem()?, None)?;
    if let Err(err) = write_private_key(&key_path, &key) {
        if let Err(rm_err) = fs::remove_file(&cert_path) {
            warn!(path = %cert_path.display(), err = %rm_err, "could not remove CA certificate");
        }
        return Err(err);
    }
    ledger.record(&cert)?;
    ledger.advance(serial)?;

    info!(subject = %cert.subject(), serial = %cert.serial_hex(), "CA certificate created");
    Ok(format!(
        "\n== Generated\n- Certificate:\t{cert_path:?}\n- Private key:\t{key_path:?}\n"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{load_certificate, setup};
    use crate::error::CaError;
    use crate::layout::CaLayout;

    #[test]
    fn test_create_ca_once() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(CaLayout::new(dir.path().join("home")));
        setup(&ctx, Some("box.example")).unwrap();

        let opts = CaOptions::builder()
            .key_type(KeyAlgorithm::EcdsaP256)
            .build();
        create_ca(&ctx, &opts).unwrap();

        let cert = load_certificate(&ctx.layout.cert_path(CA_NAME)).unwrap();
        assert_eq!(cert.subject().common_name, "box.example Root CA");
        assert!(cert.is_ca().unwrap());
        assert_eq!(cert.serial_hex(), "01");
        let validity = cert.validity();
        assert_eq!(
            validity.not_after - validity.not_before,
            time::Duration::days(3650)
        );

        let err = create_ca(&ctx, &opts).unwrap_err();
        assert!(matches!(err, CaError::AlreadyExists { .. }));
    }

    #[test]
    fn test_create_ca_rejects_validity_past_9999() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(CaLayout::new(dir.path().join("home")));
        setup(&ctx, Some("box.example")).unwrap();

        let opts = CaOptions::builder()
            .key_type(KeyAlgorithm::EcdsaP256)
            .years(10000)
            .build();
        let err = create_ca(&ctx, &opts).unwrap_err();
        assert!(matches!(err, CaError::Usage(_)));
        assert_eq!(err.exit_code(), 2);
        assert!(!ctx.layout.cert_path(CA_NAME).exists());
        assert!(!ctx.layout.key_path(CA_NAME).exists());
    }

    #[test]
    fn test_create_ca_requires_setup() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(CaLayout::new(dir.path().join("missing")));
        let err = create_ca(&ctx, &CaOptions::builder().build()).unwrap_err();
        assert!(matches!(err, CaError::NotFound { .. }));
    }
}
