use der::Encode;
use der::flagset::FlagSet;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;

use crate::cert::Certificate;
use crate::cert::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption, KeyUsage,
    KeyUsages, SubjectKeyIdentifier,
};
use crate::cert::params::{CertificationRequestInfo, ExtensionParam, Validity};
use crate::error::Result;
use crate::key::{KeyPair, PublicKey};
use crate::tbs_certificate::TbsCertificate;

/// Represents an entity capable of issuing certificates.
///
/// This trait provides methods to retrieve issuer details and issue certificates.
pub trait Issuer {
    /// Returns the issuer name as it goes into issued certificates.
    fn issuer_name(&self) -> Result<Name>;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Issues a certificate based on the provided certification request information.
    ///
    /// CA requests get `CA:TRUE` with certificate and CRL signing; every other
    /// request gets `CA:FALSE` and the key usages implied by its extended key
    /// usages. Extensions carried by the request are appended unless they
    /// collide with one set here.
    ///
    /// # Arguments
    /// * `cert_request` - The certification request information containing details about the certificate to be issued.
    /// * `serial` - Big-endian serial number allocated by the caller.
    /// * `validity` - The validity period of the certificate.
    fn issue(
        &self,
        cert_request: &CertificationRequestInfo,
        serial: &[u8],
        validity: Validity,
    ) -> Result<Certificate> {
        let signature_algo = self.signing_key().signature_algorithm();
        let authority_key_id = AuthorityKeyIdentifier {
            key_identifier: self.signing_key().public_key().key_id()?,
        };
        let subject_key_id = SubjectKeyIdentifier(cert_request.subject_public_key.key_id()?);

        let basic_constraints = BasicConstraints {
            is_ca: cert_request.is_ca,
            max_path_length: None,
        };

        let mut extensions: Vec<ExtensionParam> = vec![ExtensionParam::from_extension(
            basic_constraints,
            cert_request.is_ca,
        )?];

        let mut key_usage_flags: FlagSet<KeyUsages> = FlagSet::empty();

        if cert_request.is_ca {
            key_usage_flags |= KeyUsages::KeyCertSign;
            key_usage_flags |= KeyUsages::CRLSign;
        }

        for usage in &cert_request.usages {
            match usage {
                ExtendedKeyUsageOption::ClientAuth
                | ExtendedKeyUsageOption::ServerAuth
                | ExtendedKeyUsageOption::EmailProtection => {
                    key_usage_flags |= KeyUsages::DigitalSignature;
                    // Key transport only exists for RSA (RFC 8813).
                    if matches!(cert_request.subject_public_key, PublicKey::Rsa(_)) {
                        key_usage_flags |= KeyUsages::KeyEncipherment;
                    }
                }
                ExtendedKeyUsageOption::CodeSigning
                | ExtendedKeyUsageOption::TimeStamping
                | ExtendedKeyUsageOption::OcspSigning => {
                    key_usage_flags |= KeyUsages::DigitalSignature;
                }
            }
        }

        if !key_usage_flags.is_empty() {
            extensions.push(ExtensionParam::from_extension(
                KeyUsage(key_usage_flags),
                cert_request.is_ca,
            )?);
        }

        if !cert_request.usages.is_empty() {
            let extended_key_usage = ExtendedKeyUsage {
                usage: cert_request.usages.clone(),
            };
            extensions.push(ExtensionParam::from_extension(extended_key_usage, false)?);
        }

        extensions.push(ExtensionParam::from_extension(subject_key_id, false)?);
        extensions.push(ExtensionParam::from_extension(authority_key_id, false)?);

        let requested: Vec<ExtensionParam> = cert_request
            .extensions
            .iter()
            .filter(|requested| extensions.iter().all(|ext| ext.oid != requested.oid))
            .cloned()
            .collect();
        extensions.extend(requested);

        let tbs_cert = TbsCertificate {
            serial_number: serial.to_vec(),
            signature_algorithm: signature_algo,
            issuer: self.issuer_name()?,
            validity,
            subject: cert_request.subject.clone(),
            subject_public_key: cert_request.subject_public_key.clone(),
            extensions,
        };

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let signature = self.signing_key().sign_data(&tbs_cert_inner.to_der()?)?;

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: signature_algo.into(),
            signature: der::asn1::BitString::from_bytes(&signature)?,
        };

        Ok(Certificate { inner: cert_inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::CertificateWithPrivateKey;
    use crate::cert::extensions::SubjectAltName;
    use crate::cert::params::{DistinguishedName, find_extension};
    use crate::hosts::Host;

    fn root_ca() -> CertificateWithPrivateKey {
        let ca_key = KeyPair::generate_ecdsa_p256();
        let ca_info = CertificationRequestInfo::builder()
            .subject(
                DistinguishedName::builder()
                    .common_name("Root CA".to_string())
                    .build(),
            )
            .subject_public_key(ca_key.public_key())
            .is_ca(true)
            .build();
        let ca_cert =
            Certificate::new_self_signed(&ca_info, &ca_key, &[1], Validity::for_years(1).unwrap())
                .unwrap();
        CertificateWithPrivateKey::new(ca_cert, ca_key).unwrap()
    }

    fn server_request(key: &KeyPair, san: &SubjectAltName) -> CertificationRequestInfo {
        CertificationRequestInfo::builder()
            .subject(
                DistinguishedName::builder()
                    .common_name("web.local".to_string())
                    .build(),
            )
            .subject_public_key(key.public_key())
            .usages(vec![
                ExtendedKeyUsageOption::ServerAuth,
                ExtendedKeyUsageOption::ClientAuth,
            ])
            .extensions(vec![ExtensionParam::from_extension(san.clone(), false).unwrap()])
            .build()
    }

    fn key_usage_names(cert: &Certificate) -> Vec<&'static str> {
        let key_usage: KeyUsage = find_extension(&cert.extensions()).unwrap().unwrap();
        key_usage.names()
    }

    #[test]
    fn test_issue_server_certificate() {
        let ca = root_ca();
        let server_key = KeyPair::generate_ecdsa_p256();
        let san = SubjectAltName::new(vec![Host::Dns("web.local".to_string())]);
        let request = server_request(&server_key, &san);

        let cert = ca.issue(&request, &[2], Validity::for_days(30).unwrap()).unwrap();
        assert_eq!(cert.serial_hex(), "02");
        assert_eq!(cert.issuer(), ca.cert.subject());
        assert!(!cert.is_ca().unwrap());
        assert!(cert.is_issued_by(&ca.cert).unwrap());
        cert.verify_signed_by(&ca.key.public_key()).unwrap();
        assert_eq!(cert.subject_alt_names().unwrap(), san.names);
        assert_eq!(key_usage_names(&cert), vec!["Digital Signature"]);
    }

    #[test]
    fn test_rsa_server_gets_key_encipherment() {
        let ca = root_ca();
        let server_key = KeyPair::generate_rsa(2048).unwrap();
        let san = SubjectAltName::new(vec![Host::Dns("web.local".to_string())]);

        let cert = ca
            .issue(&server_request(&server_key, &san), &[3], Validity::for_days(30).unwrap())
            .unwrap();
        assert_eq!(
            key_usage_names(&cert),
            vec!["Digital Signature", "Key Encipherment"]
        );
    }

    #[test]
    fn test_issuer_copies_ca_subject_encoding() {
        let mut ca = root_ca();
        // A subject this crate would not produce itself, as written by other tools.
        ca.cert.inner.tbs_certificate.subject =
            "CN=Corp Root,O=Corp,emailAddress=pki@corp.example".parse().unwrap();

        let server_key = KeyPair::generate_ecdsa_p256();
        let san = SubjectAltName::new(vec![Host::Dns("web.local".to_string())]);
        let cert = ca
            .issue(&server_request(&server_key, &san), &[2], Validity::for_days(30).unwrap())
            .unwrap();
        assert_eq!(
            cert.inner.tbs_certificate.issuer.to_der().unwrap(),
            ca.cert.inner.tbs_certificate.subject.to_der().unwrap()
        );
        assert!(cert.is_issued_by(&ca.cert).unwrap());
    }
}
