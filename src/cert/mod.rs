pub mod extensions;
pub mod params;

use const_oid::ObjectIdentifier;
use const_oid::db::rfc5912;
use der::asn1::Any;
use der::{Decode, Encode, EncodePem};
use extensions::{BasicConstraints, SubjectAltName};
use params::{
    CertificationRequestInfo, DistinguishedName, ExtensionParam, Validity, find_extension,
};
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::error::{CaError, Result};
use crate::hosts::Host;
use crate::issuer::Issuer;
use crate::key::{KeyPair, PublicKey};
use crate::pem_utils;
use crate::tbs_certificate::serial_to_u128;

/// Represents the supported signature algorithms for certificates and requests.
///
/// This enum provides a mapping to the corresponding OIDs for each algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption.
    Sha256WithRSA,
    /// SHA-384 with RSA encryption.
    Sha384WithRSA,
    /// SHA-512 with RSA encryption.
    Sha512WithRSA,
    /// SHA-256 with ECDSA.
    Sha256WithECDSA,
    /// SHA-384 with ECDSA.
    Sha384WithECDSA,
}

impl SignatureAlgorithm {
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            SignatureAlgorithm::Sha256WithRSA => rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha384WithRSA => rfc5912::SHA_384_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha512WithRSA => rfc5912::SHA_512_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha256WithECDSA => rfc5912::ECDSA_WITH_SHA_256,
            SignatureAlgorithm::Sha384WithECDSA => rfc5912::ECDSA_WITH_SHA_384,
        }
    }

    pub fn from_oid(oid: &ObjectIdentifier) -> Result<Self> {
        match *oid {
            rfc5912::SHA_256_WITH_RSA_ENCRYPTION => Ok(SignatureAlgorithm::Sha256WithRSA),
            rfc5912::SHA_384_WITH_RSA_ENCRYPTION => Ok(SignatureAlgorithm::Sha384WithRSA),
            rfc5912::SHA_512_WITH_RSA_ENCRYPTION => Ok(SignatureAlgorithm::Sha512WithRSA),
            rfc5912::ECDSA_WITH_SHA_256 => Ok(SignatureAlgorithm::Sha256WithECDSA),
            rfc5912::ECDSA_WITH_SHA_384 => Ok(SignatureAlgorithm::Sha384WithECDSA),
            other => Err(CaError::InvalidInput(format!(
                "unsupported signature algorithm {other}"
            ))),
        }
    }

    /// Name as printed by `openssl x509 -text`.
    pub fn name(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha256WithRSA => "sha256WithRSAEncryption",
            SignatureAlgorithm::Sha384WithRSA => "sha384WithRSAEncryption",
            SignatureAlgorithm::Sha512WithRSA => "sha512WithRSAEncryption",
            SignatureAlgorithm::Sha256WithECDSA => "ecdsa-with-SHA256",
            SignatureAlgorithm::Sha384WithECDSA => "ecdsa-with-SHA384",
        }
    }
}

impl From<SignatureAlgorithm> for AlgorithmIdentifierOwned {
    /// RSA algorithms carry an explicit NULL parameter, ECDSA ones carry none.
    fn from(value: SignatureAlgorithm) -> Self {
        let parameters = match value {
            SignatureAlgorithm::Sha256WithRSA
            | SignatureAlgorithm::Sha384WithRSA
            | SignatureAlgorithm::Sha512WithRSA => Some(Any::null()),
            SignatureAlgorithm::Sha256WithECDSA | SignatureAlgorithm::Sha384WithECDSA => None,
        };
        AlgorithmIdentifierOwned {
            oid: value.oid(),
            parameters,
        }
    }
}

/// Represents an X.509 certificate.
///
/// This struct provides methods to encode the certificate into DER or PEM formats
/// and to read back the fields the CA cares about.
#[derive(Debug, Clone)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| CaError::EncodingError(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| CaError::EncodingError(e.to_string()))
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertificateInner::from_der(der)?,
        })
    }

    /// Decodes the first `CERTIFICATE` block of a PEM document.
    pub fn from_pem(text: &str) -> Result<Self> {
        Self::from_der(&pem_utils::pem_to_der(text, &[pem_utils::CERTIFICATE])?)
    }

    /// Big-endian serial number without the DER sign byte.
    pub fn serial_number(&self) -> Vec<u8> {
        let bytes = self.inner.tbs_certificate.serial_number.as_bytes();
        match bytes {
            [0, rest @ ..] if !rest.is_empty() => rest.to_vec(),
            _ => bytes.to_vec(),
        }
    }

    /// Serial number as printed in the ledger, upper-case hex with an even
    /// number of digits.
    pub fn serial_hex(&self) -> String {
        self.serial_number()
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect()
    }

    pub fn serial_u128(&self) -> Result<u128> {
        serial_to_u128(&self.serial_number())
    }

    pub fn subject(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.subject)
    }

    pub fn issuer(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.issuer)
    }

    pub fn validity(&self) -> Validity {
        let validity = &self.inner.tbs_certificate.validity;
        Validity {
            not_before: crate::tbs_certificate::from_x509_time(&validity.not_before),
            not_after: crate::tbs_certificate::from_x509_time(&validity.not_after),
        }
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::from_oid(&self.inner.signature_algorithm.oid)
    }

    pub fn extensions(&self) -> Vec<ExtensionParam> {
        self.inner
            .tbs_certificate
            .extensions
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(ExtensionParam::from_x509)
            .collect()
    }

    /// Hosts from the subject alternative name extension, if any.
    pub fn subject_alt_names(&self) -> Result<Vec<Host>> {
        Ok(find_extension::<SubjectAltName>(&self.extensions())?
            .map(|san| san.names)
            .unwrap_or_default())
    }

    pub fn is_ca(&self) -> Result<bool> {
        Ok(find_extension::<BasicConstraints>(&self.extensions())?
            .map(|bc| bc.is_ca)
            .unwrap_or(false))
    }

    /// Checks that `issuer_key` made the signature over the TBS part.
    pub fn verify_signed_by(&self, issuer_key: &PublicKey) -> Result<()> {
        let message = self.inner.tbs_certificate.to_der()?;
        let signature = self.inner.signature.raw_bytes();
        issuer_key.verify(&self.signature_algorithm()?, &message, signature)
    }

    /// Whether the issuer field of this certificate names `issuer`'s subject.
    pub fn is_issued_by(&self, issuer: &Certificate) -> Result<bool> {
        Ok(params::name_der(&self.inner.tbs_certificate.issuer)?
            == params::name_der(&issuer.inner.tbs_certificate.subject)?)
    }

    /// Creates a new self-signed certificate.
    ///
    /// # Arguments
    /// * `cert_info` - The certification request information.
    /// * `key` - The key pair used to sign the certificate.
    /// * `serial` - Serial number taken from the CA ledger.
    /// * `validity` - The validity period of the certificate.
    pub fn new_self_signed(
        cert_info: &CertificationRequestInfo,
        key: &KeyPair,
        serial: &[u8],
        validity: Validity,
    ) -> Result<Self> {
        // For self-signed certificates, the issuer is the same as the subject
        let self_issuer = SelfIssuer {
            name: cert_info.subject.clone(),
            key,
        };
        self_issuer.issue(cert_info, serial, validity)
    }
}

// Helper struct for self-signed certificates
struct SelfIssuer<'a> {
    name: DistinguishedName,
    key: &'a KeyPair,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> Result<Name> {
        self.name.as_x509_name()
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }
}

/// A CA certificate loaded together with its private key.
#[derive(Clone)]
pub struct CertificateWithPrivateKey {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl CertificateWithPrivateKey {
    /// Pairs a certificate with its key, refusing keys that do not match.
    pub fn new(cert: Certificate, key: KeyPair) -> Result<Self> {
        if cert.public_key()? != key.public_key() {
            return Err(CaError::InvalidInput(
                "private key does not match the certificate".into(),
            ));
        }
        Ok(Self { cert, key })
    }
}

impl Issuer for CertificateWithPrivateKey {
    fn issuer_name(&self) -> Result<Name> {
        // Verbatim, never re-encoded through DistinguishedName.
        Ok(self.cert.inner.tbs_certificate.subject.clone())
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::{AuthorityKeyIdentifier, SubjectKeyIdentifier};

    fn ca_info(key: &KeyPair) -> CertificationRequestInfo {
        CertificationRequestInfo::builder()
            .subject(
                DistinguishedName::builder()
                    .common_name("test Root CA".to_string())
                    .organization("Local CA".to_string())
                    .build(),
            )
            .subject_public_key(key.public_key())
            .is_ca(true)
            .build()
    }

    #[test]
    fn test_self_signed_ca() {
        let key = KeyPair::generate_ecdsa_p256();
        let cert = Certificate::new_self_signed(&ca_info(&key), &key, &[1], Validity::for_years(10).unwrap())
            .unwrap();

        assert_eq!(cert.serial_hex(), "01");
        assert_eq!(cert.subject(), cert.issuer());
        assert!(cert.is_ca().unwrap());
        assert!(cert.is_issued_by(&cert).unwrap());
        cert.verify_signed_by(&key.public_key()).unwrap();

        let extensions = cert.extensions();
        let ski: SubjectKeyIdentifier = find_extension(&extensions).unwrap().unwrap();
        let aki: AuthorityKeyIdentifier = find_extension(&extensions).unwrap().unwrap();
        assert_eq!(ski.0, aki.key_identifier);
    }

    #[test]
    fn test_pem_round_trip() {
        let key = KeyPair::generate_ecdsa_p384();
        let cert = Certificate::new_self_signed(&ca_info(&key), &key, &[0x80], Validity::for_days(1).unwrap())
            .unwrap();
        let pem = cert.to_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----"));

        let decoded = Certificate::from_pem(&pem).unwrap();
        assert_eq!(decoded.serial_hex(), "80");
        assert_eq!(decoded.serial_u128().unwrap(), 128);
        assert_eq!(
            decoded.signature_algorithm().unwrap(),
            SignatureAlgorithm::Sha384WithECDSA
        );
    }

    #[test]
    fn test_signature_from_other_key_fails() {
        let key = KeyPair::generate_ecdsa_p256();
        let other = KeyPair::generate_ecdsa_p256();
        let cert = Certificate::new_self_signed(&ca_info(&key), &key, &[2], Validity::for_days(1).unwrap())
            .unwrap();
        assert!(cert.verify_signed_by(&other.public_key()).is_err());
        assert!(CertificateWithPrivateKey::new(cert, other).is_err());
    }

    #[test]
    fn test_rsa_algorithm_identifier_has_null_parameters() {
        let id: AlgorithmIdentifierOwned = SignatureAlgorithm::Sha256WithRSA.into();
        assert!(id.parameters.is_some());
        let id: AlgorithmIdentifierOwned = SignatureAlgorithm::Sha256WithECDSA.into();
        assert!(id.parameters.is_none());
        assert_eq!(
            SignatureAlgorithm::from_oid(&SignatureAlgorithm::Sha512WithRSA.oid()).unwrap(),
            SignatureAlgorithm::Sha512WithRSA
        );
    }
}
