use der::asn1::{GeneralizedTime, UtcTime};
use time::OffsetDateTime;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::{DistinguishedName, ExtensionParam, Validity};
use crate::error::{CaError, Result};
use crate::key::PublicKey;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
///
/// # Fields
/// * `serial_number` - Big-endian serial number assigned by the issuer.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The issuer name, exactly as it appears in the issuer's subject.
/// * `validity` - The certificate's validity period.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `extensions` - Additional X.509 extensions for the certificate.
pub struct TbsCertificate {
    pub serial_number: Vec<u8>,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: Name,
    pub validity: Validity,
    pub subject: DistinguishedName,
    pub subject_public_key: PublicKey,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let extensions = self
            .extensions
            .iter()
            .map(ExtensionParam::to_x509)
            .collect::<Result<Vec<_>>>()?;

        let validity = x509_cert::time::Validity {
            not_before: to_x509_time(self.validity.not_before)?,
            not_after: to_x509_time(self.validity.not_after)?,
        };

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number: SerialNumber::new(&positive_serial(&self.serial_number))?,
            signature: self.signature_algorithm.into(),
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.as_x509_name()?,
            subject_public_key_info: self.subject_public_key.as_spki()?,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: if extensions.is_empty() {
                None
            } else {
                Some(extensions)
            },
        })
    }
}

/// UTCTime through 2049, GeneralizedTime afterwards (RFC 5280 §4.1.2.5).
pub(crate) fn to_x509_time(at: OffsetDateTime) -> Result<x509_cert::time::Time> {
    if at.year() < 2050 {
        Ok(x509_cert::time::Time::UtcTime(UtcTime::from_system_time(
            at.into(),
        )?))
    } else {
        Ok(x509_cert::time::Time::GeneralTime(
            GeneralizedTime::from_system_time(at.into())?,
        ))
    }
}

pub(crate) fn from_x509_time(time: &x509_cert::time::Time) -> OffsetDateTime {
    OffsetDateTime::from(time.to_system_time())
}

/// Minimal two's complement form of an unsigned big-endian serial.
fn positive_serial(serial: &[u8]) -> Vec<u8> {
    let mut bytes: Vec<u8> = serial.iter().copied().skip_while(|b| *b == 0).collect();
    if bytes.first().is_none_or(|b| b & 0x80 != 0) {
        bytes.insert(0, 0);
    }
    bytes
}

/// Serial number bytes as an unsigned value, without sign padding.
pub fn serial_to_u128(serial: &[u8]) -> Result<u128> {
    let trimmed: Vec<u8> = serial.iter().copied().skip_while(|b| *b == 0).collect();
    if trimmed.len() > 16 {
        return Err(CaError::CertificateError(
            "serial number wider than 128 bits".into(),
        ));
    }
    Ok(trimmed
        .iter()
        .fold(0u128, |acc, byte| (acc << 8) | u128::from(*byte)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyPair;

    #[test]
    fn test_inner_keeps_serial_and_issuer_verbatim() {
        use der::Encode;

        let key = KeyPair::generate_ecdsa_p256();
        let subject = DistinguishedName::builder()
            .common_name("web.local".to_string())
            .build();
        let issuer: Name = "CN=Corp Root,emailAddress=pki@corp.example".parse().unwrap();
        let tbs = TbsCertificate {
            serial_number: vec![0x2a],
            signature_algorithm: key.signature_algorithm(),
            issuer: issuer.clone(),
            validity: Validity::for_days(30).unwrap(),
            subject,
            subject_public_key: key.public_key(),
            extensions: vec![],
        };
        let inner = tbs.to_tbs_certificate_inner().unwrap();
        assert!(inner.extensions.is_none());
        assert_eq!(serial_to_u128(inner.serial_number.as_bytes()).unwrap(), 42);
        assert_eq!(inner.issuer.to_der().unwrap(), issuer.to_der().unwrap());
        assert_eq!(
            DistinguishedName::from_x509_name(&inner.subject).common_name,
            "web.local"
        );
    }

    #[test]
    fn test_far_future_uses_generalized_time() {
        let at = OffsetDateTime::from_unix_timestamp(2_600_000_000).unwrap();
        assert!(matches!(
            to_x509_time(at).unwrap(),
            x509_cert::time::Time::GeneralTime(_)
        ));
    }

    #[test]
    fn test_serial_ignores_sign_padding() {
        assert_eq!(serial_to_u128(&[0x00, 0x80]).unwrap(), 128);
        assert!(serial_to_u128(&[1; 17]).is_err());
        assert_eq!(positive_serial(&[0x80]), vec![0x00, 0x80]);
        assert_eq!(positive_serial(&[0x00, 0x00, 0x05]), vec![0x05]);
        assert_eq!(positive_serial(&[]), vec![0x00]);
    }
}
