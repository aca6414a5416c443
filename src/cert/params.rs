use std::fmt;

use bon::Builder;
use const_oid::ObjectIdentifier;
use const_oid::db::rfc4519;
use der::asn1::{Any, SetOfVec};
use der::{Encode, Tag};
use time::Duration;
use time::OffsetDateTime;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};

use super::extensions::ToAndFromX509Extension;
pub use crate::cert::extensions::ExtendedKeyUsage;
pub use crate::cert::extensions::ExtendedKeyUsageOption;
use crate::error::CaError;
use crate::key::PublicKey;

/// Parameters for building an X.509 certificate.
///
/// # Fields
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `usages` - A list of extended key usage options.
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `extensions` - Additional X.509 extensions, such as the subject alternative names.
#[derive(Clone, Debug, Builder)]
pub struct CertificationRequestInfo {
    pub subject: DistinguishedName,
    pub subject_public_key: PublicKey,
    #[builder(default)]
    pub usages: Vec<ExtendedKeyUsageOption>,
    #[builder(default)]
    pub is_ca: bool,
    #[builder(default)]
    pub extensions: Vec<ExtensionParam>,
}

/// Distinguished name of a certificate subject or issuer.
///
/// Empty attributes are left out of the encoded name.
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub common_name: String,
    pub country: Option<String>,
    pub state: Option<String>,
    pub locality: Option<String>,
    pub organization: Option<String>,
    pub organization_unit: Option<String>,
}

impl DistinguishedName {
    /// Attributes in encoding order, most significant first.
    fn attributes(&self) -> Vec<(ObjectIdentifier, &str)> {
        [
            (rfc4519::C, self.country.as_deref()),
            (rfc4519::ST, self.state.as_deref()),
            (rfc4519::L, self.locality.as_deref()),
            (rfc4519::O, self.organization.as_deref()),
            (rfc4519::OU, self.organization_unit.as_deref()),
            (rfc4519::CN, Some(self.common_name.as_str())),
        ]
        .into_iter()
        .filter_map(|(oid, value)| value.filter(|v| !v.is_empty()).map(|v| (oid, v)))
        .collect()
    }

    /// Converts the distinguished name to an X.509 name, one attribute per RDN.
    ///
    /// The country is a `PrintableString`; every other attribute is a `UTF8String`.
    pub fn as_x509_name(&self) -> Result<x509_cert::name::DistinguishedName, CaError> {
        let mut rdns = Vec::new();
        for (oid, value) in self.attributes() {
            let tag = if oid == rfc4519::C {
                Tag::PrintableString
            } else {
                Tag::Utf8String
            };
            let atv = AttributeTypeAndValue {
                oid,
                value: Any::new(tag, value.as_bytes().to_vec())?,
            };
            rdns.push(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?));
        }
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509 name.
    ///
    /// Attributes other than the six supported ones are ignored.
    pub fn from_x509_name(x509dn: &x509_cert::name::DistinguishedName) -> Self {
        let mut dn = DistinguishedName::default();

        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let value = String::from_utf8_lossy(attr.value.value()).into_owned();
                match attr.oid {
                    rfc4519::CN => dn.common_name = value,
                    rfc4519::C => dn.country = Some(value),
                    rfc4519::ST => dn.state = Some(value),
                    rfc4519::L => dn.locality = Some(value),
                    rfc4519::O => dn.organization = Some(value),
                    rfc4519::OU => dn.organization_unit = Some(value),
                    _ => {}
                }
            }
        }

        dn
    }

    /// OpenSSL-style one-line form used in the ledger, e.g. `/O=Local CA/CN=web`.
    pub fn to_slash_form(&self) -> String {
        self.attributes()
            .into_iter()
            .map(|(oid, value)| format!("/{}={}", short_name(&oid), value))
            .collect()
    }
}

impl fmt::Display for DistinguishedName {
    /// Formats as `C = US, O = Local CA, CN = web`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .attributes()
            .into_iter()
            .map(|(oid, value)| format!("{} = {}", short_name(&oid), value))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

/// Short attribute name for the supported name attributes.
pub fn short_name(oid: &ObjectIdentifier) -> String {
    match *oid {
        rfc4519::CN => "CN".to_string(),
        rfc4519::C => "C".to_string(),
        rfc4519::ST => "ST".to_string(),
        rfc4519::L => "L".to_string(),
        rfc4519::O => "O".to_string(),
        rfc4519::OU => "OU".to_string(),
        _ => oid.to_string(),
    }
}

/// Certificate validity period.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Debug)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Last year an X.509 GeneralizedTime can carry.
    pub const MAX_YEAR: i32 = 9999;

    /// Creates a validity period starting now for the given number of days.
    ///
    /// Fails with a usage error when the period would end after
    /// [`Validity::MAX_YEAR`].
    pub fn for_days(days: i64) -> Result<Self, CaError> {
        let now = OffsetDateTime::now_utc();
        let not_after = days
            .checked_mul(86_400)
            .and_then(|secs| now.checked_add(Duration::seconds(secs)))
            .filter(|end| end.year() <= Self::MAX_YEAR)
            .ok_or_else(|| {
                CaError::Usage(format!(
                    "validity of {days} days ends after the year {}",
                    Self::MAX_YEAR
                ))
            })?;
        Ok(Self {
            not_before: now,
            not_after,
        })
    }

    /// Creates a validity period of `years` × 365 days starting now.
    pub fn for_years(years: u32) -> Result<Self, CaError> {
        Self::for_days(365 * i64::from(years))
    }

    /// Whether `at` falls inside the period.
    pub fn contains(&self, at: OffsetDateTime) -> bool {
        self.not_before <= at && at <= self.not_after
    }
}

/// Represents an X.509 extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    pub fn from_extension<E: ToAndFromX509Extension>(
        extension: E,
        critical: bool,
    ) -> Result<Self, CaError> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E, CaError> {
        E::from_x509_extension_value(&self.value)
    }

    pub fn from_x509(ext: &x509_cert::ext::Extension) -> Self {
        Self {
            oid: ext.extn_id,
            critical: ext.critical,
            value: ext.extn_value.as_bytes().to_vec(),
        }
    }

    pub fn to_x509(&self) -> Result<x509_cert::ext::Extension, CaError> {
        Ok(x509_cert::ext::Extension {
            extn_id: self.oid,
            critical: self.critical,
            extn_value: der::asn1::OctetString::new(self.value.clone())?,
        })
    }
}

/// Finds and decodes the first extension of type `E`.
pub fn find_extension<E: ToAndFromX509Extension>(
    extensions: &[ExtensionParam],
) -> Result<Option<E>, CaError> {
    extensions
        .iter()
        .find(|ext| ext.oid == E::OID)
        .map(|ext| ext.to_extension())
        .transpose()
}

/// DER of a name, for comparisons that must not depend on attribute parsing.
pub fn name_der(name: &x509_cert::name::Name) -> Result<Vec<u8>, CaError> {
    Ok(name.to_der()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinguished_name_skips_empty_attributes() {
        let dn = DistinguishedName::builder()
            .common_name("web.local".to_string())
            .organization("Local CA".to_string())
            .country(String::new())
            .build();
        assert_eq!(dn.to_string(), "O = Local CA, CN = web.local");
        assert_eq!(dn.to_slash_form(), "/O=Local CA/CN=web.local");

        let x509 = dn.as_x509_name().unwrap();
        assert_eq!(x509.0.len(), 2);
        let decoded = DistinguishedName::from_x509_name(&x509);
        assert_eq!(decoded.common_name, "web.local");
        assert_eq!(decoded.organization.as_deref(), Some("Local CA"));
        assert_eq!(decoded.country, None);
    }

    #[test]
    fn test_validity_for_years() {
        let validity = Validity::for_years(2).unwrap();
        assert_eq!(validity.not_after - validity.not_before, Duration::days(730));
        assert!(validity.contains(OffsetDateTime::now_utc()));
        assert!(!validity.contains(OffsetDateTime::now_utc() + Duration::days(731)));
    }

    #[test]
    fn test_validity_past_year_9999_is_rejected() {
        for years in [8000, 10000, u32::MAX] {
            let err = Validity::for_years(years).unwrap_err();
            assert!(matches!(err, CaError::Usage(_)), "{years}");
            assert_eq!(err.exit_code(), 2);
        }
        let err = Validity::for_days(i64::MAX).unwrap_err();
        assert!(err.to_string().contains("ends after the year 9999"));
        assert!(Validity::for_years(100).is_ok());
    }
}
