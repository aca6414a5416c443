use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use const_oid::AssociatedOid;
use der::{
    Decode, Encode,
    asn1::{Ia5String, OctetString},
    oid::ObjectIdentifier,
};
use x509_cert::ext::pkix::name::GeneralName;

use crate::error::CaError;
use crate::hosts::Host;

/// Trait for converting to and from X.509 extensions.
///
/// This trait provides methods to encode and decode X.509 extension values.
///
/// # Example
/// ```
/// use localca::cert::extensions::{SubjectAltName, ToAndFromX509Extension};
/// use localca::hosts::Host;
/// let san = SubjectAltName::new(vec![Host::Dns("example.com".to_string())]);
/// let encoded = san.to_x509_extension_value().unwrap();
/// let decoded = SubjectAltName::from_x509_extension_value(&encoded).unwrap();
/// assert_eq!(san.names, decoded.names);
/// ```
pub trait ToAndFromX509Extension {
    /// The Object Identifier (OID) for the extension.
    const OID: ObjectIdentifier;

    /// Encodes the extension into a DER-encoded byte vector.
    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CaError>;

    /// Decodes the extension from a DER-encoded byte slice.
    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CaError>
    where
        Self: Sized;
}

/// Represents the Subject Alternative Name (SAN) extension.
///
/// # Fields
/// * `names` - IP addresses and DNS names, in the order given.
/// * `other_names` - Every other general name (email, URI, directory name,
///   ...), kept as decoded and encoded after `names`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectAltName {
    pub names: Vec<Host>,
    pub other_names: Vec<GeneralName>,
}

impl SubjectAltName {
    /// A SAN holding only IP addresses and DNS names.
    pub fn new(names: Vec<Host>) -> Self {
        Self {
            names,
            other_names: Vec::new(),
        }
    }
}

impl ToAndFromX509Extension for SubjectAltName {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectAltName::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CaError> {
        let mut general_names = self
            .names
            .iter()
            .map(|name| -> Result<GeneralName, CaError> {
                match name {
                    Host::Ip(IpAddr::V4(ip)) => Ok(GeneralName::IpAddress(OctetString::new(
                        ip.octets().to_vec(),
                    )?)),
                    Host::Ip(IpAddr::V6(ip)) => Ok(GeneralName::IpAddress(OctetString::new(
                        ip.octets().to_vec(),
                    )?)),
                    Host::Dns(dns) => Ia5String::new(dns)
                        .map(GeneralName::DnsName)
                        .map_err(|e| CaError::InvalidInput(e.to_string())),
                }
            })
            .collect::<Result<Vec<_>, CaError>>()?;
        general_names.extend(self.other_names.iter().cloned());

        Ok(x509_cert::ext::pkix::SubjectAltName(general_names).to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CaError> {
        let san = x509_cert::ext::pkix::SubjectAltName::from_der(extension)?;
        let mut decoded = Self::default();
        for name in san.0 {
            match name {
                GeneralName::DnsName(dns) => decoded.names.push(Host::Dns(dns.to_string())),
                GeneralName::IpAddress(octets) => match ip_from_octets(octets.as_bytes()) {
                    Ok(ip) => decoded.names.push(Host::Ip(ip)),
                    Err(_) => decoded.other_names.push(GeneralName::IpAddress(octets)),
                },
                other => decoded.other_names.push(other),
            }
        }
        Ok(decoded)
    }
}

impl fmt::Display for SubjectAltName {
    /// Formats as `IP Address:10.0.0.1, DNS:example.com, email:ops@example.com`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .names
            .iter()
            .map(|name| match name {
                Host::Ip(ip) => format!("IP Address:{ip}"),
                Host::Dns(dns) => format!("DNS:{dns}"),
            })
            .chain(self.other_names.iter().map(general_name_text))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

/// OpenSSL's rendering of a general name.
fn general_name_text(name: &GeneralName) -> String {
    match name {
        GeneralName::Rfc822Name(email) => format!("email:{email}"),
        GeneralName::DnsName(dns) => format!("DNS:{dns}"),
        GeneralName::UniformResourceIdentifier(uri) => format!("URI:{uri}"),
        GeneralName::DirectoryName(dir) => format!("DirName:{dir}"),
        GeneralName::RegisteredId(oid) => format!("Registered ID:{oid}"),
        GeneralName::IpAddress(_) => "IP Address:<invalid>".to_string(),
        GeneralName::OtherName(_) => "othername:<unsupported>".to_string(),
        GeneralName::EdiPartyName(_) => "EdiPartyName:<unsupported>".to_string(),
    }
}

fn ip_from_octets(octets: &[u8]) -> Result<IpAddr, CaError> {
    if let Ok(v4) = <[u8; 4]>::try_from(octets) {
        return Ok(IpAddr::V4(Ipv4Addr::from(v4)));
    }
    if let Ok(v6) = <[u8; 16]>::try_from(octets) {
        return Ok(IpAddr::V6(Ipv6Addr::from(v6)));
    }
    Err(CaError::DecodingError(format!(
        "IP address of {} bytes in subject alternative name",
        octets.len()
    )))
}

/// Represents the Basic Constraints extension.
///
/// # Fields
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `max_path_length` - The maximum number of intermediate CAs allowed.
#[derive(Debug, Default)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_length: Option<u32>,
}

impl ToAndFromX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::BasicConstraints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CaError> {
        let bc = x509_cert::ext::pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint: self.max_path_length.map(|v| v as u8),
        };

        Ok(bc.to_der()?)
    }

    fn from_x509_extension_value(der_bytes: &[u8]) -> Result<Self, CaError> {
        let bc = x509_cert::ext::pkix::BasicConstraints::from_der(der_bytes)?;
        Ok(Self {
            is_ca: bc.ca,
            max_path_length: bc.path_len_constraint.map(|v| v as u32),
        })
    }
}

pub use der::flagset::FlagSet;
use x509_cert::ext::pkix::KeyUsage as X509KeyUsage;
pub use x509_cert::ext::pkix::KeyUsages;

/// Represents the Key Usage extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl KeyUsage {
    /// Names in the order OpenSSL prints them.
    pub fn names(&self) -> Vec<&'static str> {
        [
            (KeyUsages::DigitalSignature, "Digital Signature"),
            (KeyUsages::NonRepudiation, "Non Repudiation"),
            (KeyUsages::KeyEncipherment, "Key Encipherment"),
            (KeyUsages::DataEncipherment, "Data Encipherment"),
            (KeyUsages::KeyAgreement, "Key Agreement"),
            (KeyUsages::KeyCertSign, "Certificate Sign"),
            (KeyUsages::CRLSign, "CRL Sign"),
            (KeyUsages::EncipherOnly, "Encipher Only"),
            (KeyUsages::DecipherOnly, "Decipher Only"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.0.contains(*flag))
        .map(|(_, name)| name)
        .collect()
    }
}

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <X509KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CaError> {
        let ku = X509KeyUsage::from(self.0);
        Ok(ku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CaError> {
        let ku = X509KeyUsage::from_der(extension)?;
        Ok(Self(ku.0))
    }
}

/// Represents the Extended Key Usage extension.
#[derive(Debug, Clone, Default)]
pub struct ExtendedKeyUsage {
    pub usage: Vec<ExtendedKeyUsageOption>,
}

impl ToAndFromX509Extension for ExtendedKeyUsage {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::ExtendedKeyUsage::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CaError> {
        let oids: Vec<ObjectIdentifier> = self.usage.iter().map(|v| (*v).into()).collect();
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage(oids);
        Ok(eku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CaError> {
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage::from_der(extension)?;
        let usage = eku
            .0
            .iter()
            .map(|v| match *v {
                const_oid::db::rfc5912::ID_KP_OCSP_SIGNING => {
                    Ok(ExtendedKeyUsageOption::OcspSigning)
                }
                const_oid::db::rfc5912::ID_KP_SERVER_AUTH => Ok(ExtendedKeyUsageOption::ServerAuth),
                const_oid::db::rfc5912::ID_KP_CLIENT_AUTH => Ok(ExtendedKeyUsageOption::ClientAuth),
                const_oid::db::rfc5912::ID_KP_CODE_SIGNING => {
                    Ok(ExtendedKeyUsageOption::CodeSigning)
                }
                const_oid::db::rfc5912::ID_KP_EMAIL_PROTECTION => {
                    Ok(ExtendedKeyUsageOption::EmailProtection)
                }
                const_oid::db::rfc5912::ID_KP_TIME_STAMPING => {
                    Ok(ExtendedKeyUsageOption::TimeStamping)
                }
                _ => Err(CaError::InvalidInput(
                    "Unsupported extended key usage option".to_string(),
                )),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { usage })
    }
}

/// Represents an option for the Extended Key Usage extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExtendedKeyUsageOption {
    ServerAuth,
    ClientAuth,
    CodeSigning,
    EmailProtection,
    TimeStamping,
    OcspSigning,
}

impl ExtendedKeyUsageOption {
    pub fn name(&self) -> &'static str {
        match self {
            ExtendedKeyUsageOption::ServerAuth => "TLS Web Server Authentication",
            ExtendedKeyUsageOption::ClientAuth => "TLS Web Client Authentication",
            ExtendedKeyUsageOption::CodeSigning => "Code Signing",
            ExtendedKeyUsageOption::EmailProtection => "E-mail Protection",
            ExtendedKeyUsageOption::TimeStamping => "Time Stamping",
            ExtendedKeyUsageOption::OcspSigning => "OCSP Signing",
        }
    }
}

impl From<ExtendedKeyUsageOption> for ObjectIdentifier {
    fn from(value: ExtendedKeyUsageOption) -> Self {
        match value {
            ExtendedKeyUsageOption::OcspSigning => const_oid::db::rfc5912::ID_KP_OCSP_SIGNING,
            ExtendedKeyUsageOption::ServerAuth => const_oid::db::rfc5912::ID_KP_SERVER_AUTH,
            ExtendedKeyUsageOption::ClientAuth => const_oid::db::rfc5912::ID_KP_CLIENT_AUTH,
            ExtendedKeyUsageOption::CodeSigning => const_oid::db::rfc5912::ID_KP_CODE_SIGNING,
            ExtendedKeyUsageOption::EmailProtection => {
                const_oid::db::rfc5912::ID_KP_EMAIL_PROTECTION
            }
            ExtendedKeyUsageOption::TimeStamping => const_oid::db::rfc5912::ID_KP_TIME_STAMPING,
        }
    }
}

/// Represents the Subject Key Identifier extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKeyIdentifier(pub Vec<u8>);

impl ToAndFromX509Extension for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CaError> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier(OctetString::new(self.0.clone())?);
        Ok(ski.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CaError> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier::from_der(extension)?;
        Ok(Self(ski.0.as_bytes().to_vec()))
    }
}

/// Represents the Authority Key Identifier (AKI) extension.
///
/// Only the key identifier form is produced; issuer name and serial are
/// ignored when decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityKeyIdentifier {
    pub key_identifier: Vec<u8>,
}

impl ToAndFromX509Extension for AuthorityKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::AuthorityKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CaError> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier {
            key_identifier: Some(OctetString::new(self.key_identifier.as_slice())?),
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        };

        Ok(aki.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CaError> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier::from_der(extension)?;

        Ok(Self {
            key_identifier: aki
                .key_identifier
                .map(|id| id.as_bytes().to_vec())
                .unwrap_or_default(),
        })
    }
}
