//! Human-readable dumps, certificate metadata and integrity checks.
//!
//! Output follows the layout of the corresponding `openssl` subcommands so
//! that it reads the same to anyone used to `openssl x509 -text`.

use der::asn1::{Any, SetOfVec};
use der::{Encode, Tag, Tagged};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rsa::BigUint;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use time::OffsetDateTime;
use time::macros::format_description;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RelativeDistinguishedName};

use crate::cert::Certificate;
use crate::cert::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAltName,
    SubjectKeyIdentifier, ToAndFromX509Extension,
};
use crate::cert::params::ExtensionParam;
use crate::error::{CaError, Result};
use crate::key::{KeyPair, PublicKey};
use crate::request::CertificateRequest;

const BYTES_PER_LINE: usize = 15;

/// Which lines `info` prints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InfoFields {
    pub end_date: bool,
    pub hash: bool,
    pub issuer: bool,
    pub subject: bool,
}

impl InfoFields {
    /// No field selected means subject, issuer and end date.
    pub fn or_full(self) -> Self {
        if self == Self::default() {
            Self {
                end_date: true,
                hash: false,
                issuer: true,
                subject: true,
            }
        } else {
            self
        }
    }
}

/// Selected metadata lines, in the order `openssl x509` prints them.
pub fn certificate_info(cert: &Certificate, fields: InfoFields) -> Result<String> {
    let fields = fields.or_full();
    let mut lines = Vec::new();
    if fields.subject {
        lines.push(format!("subject={}", cert.subject()));
    }
    if fields.issuer {
        lines.push(format!("issuer={}", cert.issuer()));
    }
    if fields.end_date {
        lines.push(format!("notAfter={}", openssl_time(cert.validity().not_after)?));
    }
    if fields.hash {
        lines.push(format!("{:08x}", subject_hash(&cert.inner.tbs_certificate.subject)?));
    }
    Ok(to_text(lines))
}

/// `Nov 14 22:13:20 2023 GMT`.
pub fn openssl_time(at: OffsetDateTime) -> Result<String> {
    Ok(at.format(format_description!(
        "[month repr:short] [day padding:space] [hour]:[minute]:[second] [year] GMT"
    ))?)
}

/// Hash of a name as computed by OpenSSL's `X509_NAME_hash`: SHA-1 over the
/// canonical encoding, first four bytes read little-endian.
///
/// The canonical encoding re-encodes every string value as a lower-cased
/// `UTF8String` with surrounding whitespace removed and inner runs of
/// whitespace collapsed, then concatenates the RDN sets without the outer
/// sequence.
pub fn subject_hash(name: &Name) -> Result<u32> {
    let mut canonical = Vec::new();
    for rdn in name.0.iter() {
        let mut attributes = Vec::new();
        for atv in rdn.0.iter() {
            let value = match atv.value.tag() {
                Tag::Utf8String
                | Tag::PrintableString
                | Tag::Ia5String
                | Tag::TeletexString
                | Tag::VisibleString => {
                    let text = String::from_utf8_lossy(atv.value.value());
                    Any::new(Tag::Utf8String, canonical_text(&text).into_bytes())?
                }
                _ => atv.value.clone(),
            };
            attributes.push(AttributeTypeAndValue {
                oid: atv.oid,
                value,
            });
        }
        canonical.extend(RelativeDistinguishedName(SetOfVec::try_from(attributes)?).to_der()?);
    }
    let digest = <sha1::Sha1 as sha1::Digest>::digest(&canonical);
    Ok(u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]))
}

fn canonical_text(text: &str) -> String {
    text.split_ascii_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

/// Text form of a certificate, as `openssl x509 -text -noout`.
pub fn certificate_text(cert: &Certificate) -> Result<String> {
    let validity = cert.validity();
    let algorithm = cert.signature_algorithm()?.name();
    let mut lines = vec![
        "Certificate:".to_string(),
        "    Data:".to_string(),
        "        Version: 3 (0x2)".to_string(),
    ];
    // OpenSSL switches to hex for serials that do not fit a long.
    match cert.serial_u128().ok().and_then(|serial| u64::try_from(serial).ok()) {
        Some(serial) => lines.push(format!("        Serial Number: {serial} (0x{serial:x})")),
        None => {
            lines.push("        Serial Number:".to_string());
            lines.push(hex_block(&cert.serial_number(), 12));
        }
    }
    lines.push(format!("        Signature Algorithm: {algorithm}"));
    lines.push(format!("        Issuer: {}", cert.issuer()));
    lines.push("        Validity".to_string());
    lines.push(format!("            Not Before: {}", openssl_time(validity.not_before)?));
    lines.push(format!("            Not After : {}", openssl_time(validity.not_after)?));
    lines.push(format!("        Subject: {}", cert.subject()));
    lines.extend(public_key_lines(&cert.public_key()?, 8)?);

    let extensions = cert.extensions();
    if !extensions.is_empty() {
        lines.push("        X509v3 extensions:".to_string());
        for ext in &extensions {
            lines.extend(extension_lines(ext, 12)?);
        }
    }
    lines.push(format!("    Signature Algorithm: {algorithm}"));
    lines.push("    Signature Value:".to_string());
    lines.push(hex_block(cert.inner.signature.raw_bytes(), 8));
    Ok(to_text(lines))
}

/// Text form of a request, as `openssl req -text -noout`.
pub fn request_text(request: &CertificateRequest) -> Result<String> {
    let mut lines = vec![
        "Certificate Request:".to_string(),
        "    Data:".to_string(),
        "        Version: 1 (0x0)".to_string(),
        format!("        Subject: {}", request.subject()),
    ];
    lines.extend(public_key_lines(&request.public_key()?, 8)?);
    lines.push("        Attributes:".to_string());
    let extensions = request.extensions()?;
    if extensions.is_empty() {
        lines.push("            (none)".to_string());
    } else {
        lines.push("            Requested Extensions:".to_string());
        for ext in &extensions {
            lines.extend(extension_lines(ext, 16)?);
        }
    }
    lines.push(format!(
        "    Signature Algorithm: {}",
        request.signature_algorithm()?.name()
    ));
    lines.push("    Signature Value:".to_string());
    lines.push(hex_block(request.inner.signature.raw_bytes(), 8));
    Ok(to_text(lines))
}

/// Text form of a private key, as `openssl pkey -text -noout`.
pub fn key_text(key: &KeyPair) -> Result<String> {
    let lines = match key {
        KeyPair::Rsa { private, public } => {
            let exponent = small_uint(public.e());
            let mut lines = vec![
                format!(
                    "Private-Key: ({} bit, {} primes)",
                    public.size() * 8,
                    private.primes().len()
                ),
                "modulus:".to_string(),
                hex_block(&unsigned_bytes(public.n()), 4),
                format!("publicExponent: {exponent} (0x{exponent:x})"),
                "privateExponent:".to_string(),
                hex_block(&unsigned_bytes(private.d()), 4),
            ];
            for (index, prime) in private.primes().iter().enumerate() {
                lines.push(format!("prime{}:", index + 1));
                lines.push(hex_block(&unsigned_bytes(prime), 4));
            }
            lines
        }
        KeyPair::EcdsaP256 { secret } => ec_key_lines(
            256,
            secret.to_bytes().as_slice(),
            secret.public_key().to_encoded_point(false).as_bytes(),
            "prime256v1",
            "P-256",
        ),
        KeyPair::EcdsaP384 { secret } => ec_key_lines(
            384,
            secret.to_bytes().as_slice(),
            secret.public_key().to_encoded_point(false).as_bytes(),
            "secp384r1",
            "P-384",
        ),
    };
    Ok(to_text(lines))
}

fn ec_key_lines(
    bits: usize,
    private: &[u8],
    point: &[u8],
    oid_name: &str,
    curve: &str,
) -> Vec<String> {
    vec![
        format!("Private-Key: ({bits} bit)"),
        "priv:".to_string(),
        hex_block(private, 4),
        "pub:".to_string(),
        hex_block(point, 4),
        format!("ASN1 OID: {oid_name}"),
        format!("NIST CURVE: {curve}"),
    ]
}

fn public_key_lines(key: &PublicKey, indent: usize) -> Result<Vec<String>> {
    let pad = " ".repeat(indent);
    let mut lines = vec![format!("{pad}Subject Public Key Info:")];
    match key {
        PublicKey::Rsa(public) => {
            let exponent = small_uint(public.e());
            lines.push(format!("{pad}    Public Key Algorithm: rsaEncryption"));
            lines.push(format!("{pad}        Public-Key: ({} bit)", key.bits()));
            lines.push(format!("{pad}        Modulus:"));
            lines.push(hex_block(&unsigned_bytes(public.n()), indent + 12));
            lines.push(format!("{pad}        Exponent: {exponent} (0x{exponent:x})"));
        }
        PublicKey::EcdsaP256(_) | PublicKey::EcdsaP384(_) => {
            let (oid_name, curve) = match key {
                PublicKey::EcdsaP256(_) => ("prime256v1", "P-256"),
                _ => ("secp384r1", "P-384"),
            };
            let spki = key.as_spki()?;
            lines.push(format!("{pad}    Public Key Algorithm: id-ecPublicKey"));
            lines.push(format!("{pad}        Public-Key: ({} bit)", key.bits()));
            lines.push(format!("{pad}        pub:"));
            lines.push(hex_block(spki.subject_public_key.raw_bytes(), indent + 12));
            lines.push(format!("{pad}        ASN1 OID: {oid_name}"));
            lines.push(format!("{pad}        NIST CURVE: {curve}"));
        }
    }
    Ok(lines)
}

fn extension_lines(ext: &ExtensionParam, indent: usize) -> Result<Vec<String>> {
    let pad = " ".repeat(indent);
    let critical = if ext.critical { " critical" } else { "" };
    let (title, body) = match ext.oid {
        BasicConstraints::OID => {
            let bc: BasicConstraints = ext.to_extension()?;
            let body = match bc.max_path_length {
                Some(len) => format!("CA:{}, pathlen:{len}", ca_flag(bc.is_ca)),
                None => format!("CA:{}", ca_flag(bc.is_ca)),
            };
            ("X509v3 Basic Constraints", body)
        }
        KeyUsage::OID => {
            let ku: KeyUsage = ext.to_extension()?;
            ("X509v3 Key Usage", ku.names().join(", "))
        }
        ExtendedKeyUsage::OID => {
            let eku: ExtendedKeyUsage = ext.to_extension()?;
            let names: Vec<&str> = eku.usage.iter().map(|usage| usage.name()).collect();
            ("X509v3 Extended Key Usage", names.join(", "))
        }
        SubjectKeyIdentifier::OID => {
            let ski: SubjectKeyIdentifier = ext.to_extension()?;
            ("X509v3 Subject Key Identifier", colon_hex(&ski.0, true))
        }
        AuthorityKeyIdentifier::OID => {
            let aki: AuthorityKeyIdentifier = ext.to_extension()?;
            (
                "X509v3 Authority Key Identifier",
                colon_hex(&aki.key_identifier, true),
            )
        }
        SubjectAltName::OID => {
            let san: SubjectAltName = ext.to_extension()?;
            ("X509v3 Subject Alternative Name", san.to_string())
        }
        _ => {
            return Ok(vec![
                format!("{pad}{}:{critical}", ext.oid),
                hex_block(&ext.value, indent + 4),
            ]);
        }
    };
    Ok(vec![format!("{pad}{title}:{critical}"), format!("{pad}    {body}")])
}

fn ca_flag(is_ca: bool) -> &'static str {
    if is_ca { "TRUE" } else { "FALSE" }
}

/// One line per entry, newline-terminated.
fn to_text(lines: Vec<String>) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Colon-separated hex, 15 bytes per line, each line indented by `indent`.
pub fn hex_block(bytes: &[u8], indent: usize) -> String {
    let pad = " ".repeat(indent);
    let lines: Vec<String> = bytes
        .chunks(BYTES_PER_LINE)
        .map(|chunk| format!("{pad}{}", colon_hex(chunk, false)))
        .collect();
    lines.join(":\n")
}

fn colon_hex(bytes: &[u8], upper: bool) -> String {
    let parts: Vec<String> = bytes
        .iter()
        .map(|b| {
            if upper {
                format!("{b:02X}")
            } else {
                format!("{b:02x}")
            }
        })
        .collect();
    parts.join(":")
}

/// Big-endian bytes with a leading zero when the high bit is set.
fn unsigned_bytes(value: &BigUint) -> Vec<u8> {
    let mut bytes = value.to_bytes_be();
    if bytes.first().is_some_and(|b| b & 0x80 != 0) {
        bytes.insert(0, 0);
    }
    bytes
}

fn small_uint(value: &BigUint) -> u64 {
    value
        .to_bytes_be()
        .iter()
        .fold(0u64, |acc, b| acc.wrapping_shl(8) | u64::from(*b))
}

/// `chk --cert`: signed by `ca`, issued under its name and currently valid.
pub fn check_certificate(cert: &Certificate, ca: &Certificate) -> Result<()> {
    if !cert.is_issued_by(ca)? {
        return Err(CaError::VerificationFailed(format!(
            "unable to get local issuer certificate for {}",
            cert.subject()
        )));
    }
    cert.verify_signed_by(&ca.public_key()?)?;
    check_validity(ca)?;
    check_validity(cert)
}

fn check_validity(cert: &Certificate) -> Result<()> {
    let validity = cert.validity();
    let now = OffsetDateTime::now_utc();
    if validity.contains(now) {
        return Ok(());
    }
    let state = if now < validity.not_before {
        "is not yet valid"
    } else {
        "has expired"
    };
    Err(CaError::VerificationFailed(format!(
        "certificate {} {state}",
        cert.subject()
    )))
}

/// `chk --req`: the self-signature verifies.
pub fn check_request(request: &CertificateRequest) -> Result<()> {
    request.verify()
}

/// `chk --key`: the key is internally consistent.
pub fn check_key(key: &KeyPair) -> Result<()> {
    key.check()
}

/// Line printed by `chk --key` on success.
pub fn key_ok_message(key: &KeyPair) -> &'static str {
    match key {
        KeyPair::Rsa { .. } => "RSA key ok",
        KeyPair::EcdsaP256 { .. } | KeyPair::EcdsaP384 { .. } => "EC Key valid.",
    }
}
