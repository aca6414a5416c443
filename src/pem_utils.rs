//! PEM helpers for blocks that have no typed encoder in the certificate crates.

use crate::error::{CaError, Result};

pub const CERTIFICATE: &str = "CERTIFICATE";
pub const CERTIFICATE_REQUEST: &str = "CERTIFICATE REQUEST";
/// Label written by older OpenSSL releases for requests.
pub const NEW_CERTIFICATE_REQUEST: &str = "NEW CERTIFICATE REQUEST";

/// Convert DER‑encoded data into a PEM‑encoded string with the provided label.
pub fn der_to_pem(der: &[u8], label: &str) -> String {
    let pem = pem::Pem::new(label, der);
    pem::encode_config(
        &pem,
        pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF),
    )
}

/// Convert the first PEM block whose label is one of `labels` to DER bytes.
pub fn pem_to_der(pem_str: &str, labels: &[&str]) -> Result<Vec<u8>> {
    let blocks = pem::parse_many(pem_str)?;
    if blocks.is_empty() {
        return Err(CaError::DecodingError("no PEM data found".into()));
    }
    blocks
        .into_iter()
        .find(|block| labels.contains(&block.tag()))
        .map(|block| block.into_contents())
        .ok_or_else(|| CaError::DecodingError(format!("no {} PEM block found", labels.join(" or "))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_other_blocks() {
        let text = der_to_pem(b"key", "PRIVATE KEY") + &der_to_pem(b"cert", CERTIFICATE);
        assert!(!text.contains('\r'));
        assert_eq!(pem_to_der(&text, &[CERTIFICATE]).unwrap(), b"cert");
        assert!(pem_to_der(&text, &[CERTIFICATE_REQUEST]).is_err());
        assert!(pem_to_der("garbage", &[CERTIFICATE]).is_err());
    }
}
