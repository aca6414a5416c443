//! PKCS#10 certificate signing requests.

use const_oid::AssociatedOid;
use der::asn1::{Any, BitString, SetOfVec};
use der::{Decode, Encode};
use x509_cert::attr::Attribute;
use x509_cert::request::{CertReq, CertReqInfo, ExtensionReq, Version};

use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::SubjectAltName;
use crate::cert::params::{
    CertificationRequestInfo, DistinguishedName, ExtensionParam, find_extension,
};
use crate::error::Result;
use crate::hosts::Host;
use crate::key::{KeyPair, PublicKey};
use crate::pem_utils;

/// A signed certificate request, as written to `<name>.csr`.
#[derive(Debug, Clone)]
pub struct CertificateRequest {
    pub inner: CertReq,
}

impl CertificateRequest {
    /// Builds a request for `info` and signs it with `key`.
    ///
    /// Extensions in `info` travel in an `extensionRequest` attribute.
    pub fn new(info: &CertificationRequestInfo, key: &KeyPair) -> Result<Self> {
        let mut attributes = SetOfVec::new();
        if !info.extensions.is_empty() {
            let extensions = info
                .extensions
                .iter()
                .map(ExtensionParam::to_x509)
                .collect::<Result<Vec<_>>>()?;
            let value = Any::encode_from(&ExtensionReq(extensions))?;
            attributes.insert(Attribute {
                oid: ExtensionReq::OID,
                values: SetOfVec::try_from(vec![value])?,
            })?;
        }

        let req_info = CertReqInfo {
            version: Version::V1,
            subject: info.subject.as_x509_name()?,
            public_key: info.subject_public_key.as_spki()?,
            attributes,
        };

        let signature_algo = key.signature_algorithm();
        let signature = key.sign_data(&req_info.to_der()?)?;

        Ok(Self {
            inner: CertReq {
                info: req_info,
                algorithm: signature_algo.into(),
                signature: BitString::from_bytes(&signature)?,
            },
        })
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.inner.to_der()?)
    }

    pub fn to_pem(&self) -> Result<String> {
        Ok(pem_utils::der_to_pem(
            &self.to_der()?,
            pem_utils::CERTIFICATE_REQUEST,
        ))
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertReq::from_der(der)?,
        })
    }

    pub fn from_pem(text: &str) -> Result<Self> {
        Self::from_der(&pem_utils::pem_to_der(
            text,
            &[
                pem_utils::CERTIFICATE_REQUEST,
                pem_utils::NEW_CERTIFICATE_REQUEST,
            ],
        )?)
    }

    pub fn subject(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(&self.inner.info.subject)
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.info.public_key)
    }

    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::from_oid(&self.inner.algorithm.oid)
    }

    /// Extensions found in `extensionRequest` attributes.
    pub fn extensions(&self) -> Result<Vec<ExtensionParam>> {
        let mut extensions = Vec::new();
        for attribute in self.inner.info.attributes.iter() {
            if attribute.oid != ExtensionReq::OID {
                continue;
            }
            for value in attribute.values.iter() {
                let requested = ExtensionReq::from_der(&value.to_der()?)?;
                extensions.extend(requested.0.iter().map(ExtensionParam::from_x509));
            }
        }
        Ok(extensions)
    }

    /// Hosts asked for in the subject alternative name extension.
    pub fn subject_alt_names(&self) -> Result<Vec<Host>> {
        Ok(find_extension::<SubjectAltName>(&self.extensions()?)?
            .map(|san| san.names)
            .unwrap_or_default())
    }

    /// Checks the self-signature with the key embedded in the request.
    pub fn verify(&self) -> Result<()> {
        let message = self.inner.info.to_der()?;
        self.public_key()?.verify(
            &self.signature_algorithm()?,
            &message,
            self.inner.signature.raw_bytes(),
        )
    }

    /// The request as the issuing side sees it, before usages are applied.
    pub fn to_cert_info(&self) -> Result<CertificationRequestInfo> {
        Ok(CertificationRequestInfo::builder()
            .subject(self.subject())
            .subject_public_key(self.public_key()?)
            .extensions(self.extensions()?)
            .build())
    }
}
