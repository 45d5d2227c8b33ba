//! Helpers for building real attestation chains in tests.
//!
//! Enabled for this crate's own tests and, for dependents, through the
//! `testutil` feature.

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    KeyUsagePurpose, SignatureAlgorithm,
};
use time::OffsetDateTime;

use crate::error::{PkiError, Result};

/// Drop sub-second precision; X.509 validity times only carry seconds.
pub fn truncate_to_seconds(at: OffsetDateTime) -> OffsetDateTime {
    at.replace_nanosecond(0).unwrap_or(at)
}

/// Generate a P-256 key pair suitable for a leaf certificate.
pub fn generate_key_pair() -> Result<KeyPair> {
    KeyPair::generate().map_err(generation_error)
}

/// A self-signed root able to issue two-certificate chains.
pub struct TestCa {
    key: KeyPair,
    cert: Certificate,
}

impl TestCa {
    /// P-256 root valid over `[not_before, not_after]`.
    pub fn new(not_before: OffsetDateTime, not_after: OffsetDateTime) -> Result<Self> {
        let key = KeyPair::generate().map_err(generation_error)?;
        Self::from_key(key, not_before, not_after)
    }

    pub fn with_algorithm(
        algorithm: &'static SignatureAlgorithm,
        not_before: OffsetDateTime,
        not_after: OffsetDateTime,
    ) -> Result<Self> {
        let key = KeyPair::generate_for(algorithm).map_err(generation_error)?;
        Self::from_key(key, not_before, not_after)
    }

    fn from_key(key: KeyPair, not_before: OffsetDateTime, not_after: OffsetDateTime) -> Result<Self> {
        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::OrganizationName, "RKP Test");
        dn.push(DnType::CommonName, "RKP Test Root");
        params.distinguished_name = dn;
        params.not_before = not_before;
        params.not_after = not_after;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];

        let cert = params.self_signed(&key).map_err(generation_error)?;
        Ok(Self { key, cert })
    }

    pub fn root_der(&self) -> &[u8] {
        self.cert.der()
    }

    /// Sign a leaf certificate for `subject_key`; returns the leaf DER only.
    pub fn issue_leaf(
        &self,
        subject_key: &KeyPair,
        not_before: OffsetDateTime,
        not_after: OffsetDateTime,
    ) -> Result<Vec<u8>> {
        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::OrganizationName, "AVF");
        dn.push(DnType::CommonName, "Attestation Key");
        params.distinguished_name = dn;
        params.not_before = not_before;
        params.not_after = not_after;
        params.is_ca = IsCa::NoCa;
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature];

        let leaf = params
            .signed_by(subject_key, &self.cert, &self.key)
            .map_err(generation_error)?;
        Ok(leaf.der().to_vec())
    }

    /// `leaf || root` for `subject_key`.
    pub fn chain_for(
        &self,
        subject_key: &KeyPair,
        not_before: OffsetDateTime,
        not_after: OffsetDateTime,
    ) -> Result<Vec<u8>> {
        let mut encoded = self.issue_leaf(subject_key, not_before, not_after)?;
        encoded.extend_from_slice(self.root_der());
        Ok(encoded)
    }

    /// Fresh leaf key plus its `leaf || root` chain.
    pub fn issue_chain(
        &self,
        not_before: OffsetDateTime,
        not_after: OffsetDateTime,
    ) -> Result<(KeyPair, Vec<u8>)> {
        let key = KeyPair::generate_for(self.key.algorithm()).map_err(generation_error)?;
        let chain = self.chain_for(&key, not_before, not_after)?;
        Ok((key, chain))
    }
}

fn generation_error(e: rcgen::Error) -> PkiError {
    PkiError::GenerationError(e.to_string())
}
