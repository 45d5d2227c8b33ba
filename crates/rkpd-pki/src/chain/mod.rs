//! 证书链解码与验证
//!
//! A provisioned key's chain is stored as the plain concatenation of DER
//! certificates, leaf first and self-signed root last. Validation checks that
//! every certificate names and is signed by its successor and that the root
//! signs itself. Validity periods are not checked here; expiry is tracked on
//! the stored key.

use der::{Decode, Reader, SliceReader};
use p256::ecdsa::signature::Verifier as _;
use time::OffsetDateTime;
use x509_cert::Certificate;

use crate::{
    cert::X509Certificate,
    error::{PkiError, Result},
};

/// 最大证书链深度
pub const MAX_CHAIN_LENGTH: usize = 8;

/// A decoded chain that has passed [`validate_chain`].
#[derive(Debug, Clone)]
pub struct CertificateChain {
    certificates: Vec<X509Certificate>,
}

impl CertificateChain {
    /// Decode and validate concatenated DER certificates.
    pub fn parse(encoded: &[u8]) -> Result<Self> {
        let certificates = decode_chain(encoded)?;
        validate_chain(&certificates)?;
        Ok(Self { certificates })
    }

    /// 获取叶子证书
    pub fn leaf(&self) -> &X509Certificate {
        &self.certificates[0]
    }

    /// 获取根证书
    pub fn root(&self) -> &X509Certificate {
        &self.certificates[self.certificates.len() - 1]
    }

    pub fn certificates(&self) -> &[X509Certificate] {
        &self.certificates
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// Re-concatenate the DER encodings.
    pub fn to_der(&self) -> Vec<u8> {
        self.certificates
            .iter()
            .flat_map(|cert| cert.der_data.iter().copied())
            .collect()
    }
}

/// Split concatenated DER certificates without validating them.
pub fn decode_chain(encoded: &[u8]) -> Result<Vec<X509Certificate>> {
    if encoded.is_empty() {
        return Err(PkiError::EmptyChain);
    }

    let mut reader = SliceReader::new(encoded)?;
    let mut certificates = Vec::new();

    while !reader.is_finished() {
        if certificates.len() == MAX_CHAIN_LENGTH {
            return Err(PkiError::chain(
                certificates.len(),
                format!("chain exceeds maximum length {MAX_CHAIN_LENGTH}"),
            ));
        }
        let cert = Certificate::decode(&mut reader)
            .map_err(|e| PkiError::chain(certificates.len(), format!("failed to decode: {e}")))?;
        certificates.push(X509Certificate::from_certificate(cert)?);
    }

    Ok(certificates)
}

/// 验证证书链
///
/// Each certificate at position `i` must name certificate `i + 1` as issuer
/// and carry a signature verifiable with its public key. The last certificate
/// must be self-issued and self-signed.
pub fn validate_chain(chain: &[X509Certificate]) -> Result<()> {
    let root = chain.last().ok_or(PkiError::EmptyChain)?;

    for (i, pair) in chain.windows(2).enumerate() {
        let (cert, issuer) = (&pair[0], &pair[1]);

        if cert.certificate().tbs_certificate.issuer
            != issuer.certificate().tbs_certificate.subject
        {
            return Err(PkiError::chain(
                i,
                format!(
                    "issuer '{}' does not match subject '{}' of the next certificate",
                    cert.info.issuer, issuer.info.subject
                ),
            ));
        }

        verify_signed_by(cert, issuer).map_err(|e| PkiError::chain(i, e.to_string()))?;
    }

    if !root.info.is_self_issued() {
        return Err(PkiError::RootNotSelfSigned(root.info.subject.clone()));
    }
    verify_signed_by(root, root).map_err(|e| PkiError::RootNotSelfSigned(e.to_string()))?;

    Ok(())
}

/// Issuance time (`notBefore`) of the first certificate in an encoded chain.
///
/// Only the leaf is decoded; the rest of the chain is not inspected.
pub fn leaf_not_before(encoded: &[u8]) -> Result<OffsetDateTime> {
    let mut reader = SliceReader::new(encoded)?;
    let leaf = Certificate::decode(&mut reader)
        .map_err(|e| PkiError::chain(0, format!("failed to decode: {e}")))?;
    Ok(X509Certificate::from_certificate(leaf)?.info.not_before)
}

/// Verify `cert`'s signature with `issuer`'s subject public key.
pub fn verify_signed_by(cert: &X509Certificate, issuer: &X509Certificate) -> Result<()> {
    let algorithm = cert.certificate().signature_algorithm.oid;
    let issuer_key = issuer
        .certificate()
        .tbs_certificate
        .subject_public_key_info
        .subject_public_key
        .raw_bytes();
    let tbs = cert.tbs_der()?;
    let signature = cert.signature_bytes()?;

    if algorithm == const_oid::db::rfc5912::ECDSA_WITH_SHA_256 {
        let verifying_key = p256::ecdsa::VerifyingKey::from_sec1_bytes(issuer_key)
            .map_err(|e| PkiError::KeyError(format!("Invalid P-256 issuer key: {e}")))?;
        let signature = p256::ecdsa::Signature::from_der(signature)
            .map_err(|e| PkiError::SignatureError(format!("Malformed ECDSA signature: {e}")))?;
        verifying_key
            .verify(&tbs, &signature)
            .map_err(|_| PkiError::SignatureError("ECDSA signature mismatch".to_string()))
    } else if algorithm == const_oid::db::rfc8410::ID_ED_25519 {
        let key_bytes: [u8; 32] = issuer_key.try_into().map_err(|_| {
            PkiError::KeyError(format!(
                "Invalid Ed25519 issuer key length: {}",
                issuer_key.len()
            ))
        })?;
        let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| PkiError::KeyError(format!("Invalid Ed25519 issuer key: {e}")))?;
        let signature = ed25519_dalek::Signature::from_slice(signature)
            .map_err(|e| PkiError::SignatureError(format!("Malformed Ed25519 signature: {e}")))?;
        verifying_key
            .verify(&tbs, &signature)
            .map_err(|_| PkiError::SignatureError("Ed25519 signature mismatch".to_string()))
    } else {
        Err(PkiError::UnsupportedAlgorithm(algorithm.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::testing::{truncate_to_seconds, TestCa};

    fn now() -> OffsetDateTime {
        truncate_to_seconds(OffsetDateTime::now_utc())
    }

    #[test]
    fn test_valid_chain_roundtrip() {
        let now = now();
        let ca = TestCa::new(now - Duration::days(10), now + Duration::days(10)).unwrap();
        let (_, encoded) = ca.issue_chain(now, now + Duration::days(1)).unwrap();

        let chain = CertificateChain::parse(&encoded).unwrap();
        assert_eq!(chain.len(), 2);
        assert!(chain.root().info.is_self_issued());
        assert_eq!(chain.to_der(), encoded);

        // Stored bytes must re-validate exactly as they did on admission.
        let reparsed = CertificateChain::parse(&chain.to_der()).unwrap();
        assert_eq!(reparsed.leaf().info, chain.leaf().info);
    }

    #[test]
    fn test_ed25519_chain() {
        let now = now();
        let ca = TestCa::with_algorithm(
            &rcgen::PKCS_ED25519,
            now - Duration::days(1),
            now + Duration::days(1),
        )
        .unwrap();
        let (key, encoded) = ca.issue_chain(now, now + Duration::hours(1)).unwrap();

        let chain = CertificateChain::parse(&encoded).unwrap();
        assert_eq!(chain.leaf().info.public_key, key.public_key_raw());
    }

    #[test]
    fn test_signature_from_wrong_root_is_rejected() {
        let now = now();
        let ca = TestCa::new(now - Duration::days(1), now + Duration::days(1)).unwrap();
        let other = TestCa::new(now - Duration::days(1), now + Duration::days(1)).unwrap();
        let key = crate::testing::generate_key_pair().unwrap();

        // Same distinguished names, different signing keys.
        let mut encoded = ca.issue_leaf(&key, now, now + Duration::hours(1)).unwrap();
        encoded.extend_from_slice(other.root_der());

        assert!(matches!(
            CertificateChain::parse(&encoded),
            Err(PkiError::ChainError { index: 0, .. })
        ));
    }

    #[test]
    fn test_root_must_be_self_signed() {
        let now = now();
        let ca = TestCa::new(now - Duration::days(1), now + Duration::days(1)).unwrap();
        let key = crate::testing::generate_key_pair().unwrap();
        let leaf_only = ca.issue_leaf(&key, now, now + Duration::hours(1)).unwrap();

        assert!(matches!(
            CertificateChain::parse(&leaf_only),
            Err(PkiError::RootNotSelfSigned(_))
        ));
    }

    #[test]
    fn test_truncated_and_empty_chains() {
        let now = now();
        let ca = TestCa::new(now - Duration::days(1), now + Duration::days(1)).unwrap();
        let (_, encoded) = ca.issue_chain(now, now + Duration::hours(1)).unwrap();

        assert!(matches!(decode_chain(&[]), Err(PkiError::EmptyChain)));
        assert!(CertificateChain::parse(&encoded[..encoded.len() - 3]).is_err());

        let mut trailing = encoded.clone();
        trailing.push(0x00);
        assert!(CertificateChain::parse(&trailing).is_err());
    }

    #[test]
    fn test_leaf_not_before() {
        let now = now();
        let ca = TestCa::new(now - Duration::days(30), now + Duration::days(30)).unwrap();
        let issued = now - Duration::days(3);
        let (_, encoded) = ca.issue_chain(issued, now + Duration::days(1)).unwrap();

        assert_eq!(leaf_not_before(&encoded).unwrap(), issued);
    }
}
