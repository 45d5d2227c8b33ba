//! RKPD PKI - 证书链解析与验证
//!
//! Decodes and validates the X.509 chains returned by the remote provisioning
//! service for each attestation key.

pub mod cert;
pub mod chain;
pub mod error;
#[cfg(any(test, feature = "testutil"))]
pub mod testing;

pub use cert::{CertificateInfo, X509Certificate};
pub use chain::{
    decode_chain, leaf_not_before, validate_chain, verify_signed_by, CertificateChain,
    MAX_CHAIN_LENGTH,
};
pub use error::{PkiError, Result};
