//! X.509 证书解析
//!
//! Attestation chains arrive as raw DER; this module turns a single certificate
//! into an [`X509Certificate`] carrying both the decoded ASN.1 structure and
//! the handful of fields the provisioning code reads.

use der::Encode;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use x509_cert::{time::Time, Certificate};

use crate::error::{PkiError, Result};

/// 证书信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateInfo {
    /// 序列号 (hex)
    pub serial_number: String,
    /// 主体 (RFC 4514)
    pub subject: String,
    /// 颁发者 (RFC 4514)
    pub issuer: String,
    /// 生效时间
    #[serde(with = "time::serde::rfc3339")]
    pub not_before: OffsetDateTime,
    /// 过期时间
    #[serde(with = "time::serde::rfc3339")]
    pub not_after: OffsetDateTime,
    /// 原始公钥字节 (subjectPublicKey BIT STRING contents)
    pub public_key: Vec<u8>,
    /// 签名算法 OID
    pub signature_algorithm: String,
}

impl CertificateInfo {
    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }
}

/// A decoded certificate together with its original encoding.
#[derive(Debug, Clone)]
pub struct X509Certificate {
    pub der_data: Vec<u8>,
    pub info: CertificateInfo,
    inner: Certificate,
}

impl X509Certificate {
    pub(crate) fn from_certificate(inner: Certificate) -> Result<Self> {
        let der_data = inner.to_der()?;
        let info = certificate_info(&inner)?;
        Ok(Self {
            der_data,
            info,
            inner,
        })
    }

    pub fn certificate(&self) -> &Certificate {
        &self.inner
    }

    /// The DER encoding of the TBSCertificate, i.e. the bytes covered by the signature.
    pub fn tbs_der(&self) -> Result<Vec<u8>> {
        Ok(self.inner.tbs_certificate.to_der()?)
    }

    pub fn signature_bytes(&self) -> Result<&[u8]> {
        self.inner
            .signature
            .as_bytes()
            .ok_or_else(|| PkiError::ParseError("Signature has unused bits".to_string()))
    }
}

fn certificate_info(cert: &Certificate) -> Result<CertificateInfo> {
    let tbs = &cert.tbs_certificate;

    Ok(CertificateInfo {
        serial_number: hex::encode(tbs.serial_number.as_bytes()),
        subject: tbs.subject.to_string(),
        issuer: tbs.issuer.to_string(),
        not_before: parse_time(&tbs.validity.not_before)?,
        not_after: parse_time(&tbs.validity.not_after)?,
        public_key: tbs
            .subject_public_key_info
            .subject_public_key
            .raw_bytes()
            .to_vec(),
        signature_algorithm: cert.signature_algorithm.oid.to_string(),
    })
}

// 辅助函数：解析时间
fn parse_time(time: &Time) -> Result<OffsetDateTime> {
    let since_epoch = time.to_unix_duration();
    let secs = i64::try_from(since_epoch.as_secs())
        .map_err(|_| PkiError::ParseError("Certificate time out of range".to_string()))?;
    OffsetDateTime::from_unix_timestamp(secs)
        .map_err(|e| PkiError::ParseError(format!("Invalid certificate time: {e}")))
}
