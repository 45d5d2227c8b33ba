use thiserror::Error;

/// PKI模块的错误类型
#[derive(Error, Debug)]
pub enum PkiError {
    /// 证书解析错误
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 证书链为空
    #[error("Certificate chain is empty")]
    EmptyChain,

    /// 证书链验证错误
    #[error("Chain validation error at position {index}: {reason}")]
    ChainError { index: usize, reason: String },

    /// 根证书不是自签名
    #[error("Root certificate is not self-signed: {0}")]
    RootNotSelfSigned(String),

    /// 签名验证失败
    #[error("Signature error: {0}")]
    SignatureError(String),

    /// 不支持的算法
    #[error("Unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// 密钥错误
    #[error("Key error: {0}")]
    KeyError(String),

    /// 证书生成错误
    #[error("Generation error: {0}")]
    GenerationError(String),

    /// 编码错误
    #[error("Encoding error: {0}")]
    EncodingError(#[from] der::Error),
}

/// Result类型别名
pub type Result<T> = std::result::Result<T, PkiError>;

impl PkiError {
    pub(crate) fn chain(index: usize, reason: impl Into<String>) -> Self {
        PkiError::ChainError {
            index,
            reason: reason.into(),
        }
    }
}
