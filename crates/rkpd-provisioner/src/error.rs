use rkpd_store::StoreError;
use thiserror::Error;

/// 配置流程的错误类型
#[derive(Error, Debug)]
pub enum ProvisioningError {
    /// 远程配置组件调用失败
    #[error("Remote component error: {0}")]
    RemoteComponent(String),

    /// 密钥生成失败
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// CSR 签名失败
    #[error("CSR signing failed: {0}")]
    CsrSigning(String),

    /// 无法连接远程服务
    #[error("Network error: {0}")]
    Network(String),

    /// 远程服务拒绝请求
    #[error("Server error: {0}")]
    Server(String),

    /// 远程服务返回的证书链无效
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// 没有可分配的密钥
    #[error("No attestation keys available for {component}")]
    NoKeysAvailable { component: String },

    /// 未注册的组件
    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    /// 存储错误
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// 配置错误
    #[error("Config error: {0}")]
    Config(#[from] toolcraft_config::error::Error),
}

/// Result类型别名
pub type Result<T> = std::result::Result<T, ProvisioningError>;

impl ProvisioningError {
    /// Stable label for telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            ProvisioningError::RemoteComponent(_) => "remote_component",
            ProvisioningError::KeyGeneration(_) => "key_generation",
            ProvisioningError::CsrSigning(_) => "csr_signing",
            ProvisioningError::Network(_) => "network",
            ProvisioningError::Server(_) => "server",
            ProvisioningError::MalformedResponse(_) => "malformed_response",
            ProvisioningError::NoKeysAvailable { .. } => "no_keys_available",
            ProvisioningError::UnknownComponent(_) => "unknown_component",
            ProvisioningError::Store(_) => "store",
            ProvisioningError::Config(_) => "config",
        }
    }

    pub fn malformed(msg: impl std::fmt::Display) -> Self {
        ProvisioningError::MalformedResponse(msg.to_string())
    }
}
