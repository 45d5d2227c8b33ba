use rkpd_pki::PkiError;
use thiserror::Error;

/// 存储模块的错误类型
#[derive(Error, Debug)]
pub enum StoreError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// 证书链无法通过准入验证
    #[error("Invalid certificate chain for key {key}: {source}")]
    InvalidChain {
        key: String,
        #[source]
        source: PkiError,
    },

    /// 分配冲突（比较并设置失败）
    #[error("Assignment conflict: {0}")]
    AssignmentConflict(String),

    /// 记录损坏
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// 无效的时间范围
    #[error("Invalid time range: {0}")]
    InvalidRange(String),

    /// 锁错误
    #[error("Lock error: {0}")]
    LockError(String),

    /// IO错误
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result类型别名
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn invalid_chain(key_blob: &[u8], source: PkiError) -> Self {
        StoreError::InvalidChain {
            key: hex::encode(&key_blob[..key_blob.len().min(8)]),
            source,
        }
    }

    pub fn lock_error(msg: impl std::fmt::Display) -> Self {
        StoreError::LockError(msg.to_string())
    }

    pub fn corrupt(msg: impl std::fmt::Display) -> Self {
        StoreError::CorruptRecord(msg.to_string())
    }
}
