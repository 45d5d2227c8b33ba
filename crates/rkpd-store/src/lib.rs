//! RKPD Store - 已配置密钥存储
//!
//! Persistent pool of remotely provisioned attestation keys: insertion with
//! chain admission checks, atomic client assignment, and bad-certificate
//! window purges.

pub mod error;
pub mod model;
pub mod store;

pub use error::{Result, StoreError};
pub use model::{
    BadCertTimeRange, BadCertWindowRecord, KeyAssignment, ProvisionedKey, PurgeOutcome,
};
pub use store::{create_key_store, KeyStore, KeyStoreConfig, SqliteKeyStore};
