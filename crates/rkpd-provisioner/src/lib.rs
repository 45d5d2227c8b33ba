//! RKPD Provisioner - 远程密钥配置引擎
//!
//! Keeps each remotely provisioned component stocked with certified
//! attestation keys and hands them out to clients.

pub mod assignment;
pub mod batch;
pub mod component;
pub mod config;
pub mod error;
pub mod geek;
pub mod metrics;
pub mod periodic;
pub mod provisioner;
pub mod server;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use assignment::KeyAssigner;
pub use component::{ComponentRegistry, RemotelyProvisionedComponent, RkpKey};
pub use config::{DatabaseCfg, ProvisioningConfig, Settings};
pub use error::{ProvisioningError, Result};
pub use geek::GeekResponse;
pub use metrics::{AttemptCause, AttemptStatus, ProvisioningAttempt};
pub use periodic::{ComponentReport, CycleReport, PeriodicProvisioner};
pub use provisioner::Provisioner;
pub use server::RemoteProvisioningServer;
