use std::path::PathBuf;

use rkpd_store::KeyStoreConfig;
use serde::Deserialize;
use time::Duration;
use toolcraft_config::load_settings;

use crate::error::Result;

pub const DEFAULT_EXTRA_SIGNED_KEYS: usize = 6;
pub const DEFAULT_EXPIRING_BY_SECS: u64 = 3 * 24 * 60 * 60;
pub const DEFAULT_URL: &str = "https://remoteprovisioning.googleapis.com/v1";

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub database: DatabaseCfg,
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseCfg {
    /// SQLite file; created on first use
    pub path: PathBuf,
}

/// Device provisioning policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    /// Unassigned keys to keep on hand per component
    pub extra_signed_keys_available: usize,
    /// Keys expiring within this horizon are dropped before provisioning
    pub expiring_by_secs: u64,
    /// Remote provisioning service endpoint
    pub url: String,
    /// Upper bound on keys per CSR, on top of what the component reports
    pub max_batch_size: Option<usize>,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            extra_signed_keys_available: DEFAULT_EXTRA_SIGNED_KEYS,
            expiring_by_secs: DEFAULT_EXPIRING_BY_SECS,
            url: DEFAULT_URL.to_string(),
            max_batch_size: None,
        }
    }
}

impl ProvisioningConfig {
    pub fn expiring_by(&self) -> Duration {
        Duration::seconds(self.expiring_by_secs.min(i64::MAX as u64) as i64)
    }

    /// Device config pushed by the server alongside the GEEK. Absent values
    /// leave the current setting in place.
    pub fn apply_server_config(&mut self, extra_keys: Option<u32>, time_to_refresh: Option<Duration>) {
        if let Some(extra) = extra_keys {
            self.extra_signed_keys_available = extra as usize;
        }
        if let Some(refresh) = time_to_refresh {
            if refresh.is_positive() {
                self.expiring_by_secs = refresh.whole_seconds() as u64;
            }
        }
    }
}

impl Settings {
    pub fn load(config_path: &str) -> Result<Self> {
        let r = load_settings(config_path)?;
        Ok(r)
    }

    pub fn key_store_config(&self) -> KeyStoreConfig {
        KeyStoreConfig::File {
            path: self.database.path.clone(),
        }
    }
}
