use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use rkpd_provisioner::{ProvisioningConfig, Settings};
use rkpd_store::{create_key_store, KeyStore, KeyStoreConfig};

use crate::error::{CliError, CliResult};

/// Store and policy resolved from the command line and settings file.
pub struct Context {
    pub store: Arc<dyn KeyStore>,
    pub config: ProvisioningConfig,
    pub db_path: PathBuf,
}

impl Context {
    /// `--db` wins over the settings file; the settings file is optional
    /// when `--db` is given.
    pub fn open(config_path: &str, db_override: Option<PathBuf>) -> CliResult<Self> {
        let settings = if Path::new(config_path).exists() {
            Some(Settings::load(config_path)?)
        } else {
            None
        };

        let db_path = match (db_override, &settings) {
            (Some(path), _) => path,
            (None, Some(settings)) => settings.database.path.clone(),
            (None, None) => {
                return Err(CliError::InvalidInput(format!(
                    "{config_path} not found and no --db given"
                )))
            }
        };
        let config = settings.map(|s| s.provisioning).unwrap_or_default();

        tracing::debug!(db = %db_path.display(), "opening key store");
        let store = create_key_store(KeyStoreConfig::File {
            path: db_path.clone(),
        })?;
        Ok(Self {
            store,
            config,
            db_path,
        })
    }
}
