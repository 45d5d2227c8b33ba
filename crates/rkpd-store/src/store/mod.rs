mod sqlite;

use std::sync::Arc;

pub use sqlite::SqliteKeyStore;
use time::OffsetDateTime;

use crate::error::Result;
use crate::model::{BadCertTimeRange, BadCertWindowRecord, ProvisionedKey, PurgeOutcome};

/// Trait for provisioned-key storage backends (synchronous)
///
/// Every method is one transaction: it either fully applies or has no effect.
pub trait KeyStore: Send + Sync {
    /// Insert a batch of freshly provisioned keys. Every certificate chain is
    /// validated first; a single invalid chain rejects the whole batch.
    fn insert_keys(&self, keys: &[ProvisionedKey]) -> Result<()>;

    /// Return the unexpired key already bound to the tuple, or bind the
    /// unassigned, unexpired key with the lowest row id. `None` when the
    /// component has nothing left to hand out.
    fn get_or_assign_key(
        &self,
        component: &str,
        now: OffsetDateTime,
        client_uid: i32,
        irpc_uid: i32,
    ) -> Result<Option<ProvisionedKey>>;

    /// Look up the most recent key bound to the tuple without assigning.
    fn get_key_for_client_and_component(
        &self,
        component: &str,
        client_uid: i32,
        irpc_uid: i32,
    ) -> Result<Option<ProvisionedKey>>;

    fn total_keys_for_component(&self, component: &str) -> Result<usize>;

    /// Unassigned keys still valid at `now`.
    fn total_unassigned_keys_for_component(
        &self,
        component: &str,
        now: OffsetDateTime,
    ) -> Result<usize>;

    /// Every stored key ordered by row id (diagnostics).
    fn all_keys(&self) -> Result<Vec<ProvisionedKey>>;

    /// Hard reset; returns the number of deleted keys.
    fn delete_all_keys(&self) -> Result<usize>;

    /// Delete keys, assigned or not, whose expiration precedes `cutoff`.
    fn delete_expiring_keys(&self, cutoff: OffsetDateTime) -> Result<usize>;

    fn last_bad_cert_window(&self) -> Result<Option<BadCertWindowRecord>>;

    /// Record `window` as processed and delete every key whose leaf was issued
    /// inside it. A window equal to the recorded one is a no-op.
    fn purge_bad_cert_window(&self, window: &BadCertTimeRange) -> Result<PurgeOutcome>;
}

/// Key storage configuration
#[derive(Clone, Debug)]
pub enum KeyStoreConfig {
    Memory,
    File { path: std::path::PathBuf },
}

/// Factory function to create a key store based on configuration
pub fn create_key_store(config: KeyStoreConfig) -> Result<Arc<dyn KeyStore>> {
    match config {
        KeyStoreConfig::Memory => Ok(Arc::new(SqliteKeyStore::open_in_memory()?)),
        KeyStoreConfig::File { path } => Ok(Arc::new(SqliteKeyStore::open(path)?)),
    }
}
