use std::sync::Arc;

use rkpd_store::{KeyStore, ProvisionedKey};
use time::OffsetDateTime;

use crate::error::{ProvisioningError, Result};

/// Hands stored keys out to clients. Never provisions.
#[derive(Clone)]
pub struct KeyAssigner {
    store: Arc<dyn KeyStore>,
}

impl KeyAssigner {
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self { store }
    }

    /// The key already bound to `(component, client_uid, irpc_uid)` if it is
    /// still valid, otherwise a newly bound one.
    pub fn get_or_assign_key(
        &self,
        component: &str,
        now: OffsetDateTime,
        client_uid: i32,
        irpc_uid: i32,
    ) -> Result<ProvisionedKey> {
        self.store
            .get_or_assign_key(component, now, client_uid, irpc_uid)?
            .ok_or_else(|| {
                tracing::warn!(component, client_uid, irpc_uid, "attestation key pool exhausted");
                ProvisioningError::NoKeysAvailable {
                    component: component.to_string(),
                }
            })
    }

    pub fn get_key_for_client_and_component(
        &self,
        component: &str,
        client_uid: i32,
        irpc_uid: i32,
    ) -> Result<Option<ProvisionedKey>> {
        Ok(self
            .store
            .get_key_for_client_and_component(component, client_uid, irpc_uid)?)
    }

    pub fn total_keys(&self, component: &str) -> Result<usize> {
        Ok(self.store.total_keys_for_component(component)?)
    }

    pub fn unassigned_keys(&self, component: &str, now: OffsetDateTime) -> Result<usize> {
        Ok(self.store.total_unassigned_keys_for_component(component, now)?)
    }

    pub fn all_keys(&self) -> Result<Vec<ProvisionedKey>> {
        Ok(self.store.all_keys()?)
    }

    pub fn delete_all_keys(&self) -> Result<usize> {
        Ok(self.store.delete_all_keys()?)
    }
}
