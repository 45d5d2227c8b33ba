//! 远程配置组件接口
//!
//! The secure hardware component that generates attestation keys and signs
//! the CSR carrying them. Implementations live outside this crate.

use std::{collections::BTreeMap, sync::Arc};

use crate::{
    error::{ProvisioningError, Result},
    geek::GeekResponse,
    metrics::ProvisioningAttempt,
};

/// A freshly generated, not yet certified key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RkpKey {
    /// Component-wrapped private key handle
    pub key_blob: Vec<u8>,
    /// Raw public key; must match the leaf of the chain issued for it
    pub public_key: Vec<u8>,
}

/// Trait for remotely provisioned components
pub trait RemotelyProvisionedComponent: Send + Sync {
    /// Stable identifier used as the key store's component column.
    fn service_name(&self) -> &str;

    /// Maximum number of keys the component can fit in one CSR.
    fn get_batch_size(&self) -> Result<usize>;

    fn generate_key(&self, attempt: &mut ProvisioningAttempt) -> Result<RkpKey>;

    /// Build one signed CSR covering `keys`, in order.
    fn generate_csr(
        &self,
        attempt: &mut ProvisioningAttempt,
        geek: &GeekResponse,
        keys: &[RkpKey],
    ) -> Result<Vec<u8>>;
}

/// Components known to the daemon, keyed by service name.
#[derive(Default, Clone)]
pub struct ComponentRegistry {
    components: BTreeMap<String, Arc<dyn RemotelyProvisionedComponent>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any component already registered under the same name.
    pub fn register(&mut self, component: Arc<dyn RemotelyProvisionedComponent>) {
        self.components
            .insert(component.service_name().to_string(), component);
    }

    pub fn get(&self, service_name: &str) -> Result<Arc<dyn RemotelyProvisionedComponent>> {
        self.components
            .get(service_name)
            .cloned()
            .ok_or_else(|| ProvisioningError::UnknownComponent(service_name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn RemotelyProvisionedComponent>> {
        self.components.values()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}
