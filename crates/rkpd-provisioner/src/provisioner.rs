//! 配置引擎
//!
//! Tops up a component's pool of unassigned keys through the remote
//! provisioning service and drops keys the service has declared compromised.

use std::{sync::Arc, time::Instant};

use rkpd_pki::CertificateChain;
use rkpd_store::{KeyStore, ProvisionedKey, PurgeOutcome};
use time::OffsetDateTime;

use crate::{
    batch::{chunk_sizes, effective_batch_size, keys_needed},
    component::{RemotelyProvisionedComponent, RkpKey},
    config::ProvisioningConfig,
    error::{ProvisioningError, Result},
    geek::GeekResponse,
    metrics::{AttemptStatus, ProvisioningAttempt},
    server::RemoteProvisioningServer,
};

pub struct Provisioner {
    store: Arc<dyn KeyStore>,
    server: Arc<dyn RemoteProvisioningServer>,
    config: ProvisioningConfig,
}

impl Provisioner {
    pub fn new(
        store: Arc<dyn KeyStore>,
        server: Arc<dyn RemoteProvisioningServer>,
        config: ProvisioningConfig,
    ) -> Self {
        Self {
            store,
            server,
            config,
        }
    }

    pub fn config(&self) -> &ProvisioningConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ProvisioningConfig {
        &mut self.config
    }

    pub fn store(&self) -> &Arc<dyn KeyStore> {
        &self.store
    }

    pub fn server(&self) -> &Arc<dyn RemoteProvisioningServer> {
        &self.server
    }

    /// Provision enough keys to bring `component`'s unassigned pool up to the
    /// configured size. Returns the number of keys stored.
    ///
    /// Batches are submitted in order and each is committed on its own; the
    /// first failing batch stops the run and earlier batches stay stored.
    pub fn provision_keys(
        &self,
        attempt: &mut ProvisioningAttempt,
        component: &dyn RemotelyProvisionedComponent,
        geek: &GeekResponse,
    ) -> Result<usize> {
        let result = self.provision_keys_inner(attempt, component, geek);
        match &result {
            Ok(0) => attempt.set_status(AttemptStatus::NoProvisioningNeeded),
            Ok(_) => attempt.set_status(AttemptStatus::KeysProvisioned),
            Err(e) => attempt.set_status(AttemptStatus::Failed(e.kind())),
        }
        result
    }

    fn provision_keys_inner(
        &self,
        attempt: &mut ProvisioningAttempt,
        component: &dyn RemotelyProvisionedComponent,
        geek: &GeekResponse,
    ) -> Result<usize> {
        let name = component.service_name();
        let unassigned = self
            .store
            .total_unassigned_keys_for_component(name, OffsetDateTime::now_utc())?;
        attempt.set_unassigned_before(unassigned);

        let needed = keys_needed(self.config.extra_signed_keys_available, unassigned);
        if needed == 0 {
            tracing::debug!(component = name, unassigned, "key pool is full");
            return Ok(0);
        }

        let reported = component.get_batch_size()?;
        if reported == 0 {
            return Err(ProvisioningError::RemoteComponent(format!(
                "{name} reported a batch size of 0"
            )));
        }
        let batch_size = effective_batch_size(reported, self.config.max_batch_size);
        let chunks = chunk_sizes(needed, batch_size);
        tracing::info!(
            component = name,
            unassigned,
            needed,
            batch_size,
            batches = chunks.len(),
            "provisioning attestation keys"
        );

        let mut stored = 0;
        for (index, &size) in chunks.iter().enumerate() {
            let records = self.provision_batch(attempt, component, geek, size)?;
            self.store.insert_keys(&records)?;
            attempt.record_keys_stored(records.len());
            stored += records.len();
            tracing::debug!(
                component = name,
                batch = index,
                keys = records.len(),
                "batch stored"
            );
        }
        Ok(stored)
    }

    fn provision_batch(
        &self,
        attempt: &mut ProvisioningAttempt,
        component: &dyn RemotelyProvisionedComponent,
        geek: &GeekResponse,
        size: usize,
    ) -> Result<Vec<ProvisionedKey>> {
        let mut keys = Vec::with_capacity(size);
        for _ in 0..size {
            keys.push(component.generate_key(attempt)?);
            attempt.record_key_generated();
        }
        let csr = component.generate_csr(attempt, geek, &keys)?;

        let started = Instant::now();
        let response = self
            .server
            .request_signed_certificates(&csr, &geek.challenge, attempt);
        attempt.add_server_wait(started.elapsed());
        let chains = response?;

        if chains.len() != keys.len() {
            return Err(ProvisioningError::malformed(format!(
                "expected {} certificate chains, got {}",
                keys.len(),
                chains.len()
            )));
        }

        keys.into_iter()
            .zip(chains)
            .enumerate()
            .map(|(position, (key, chain))| {
                certified_key(component.service_name(), key, chain, position)
            })
            .collect()
    }

    /// Apply the bad certificate window carried by `geek`, if any. Returns the
    /// number of keys deleted; a window already processed deletes nothing.
    pub fn clear_bad_attestation_keys(&self, geek: &GeekResponse) -> Result<usize> {
        let Some(window) = geek.bad_cert_window else {
            return Ok(0);
        };
        match self.store.purge_bad_cert_window(&window)? {
            PurgeOutcome::AlreadyProcessed => {
                tracing::debug!(
                    start = %window.start,
                    end = %window.end,
                    "bad cert window already processed"
                );
                Ok(0)
            }
            PurgeOutcome::Purged { deleted, .. } => Ok(deleted),
        }
    }
}

fn certified_key(
    component: &str,
    key: RkpKey,
    encoded_chain: Vec<u8>,
    position: usize,
) -> Result<ProvisionedKey> {
    let chain = CertificateChain::parse(&encoded_chain).map_err(|e| {
        ProvisioningError::malformed(format!("chain {position} does not validate: {e}"))
    })?;
    let leaf = &chain.leaf().info;
    if leaf.public_key != key.public_key {
        return Err(ProvisioningError::malformed(format!(
            "chain {position} certifies a different public key"
        )));
    }

    Ok(ProvisionedKey::new(
        key.key_blob,
        component,
        key.public_key,
        encoded_chain,
        leaf.not_after,
    ))
}
