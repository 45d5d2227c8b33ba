//! 周期性配置
//!
//! One scheduled provisioning cycle. Deciding when to run it is left to the
//! caller's timer.

use std::time::Instant;

use time::OffsetDateTime;

use crate::{
    component::ComponentRegistry,
    error::{ProvisioningError, Result},
    metrics::{AttemptCause, AttemptStatus, ProvisioningAttempt},
    provisioner::Provisioner,
};

/// Result of provisioning one component within a cycle.
#[derive(Debug)]
pub struct ComponentReport {
    pub component: String,
    pub outcome: std::result::Result<usize, ProvisioningError>,
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub provisioning_disabled: bool,
    pub bad_keys_deleted: usize,
    pub expiring_keys_deleted: usize,
    pub components: Vec<ComponentReport>,
}

impl CycleReport {
    pub fn keys_provisioned(&self) -> usize {
        self.components
            .iter()
            .filter_map(|report| report.outcome.as_ref().ok())
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ComponentReport> {
        self.components.iter().filter(|report| report.outcome.is_err())
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

pub struct PeriodicProvisioner {
    provisioner: Provisioner,
    registry: ComponentRegistry,
}

impl PeriodicProvisioner {
    pub fn new(provisioner: Provisioner, registry: ComponentRegistry) -> Self {
        Self {
            provisioner,
            registry,
        }
    }

    pub fn provisioner(&self) -> &Provisioner {
        &self.provisioner
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Run one cycle: fetch the GEEK, apply the server's device config and
    /// bad certificate window, drop keys about to expire, then top up every
    /// registered component.
    ///
    /// Failures fetching the GEEK or touching the store abort the cycle. A
    /// component that fails to provision is reported and the cycle moves on.
    pub fn run_once(&mut self, cause: AttemptCause) -> Result<CycleReport> {
        let mut report = CycleReport::default();

        let mut fetch_attempt = ProvisioningAttempt::new(cause);
        let started = Instant::now();
        let fetched = self.provisioner.server().fetch_geek(&mut fetch_attempt);
        fetch_attempt.add_server_wait(started.elapsed());
        let geek = match fetched {
            Ok(geek) => geek,
            Err(e) => {
                fetch_attempt.set_status(AttemptStatus::Failed(e.kind()));
                fetch_attempt.finish();
                return Err(e);
            }
        };

        if geek.provisioning_disabled() {
            let deleted = self.provisioner.store().delete_all_keys()?;
            tracing::warn!(deleted, "provisioning disabled by server, key pool cleared");
            fetch_attempt.set_status(AttemptStatus::ProvisioningDisabled);
            fetch_attempt.finish();
            report.provisioning_disabled = true;
            return Ok(report);
        }
        fetch_attempt.finish();

        self.provisioner
            .config_mut()
            .apply_server_config(geek.num_extra_attestation_keys, geek.time_to_refresh);

        report.bad_keys_deleted = self.provisioner.clear_bad_attestation_keys(&geek)?;

        let cutoff = OffsetDateTime::now_utc() + self.provisioner.config().expiring_by();
        report.expiring_keys_deleted = self.provisioner.store().delete_expiring_keys(cutoff)?;

        for component in self.registry.iter() {
            let name = component.service_name().to_string();
            let mut attempt = ProvisioningAttempt::for_component(cause, name.clone());
            let outcome = self
                .provisioner
                .provision_keys(&mut attempt, component.as_ref(), &geek);
            attempt.finish();

            match outcome {
                Err(e @ ProvisioningError::Store(_)) => return Err(e),
                Err(e) => {
                    tracing::error!(component = %name, error = %e, "provisioning failed");
                    report.components.push(ComponentReport {
                        component: name,
                        outcome: Err(e),
                    });
                }
                Ok(stored) => report.components.push(ComponentReport {
                    component: name,
                    outcome: Ok(stored),
                }),
            }
        }

        tracing::info!(
            bad_keys_deleted = report.bad_keys_deleted,
            expiring_keys_deleted = report.expiring_keys_deleted,
            keys_provisioned = report.keys_provisioned(),
            failed_components = report.failures().count(),
            "provisioning cycle complete"
        );
        Ok(report)
    }
}
