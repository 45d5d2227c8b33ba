//! Per-attempt provisioning telemetry.

use std::{
    fmt,
    time::{Duration, Instant},
};

/// What triggered the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptCause {
    Scheduled,
    KeyConsumed,
    OutOfKeys,
    Manual,
}

impl fmt::Display for AttemptCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttemptCause::Scheduled => "scheduled",
            AttemptCause::KeyConsumed => "key_consumed",
            AttemptCause::OutOfKeys => "out_of_keys",
            AttemptCause::Manual => "manual",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    Unknown,
    KeysProvisioned,
    NoProvisioningNeeded,
    ProvisioningDisabled,
    /// Carries `ProvisioningError::kind()`.
    Failed(&'static str),
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptStatus::Unknown => f.write_str("unknown"),
            AttemptStatus::KeysProvisioned => f.write_str("keys_provisioned"),
            AttemptStatus::NoProvisioningNeeded => f.write_str("no_provisioning_needed"),
            AttemptStatus::ProvisioningDisabled => f.write_str("provisioning_disabled"),
            AttemptStatus::Failed(kind) => write!(f, "failed:{kind}"),
        }
    }
}

/// Telemetry context threaded through one provisioning attempt.
///
/// Callers record counters as they go and call [`finish`](Self::finish)
/// once; that emits a single structured `tracing` event.
#[derive(Debug)]
pub struct ProvisioningAttempt {
    cause: AttemptCause,
    component: Option<String>,
    started: Instant,
    unassigned_before: Option<usize>,
    keys_generated: usize,
    keys_stored: usize,
    server_wait: Duration,
    status: AttemptStatus,
}

impl ProvisioningAttempt {
    pub fn new(cause: AttemptCause) -> Self {
        Self {
            cause,
            component: None,
            started: Instant::now(),
            unassigned_before: None,
            keys_generated: 0,
            keys_stored: 0,
            server_wait: Duration::ZERO,
            status: AttemptStatus::Unknown,
        }
    }

    pub fn for_component(cause: AttemptCause, component: impl Into<String>) -> Self {
        Self {
            component: Some(component.into()),
            ..Self::new(cause)
        }
    }

    pub fn cause(&self) -> AttemptCause {
        self.cause
    }

    pub fn component(&self) -> Option<&str> {
        self.component.as_deref()
    }

    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    pub fn keys_generated(&self) -> usize {
        self.keys_generated
    }

    pub fn keys_stored(&self) -> usize {
        self.keys_stored
    }

    pub fn server_wait(&self) -> Duration {
        self.server_wait
    }

    pub fn set_unassigned_before(&mut self, count: usize) {
        self.unassigned_before = Some(count);
    }

    pub fn record_key_generated(&mut self) {
        self.keys_generated += 1;
    }

    pub fn record_keys_stored(&mut self, count: usize) {
        self.keys_stored += count;
    }

    pub fn add_server_wait(&mut self, wait: Duration) {
        self.server_wait += wait;
    }

    pub fn set_status(&mut self, status: AttemptStatus) {
        self.status = status;
    }

    pub fn finish(self) {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        let server_wait_ms = self.server_wait.as_millis() as u64;
        let component = self.component.as_deref().unwrap_or("-");

        match self.status {
            AttemptStatus::Failed(_) => tracing::warn!(
                cause = %self.cause,
                component,
                status = %self.status,
                keys_generated = self.keys_generated,
                keys_stored = self.keys_stored,
                unassigned_before = ?self.unassigned_before,
                server_wait_ms,
                elapsed_ms,
                "provisioning attempt finished"
            ),
            _ => tracing::info!(
                cause = %self.cause,
                component,
                status = %self.status,
                keys_generated = self.keys_generated,
                keys_stored = self.keys_stored,
                unassigned_before = ?self.unassigned_before,
                server_wait_ms,
                elapsed_ms,
                "provisioning attempt finished"
            ),
        }
    }
}
