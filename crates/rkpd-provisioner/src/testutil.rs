//! In-process stand-ins for the secure component and the remote service.
//!
//! `FakeComponent` keeps each private key in its key blob (PKCS#8 DER) and
//! encodes the CSR as JSON, so `FakeRkpServer` can recover the keys and have
//! its test CA certify them. Neither is secure; they exist for tests.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex,
};

use rcgen::KeyPair;
use rkpd_pki::testing::{truncate_to_seconds, TestCa};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{
    component::{RemotelyProvisionedComponent, RkpKey},
    error::{ProvisioningError, Result},
    geek::GeekResponse,
    metrics::ProvisioningAttempt,
    server::RemoteProvisioningServer,
};

#[derive(Debug, Serialize, Deserialize)]
struct FakeCsr {
    challenge: Vec<u8>,
    key_blobs: Vec<Vec<u8>>,
}

pub struct FakeComponent {
    name: String,
    batch_size: usize,
    fail_batch_size: AtomicBool,
    fail_key_generation: AtomicBool,
    csr_batches: Mutex<Vec<usize>>,
}

impl FakeComponent {
    pub fn new(name: impl Into<String>, batch_size: usize) -> Self {
        Self {
            name: name.into(),
            batch_size,
            fail_batch_size: AtomicBool::new(false),
            fail_key_generation: AtomicBool::new(false),
            csr_batches: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_batch_size(&self, fail: bool) {
        self.fail_batch_size.store(fail, Ordering::SeqCst);
    }

    pub fn fail_key_generation(&self, fail: bool) {
        self.fail_key_generation.store(fail, Ordering::SeqCst);
    }

    /// Number of keys in each CSR built so far, in call order.
    pub fn csr_batches(&self) -> Vec<usize> {
        self.csr_batches
            .lock()
            .map(|batches| batches.clone())
            .unwrap_or_default()
    }
}

impl RemotelyProvisionedComponent for FakeComponent {
    fn service_name(&self) -> &str {
        &self.name
    }

    fn get_batch_size(&self) -> Result<usize> {
        if self.fail_batch_size.load(Ordering::SeqCst) {
            return Err(ProvisioningError::RemoteComponent(format!(
                "{} did not report a batch size",
                self.name
            )));
        }
        Ok(self.batch_size)
    }

    fn generate_key(&self, _attempt: &mut ProvisioningAttempt) -> Result<RkpKey> {
        if self.fail_key_generation.load(Ordering::SeqCst) {
            return Err(ProvisioningError::KeyGeneration("component refused".into()));
        }
        let pair = KeyPair::generate().map_err(|e| ProvisioningError::KeyGeneration(e.to_string()))?;
        Ok(RkpKey {
            key_blob: pair.serialize_der(),
            public_key: pair.public_key_raw().to_vec(),
        })
    }

    fn generate_csr(
        &self,
        _attempt: &mut ProvisioningAttempt,
        geek: &GeekResponse,
        keys: &[RkpKey],
    ) -> Result<Vec<u8>> {
        let csr = FakeCsr {
            challenge: geek.challenge.clone(),
            key_blobs: keys.iter().map(|k| k.key_blob.clone()).collect(),
        };
        let encoded =
            serde_json::to_vec(&csr).map_err(|e| ProvisioningError::CsrSigning(e.to_string()))?;
        if let Ok(mut batches) = self.csr_batches.lock() {
            batches.push(keys.len());
        }
        Ok(encoded)
    }
}

/// How `FakeRkpServer` answers certificate requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    Ok,
    Unreachable,
    Reject,
    /// One chain short of the number of keys.
    DropLastChain,
    /// First two chains swapped.
    SwapChains,
    /// Last chain truncated.
    CorruptChain,
    /// Serve this many certificate requests, then reject.
    FailAfter(usize),
}

pub struct FakeRkpServer {
    ca: TestCa,
    geek: Mutex<GeekResponse>,
    mode: Mutex<ServerMode>,
    issue_time: Mutex<Option<OffsetDateTime>>,
    validity: Duration,
    requests: AtomicUsize,
}

impl FakeRkpServer {
    pub fn new() -> rkpd_pki::Result<Self> {
        let now = truncate_to_seconds(OffsetDateTime::now_utc());
        let ca = TestCa::new(now - Duration::days(365), now + Duration::days(365))?;
        Ok(Self {
            ca,
            geek: Mutex::new(GeekResponse::new(b"fake-challenge".to_vec(), b"fake-geek".to_vec())),
            mode: Mutex::new(ServerMode::Ok),
            issue_time: Mutex::new(None),
            validity: Duration::days(30),
            requests: AtomicUsize::new(0),
        })
    }

    pub fn set_mode(&self, mode: ServerMode) {
        if let Ok(mut current) = self.mode.lock() {
            *current = mode;
        }
    }

    pub fn set_geek(&self, geek: GeekResponse) {
        if let Ok(mut current) = self.geek.lock() {
            *current = geek;
        }
    }

    /// Issue subsequent leaves with this `notBefore` instead of the current time.
    pub fn set_issue_time(&self, at: OffsetDateTime) {
        if let Ok(mut current) = self.issue_time.lock() {
            *current = Some(truncate_to_seconds(at));
        }
    }

    /// Certificate requests received, including rejected ones.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn root_der(&self) -> &[u8] {
        self.ca.root_der()
    }

    fn mode(&self) -> Result<ServerMode> {
        self.mode
            .lock()
            .map(|mode| *mode)
            .map_err(|_| ProvisioningError::Server("fake server state poisoned".into()))
    }

    fn issue_window(&self) -> (OffsetDateTime, OffsetDateTime) {
        let not_before = self
            .issue_time
            .lock()
            .ok()
            .and_then(|at| *at)
            .unwrap_or_else(|| truncate_to_seconds(OffsetDateTime::now_utc()) - Duration::minutes(1));
        (not_before, not_before + self.validity)
    }
}

impl RemoteProvisioningServer for FakeRkpServer {
    fn fetch_geek(&self, _attempt: &mut ProvisioningAttempt) -> Result<GeekResponse> {
        if self.mode()? == ServerMode::Unreachable {
            return Err(ProvisioningError::Network("connection refused".into()));
        }
        self.geek
            .lock()
            .map(|geek| geek.clone())
            .map_err(|_| ProvisioningError::Server("fake server state poisoned".into()))
    }

    fn request_signed_certificates(
        &self,
        csr: &[u8],
        challenge: &[u8],
        _attempt: &mut ProvisioningAttempt,
    ) -> Result<Vec<Vec<u8>>> {
        let served = self.requests.fetch_add(1, Ordering::SeqCst);
        let mode = self.mode()?;
        match mode {
            ServerMode::Unreachable => {
                return Err(ProvisioningError::Network("connection refused".into()))
            }
            ServerMode::Reject => return Err(ProvisioningError::Server("HTTP 400".into())),
            ServerMode::FailAfter(limit) if served >= limit => {
                return Err(ProvisioningError::Server("HTTP 503".into()))
            }
            _ => {}
        }

        let csr: FakeCsr =
            serde_json::from_slice(csr).map_err(|e| ProvisioningError::Server(e.to_string()))?;
        if csr.challenge != challenge {
            return Err(ProvisioningError::Server("challenge mismatch".into()));
        }

        let (not_before, not_after) = self.issue_window();
        let mut chains = csr
            .key_blobs
            .iter()
            .map(|blob| {
                let pair = KeyPair::try_from(blob.as_slice())
                    .map_err(|e| ProvisioningError::Server(e.to_string()))?;
                self.ca
                    .chain_for(&pair, not_before, not_after)
                    .map_err(|e| ProvisioningError::Server(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        match mode {
            ServerMode::DropLastChain => {
                chains.pop();
            }
            ServerMode::SwapChains if chains.len() > 1 => chains.swap(0, 1),
            ServerMode::CorruptChain => {
                if let Some(last) = chains.last_mut() {
                    last.truncate(last.len() / 2);
                }
            }
            _ => {}
        }
        Ok(chains)
    }
}
