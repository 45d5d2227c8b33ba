use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{Result, StoreError};

/// A provisioned attestation key as persisted by the store.
///
/// `key_blob` is the secure component's opaque handle to the private key, never
/// the key material itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedKey {
    /// Row id, `None` until the key has been inserted.
    pub id: Option<i64>,
    pub key_blob: Vec<u8>,
    /// Service name of the remotely provisioned component that owns the key.
    pub component: String,
    pub public_key: Vec<u8>,
    /// Concatenated DER certificates, leaf first.
    pub certificate_chain: Vec<u8>,
    #[serde(with = "time::serde::rfc3339")]
    pub expiration_time: OffsetDateTime,
    pub assignment: Option<KeyAssignment>,
}

impl ProvisionedKey {
    pub fn new(
        key_blob: Vec<u8>,
        component: impl Into<String>,
        public_key: Vec<u8>,
        certificate_chain: Vec<u8>,
        expiration_time: OffsetDateTime,
    ) -> Self {
        Self {
            id: None,
            key_blob,
            component: component.into(),
            public_key,
            certificate_chain,
            expiration_time,
            assignment: None,
        }
    }

    pub fn is_assigned(&self) -> bool {
        self.assignment.is_some()
    }

    /// A key may still be handed out at exactly its expiration instant.
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expiration_time < now
    }
}

/// The client a key has been bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAssignment {
    pub client_uid: i32,
    pub irpc_uid: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub assigned_at: OffsetDateTime,
}

/// Server-declared window of compromised certificate issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadCertTimeRange {
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
}

impl BadCertTimeRange {
    pub fn new(start: OffsetDateTime, end: OffsetDateTime) -> Result<Self> {
        if start > end {
            return Err(StoreError::InvalidRange(format!(
                "start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Inclusive on both ends.
    pub fn contains(&self, at: OffsetDateTime) -> bool {
        self.start <= at && at <= self.end
    }
}

/// The last processed window, as persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadCertWindowRecord {
    pub range: BadCertTimeRange,
    pub version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeOutcome {
    /// The window matched the recorded one; nothing was scanned.
    AlreadyProcessed,
    Purged { deleted: usize, version: u64 },
}

impl PurgeOutcome {
    pub fn deleted(&self) -> usize {
        match self {
            PurgeOutcome::AlreadyProcessed => 0,
            PurgeOutcome::Purged { deleted, .. } => *deleted,
        }
    }
}

pub(crate) fn to_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

pub(crate) fn from_millis(millis: i64) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(|e| StoreError::corrupt(format!("timestamp {millis} out of range: {e}")))
}
