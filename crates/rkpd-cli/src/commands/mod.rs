pub mod bad_window;
pub mod clear;
pub mod list;
pub mod purge_expiring;
pub mod show;
pub mod status;

use time::{format_description::well_known::Rfc3339, OffsetDateTime};

pub(crate) fn format_time(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.to_string())
}

/// First bytes of a blob, for display.
pub(crate) fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(&bytes[..bytes.len().min(8)])
}
