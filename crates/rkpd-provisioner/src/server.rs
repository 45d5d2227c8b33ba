use crate::{error::Result, geek::GeekResponse, metrics::ProvisioningAttempt};

/// Client for the remote provisioning service.
///
/// Both calls are blocking round trips. Transport failures surface as
/// `ProvisioningError::Network`, rejections as `ProvisioningError::Server`.
pub trait RemoteProvisioningServer: Send + Sync {
    fn fetch_geek(&self, attempt: &mut ProvisioningAttempt) -> Result<GeekResponse>;

    /// Submit one CSR and receive one encoded chain per key it carries, in
    /// the order the keys were placed in the CSR.
    fn request_signed_certificates(
        &self,
        csr: &[u8],
        challenge: &[u8],
        attempt: &mut ProvisioningAttempt,
    ) -> Result<Vec<Vec<u8>>>;
}
