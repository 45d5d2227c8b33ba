use rkpd_store::BadCertTimeRange;
use time::Duration;

/// Parameters returned by the first half of the provisioning exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeekResponse {
    /// Binds the CSR to this session; echoed back on submission.
    pub challenge: Vec<u8>,
    /// Server key-exchange material, opaque to everything but the component.
    pub geek_chain: Vec<u8>,
    pub bad_cert_window: Option<BadCertTimeRange>,
    /// `Some(0)` means the server has disabled provisioning for this device.
    pub num_extra_attestation_keys: Option<u32>,
    pub time_to_refresh: Option<Duration>,
}

impl GeekResponse {
    pub fn new(challenge: Vec<u8>, geek_chain: Vec<u8>) -> Self {
        Self {
            challenge,
            geek_chain,
            bad_cert_window: None,
            num_extra_attestation_keys: None,
            time_to_refresh: None,
        }
    }

    pub fn with_bad_cert_window(mut self, window: BadCertTimeRange) -> Self {
        self.bad_cert_window = Some(window);
        self
    }

    pub fn with_device_config(mut self, extra_keys: u32, time_to_refresh: Duration) -> Self {
        self.num_extra_attestation_keys = Some(extra_keys);
        self.time_to_refresh = Some(time_to_refresh);
        self
    }

    pub fn provisioning_disabled(&self) -> bool {
        self.num_extra_attestation_keys == Some(0)
    }
}
