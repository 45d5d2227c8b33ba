use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Store error: {0}")]
    Store(#[from] rkpd_store::StoreError),

    #[error("Provisioning error: {0}")]
    Provisioning(#[from] rkpd_provisioner::ProvisioningError),

    #[error("Certificate error: {0}")]
    Pki(#[from] rkpd_pki::PkiError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Key not found: {0}")]
    KeyNotFound(i64),
}

pub type CliResult<T> = Result<T, CliError>;
