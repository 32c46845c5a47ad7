use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Vault configuration error: {0}")]
    Configuration(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),
}

/// A persisted enum tag did not match any known variant.
#[derive(Error, Debug)]
#[error("Unknown {what}: {value}")]
pub struct UnknownVariant {
    pub what: &'static str,
    pub value: String,
}
