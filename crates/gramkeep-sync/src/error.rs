use gramkeep_shared::VaultError;
use gramkeep_store::StoreError;
use thiserror::Error;

use crate::session::SessionError;

/// Errors produced by the sync engine.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Bad deployment or caller configuration (missing vault key,
    /// incomplete API credentials).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The remote endpoint could not be reached or answered with an
    /// error that is not an authentication failure.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The stored session secret was rejected.  Retrying will not help;
    /// the account needs to be re-authenticated.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Another sync pass for the same account is still running.
    #[error("A sync for this account is already in progress")]
    SyncInProgress,

    /// Credential vault failure (bad key or undecryptable envelope).
    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    /// Store layer failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Media download or local media storage failure.
    #[error("Media error: {0}")]
    Media(String),

    /// A media payload exceeded the configured size limit.
    #[error("Media of {size} bytes exceeds limit of {max} bytes")]
    MediaTooLarge { size: usize, max: usize },
}

impl From<SessionError> for SyncError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::Auth(msg) => SyncError::Auth(msg),
            SessionError::Connection(msg) | SessionError::Remote(msg) => {
                SyncError::Connection(msg)
            }
            SessionError::Media(msg) => SyncError::Media(msg),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SyncError>;
