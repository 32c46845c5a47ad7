//! Sync engine configuration loaded from environment variables.
//!
//! Everything has a development default except the vault key: with no
//! `GRAMKEEP_SESSION_KEY` every envelope operation fails, so accounts can
//! be listed but never connected.

use std::path::PathBuf;

use gramkeep_shared::constants::{DEFAULT_PAGE_SIZE, MAX_MEDIA_SIZE};
use gramkeep_store::{Database, StoreError};

/// Sync engine configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Directory downloaded media is mirrored into.
    /// Env: `GRAMKEEP_MEDIA_DIR`
    /// Default: `./media`
    pub media_dir: PathBuf,

    /// Number of saved messages fetched per sync pass.
    /// Env: `GRAMKEEP_PAGE_SIZE`
    /// Default: `100`
    pub page_size: usize,

    /// Vault key protecting stored session strings, 64 hex characters.
    /// Env: `GRAMKEEP_SESSION_KEY`
    /// Default: empty
    pub session_key: String,

    /// Explicit database file path.
    /// Env: `GRAMKEEP_DB_PATH`
    /// Default: none (platform data directory)
    pub database_path: Option<PathBuf>,

    /// Maximum size of a single media download in bytes.
    pub max_media_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            media_dir: PathBuf::from("./media"),
            page_size: DEFAULT_PAGE_SIZE,
            session_key: String::new(),
            database_path: None,
            max_media_size: MAX_MEDIA_SIZE,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("GRAMKEEP_MEDIA_DIR") {
            if !dir.is_empty() {
                config.media_dir = PathBuf::from(dir);
            }
        }

        if let Ok(val) = std::env::var("GRAMKEEP_PAGE_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.page_size = n,
                _ => tracing::warn!(value = %val, "Invalid GRAMKEEP_PAGE_SIZE, using default"),
            }
        }

        match std::env::var("GRAMKEEP_SESSION_KEY") {
            Ok(key) if !key.trim().is_empty() => config.session_key = key.trim().to_string(),
            _ => tracing::warn!(
                "GRAMKEEP_SESSION_KEY is not set; session strings cannot be stored or decrypted"
            ),
        }

        if let Ok(path) = std::env::var("GRAMKEEP_DB_PATH") {
            if !path.is_empty() {
                config.database_path = Some(PathBuf::from(path));
            }
        }

        config
    }

    /// Open the configured database: the explicit path when one is set,
    /// the platform data directory otherwise.
    pub fn open_database(&self) -> Result<Database, StoreError> {
        match &self.database_path {
            Some(path) => Database::open_at(path),
            None => Database::new(),
        }
    }
}
