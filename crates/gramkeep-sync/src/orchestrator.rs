//! Sync engine: drives one account's pass over its saved messages.
//!
//! A pass moves through connecting, paging, ingesting and finalizing;
//! failure can interrupt any of them, and the log line for a failed pass
//! records the phase it died in.  Nothing is retried.  Favorites
//! committed before a failure stay committed, so the next pass simply
//! resumes behind the dedup check.

use chrono::Utc;
use gramkeep_shared::{vault, UserProfile};
use gramkeep_store::{Database, TelegramAccount};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::ingest::ingest;
use crate::lock::SyncLock;
use crate::media::MediaStore;
use crate::session::{RemoteSession, SessionProvider};

/// Where a sync pass currently is.
///
/// `Idle` is the resting state between passes; a pass that returns an
/// error is the "failed" terminal, with the phase it was interrupted in
/// attached to the failure log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Connecting,
    Paging,
    Ingesting,
    Finalizing,
    Done,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Connecting => "connecting",
            SyncPhase::Paging => "paging",
            SyncPhase::Ingesting => "ingesting",
            SyncPhase::Finalizing => "finalizing",
            SyncPhase::Done => "done",
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome summary of one sync pass.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct SyncReport {
    /// Messages archived for the first time.
    pub created: usize,
    /// Messages that were already archived.
    pub skipped: usize,
    /// Messages whose ingestion failed and was skipped over.
    pub failed: usize,
}

/// Credentials supplied when registering a Telegram account.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    /// Display name; a numbered default is generated when absent.
    pub name: Option<String>,
    pub api_id: i32,
    pub api_hash: String,
    /// Plaintext session string; encrypted before it is stored.
    pub session_secret: String,
}

/// Drives sync passes and account registration against an abstract
/// session provider.
pub struct SyncEngine {
    provider: Box<dyn SessionProvider>,
    media: MediaStore,
    config: SyncConfig,
    locks: SyncLock,
}

impl SyncEngine {
    pub fn new(provider: Box<dyn SessionProvider>, media: MediaStore, config: SyncConfig) -> Self {
        Self {
            provider,
            media,
            config,
            locks: SyncLock::new(),
        }
    }

    /// Run one sync pass for the owner's active account.
    ///
    /// Fails fast with [`SyncError::SyncInProgress`] when a pass for the
    /// same account is already running in this process.  The account's
    /// `last_sync` is only advanced by a pass that reaches finalizing.
    pub async fn sync_account(&self, db: &Database, owner: Uuid) -> Result<SyncReport> {
        let account = db.get_active_account(owner)?;
        let _claim = self
            .locks
            .try_acquire(account.id)
            .ok_or(SyncError::SyncInProgress)?;

        info!(account = %account.id, owner = %owner, "Starting sync pass");
        let mut phase = SyncPhase::Connecting;

        let session = match self.open_session(&account).await {
            Ok(session) => session,
            Err(error) => {
                warn!(account = %account.id, phase = %phase, error = %error, "Sync pass failed");
                return Err(error);
            }
        };

        let result = self.run_pass(db, &account, session.as_ref(), &mut phase).await;

        // the session is scoped to this pass: released on success and
        // failure alike
        if let Err(error) = session.disconnect().await {
            warn!(account = %account.id, error = %error, "Session disconnect failed");
        }

        match &result {
            Ok(report) => info!(
                account = %account.id,
                created = report.created,
                skipped = report.skipped,
                failed = report.failed,
                "Sync pass finished"
            ),
            Err(error) => {
                warn!(account = %account.id, phase = %phase, error = %error, "Sync pass failed")
            }
        }

        result
    }

    /// Register a new account for `owner`.
    ///
    /// The session secret is encrypted and the row saved first; the
    /// credentials are then verified by connecting and fetching the
    /// remote profile.  A failed verification surfaces to the caller,
    /// but the account stays registered for a later retry.
    pub async fn register_account(
        &self,
        db: &Database,
        owner: Uuid,
        new_account: NewAccount,
    ) -> Result<TelegramAccount> {
        if new_account.api_id <= 0
            || new_account.api_hash.trim().is_empty()
            || new_account.session_secret.trim().is_empty()
        {
            return Err(SyncError::Config("Incomplete API credentials".to_string()));
        }

        let session_cipher =
            vault::encrypt(&self.config.session_key, new_account.session_secret.as_bytes())?;

        let name = match new_account.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => format!("Account {}", db.list_accounts(owner)?.len() + 1),
        };

        let account = TelegramAccount {
            id: Uuid::new_v4(),
            owner_id: owner,
            name,
            api_id: new_account.api_id,
            api_hash: new_account.api_hash,
            session_cipher,
            is_active: false,
            remote_id: None,
            username: None,
            first_name: None,
            last_name: None,
            has_photo: false,
            last_sync: None,
            created_at: Utc::now(),
        };
        let mut account = db.insert_account(&account)?;
        info!(account = %account.id, owner = %owner, active = account.is_active, "Registered telegram account");

        let profile = self.fetch_profile(&account).await?;
        db.update_account_profile(owner, account.id, &profile)?;

        account.remote_id = Some(profile.remote_id);
        account.username = profile.username;
        account.first_name = profile.first_name;
        account.last_name = profile.last_name;
        account.has_photo = profile.has_photo;

        Ok(account)
    }

    /// Verify a stored account's credentials and refresh its profile
    /// snapshot.
    pub async fn test_connection(
        &self,
        db: &Database,
        owner: Uuid,
        account_id: Uuid,
    ) -> Result<UserProfile> {
        let account = db.get_account(owner, account_id)?;

        let profile = self.fetch_profile(&account).await?;
        db.update_account_profile(owner, account_id, &profile)?;

        info!(account = %account_id, remote_id = profile.remote_id, "Connection test succeeded");
        Ok(profile)
    }

    /// Decrypt the stored session string and connect.  The plaintext
    /// only lives on this stack frame.
    async fn open_session(&self, account: &TelegramAccount) -> Result<Box<dyn RemoteSession>> {
        let secret = vault::decrypt_string(&self.config.session_key, &account.session_cipher)?;
        let session = self
            .provider
            .connect(account.api_id, &account.api_hash, &secret)
            .await?;
        Ok(session)
    }

    /// Connect, read the remote profile, and always hand the session
    /// back, whatever `get_self` returned.
    async fn fetch_profile(&self, account: &TelegramAccount) -> Result<UserProfile> {
        let session = self.open_session(account).await?;

        let result = session.get_self().await;

        if let Err(error) = session.disconnect().await {
            warn!(account = %account.id, error = %error, "Session disconnect failed");
        }

        Ok(result?)
    }

    async fn run_pass(
        &self,
        db: &Database,
        account: &TelegramAccount,
        session: &dyn RemoteSession,
        phase: &mut SyncPhase,
    ) -> Result<SyncReport> {
        *phase = SyncPhase::Paging;
        let messages = session.get_saved_messages(self.config.page_size).await?;
        debug!(account = %account.id, count = messages.len(), "Fetched saved messages");

        *phase = SyncPhase::Ingesting;
        let mut report = SyncReport::default();
        for message in &messages {
            match ingest(db, &self.media, session, account.owner_id, message).await {
                Ok(outcome) if outcome.created => report.created += 1,
                Ok(_) => report.skipped += 1,
                Err(error) => {
                    warn!(
                        account = %account.id,
                        message = message.id,
                        error = %error,
                        "Message ingestion failed"
                    );
                    report.failed += 1;
                }
            }
        }

        *phase = SyncPhase::Finalizing;
        db.touch_last_sync(account.owner_id, account.id, Utc::now())?;

        *phase = SyncPhase::Done;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_names_are_stable() {
        assert_eq!(SyncPhase::Idle.to_string(), "idle");
        assert_eq!(SyncPhase::Connecting.to_string(), "connecting");
        assert_eq!(SyncPhase::Paging.to_string(), "paging");
        assert_eq!(SyncPhase::Ingesting.to_string(), "ingesting");
        assert_eq!(SyncPhase::Finalizing.to_string(), "finalizing");
        assert_eq!(SyncPhase::Done.to_string(), "done");
    }

    #[test]
    fn empty_report_counts_nothing() {
        let report = SyncReport::default();
        assert_eq!(report.created + report.skipped + report.failed, 0);
    }
}
