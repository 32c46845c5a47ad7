//! Stored Telegram account registry.
//!
//! Each owner can register several accounts but at most one is *active*,
//! which is the account sync passes run against.  The first account an
//! owner registers becomes active automatically; deleting the active
//! account promotes the oldest remaining one.  The session envelope
//! column is write-only from the API's point of view: it is stored and
//! read here, but never serialized outward (see
//! [`TelegramAccount::session_cipher`]).

use chrono::{DateTime, Utc};
use gramkeep_shared::UserProfile;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{AccountUpdate, TelegramAccount};

/// Column list shared by every account SELECT.
const ACCOUNT_COLUMNS: &str = "id, owner_id, name, api_id, api_hash, session_cipher, is_active, \
     remote_id, username, first_name, last_name, has_photo, last_sync, created_at";

impl Database {
    /// Insert a new account.
    ///
    /// The stored row ignores the caller's `is_active`: an owner's first
    /// account becomes active, every later one starts inactive and is
    /// promoted through [`Database::set_active_account`].  Returns the
    /// record as stored.
    pub fn insert_account(&self, account: &TelegramAccount) -> Result<TelegramAccount> {
        let existing: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM accounts WHERE owner_id = ?1",
            params![account.owner_id.to_string()],
            |row| row.get(0),
        )?;

        let mut account = account.clone();
        account.is_active = existing == 0;

        self.conn().execute(
            "INSERT INTO accounts (id, owner_id, name, api_id, api_hash, session_cipher,
                                   is_active, remote_id, username, first_name, last_name,
                                   has_photo, last_sync, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                account.id.to_string(),
                account.owner_id.to_string(),
                account.name,
                account.api_id,
                account.api_hash,
                account.session_cipher,
                account.is_active,
                account.remote_id,
                account.username,
                account.first_name,
                account.last_name,
                account.has_photo,
                account.last_sync.map(|dt| dt.to_rfc3339()),
                account.created_at.to_rfc3339(),
            ],
        )?;

        Ok(account)
    }

    /// Fetch a single account, scoped to its owner.
    pub fn get_account(&self, owner: Uuid, id: Uuid) -> Result<TelegramAccount> {
        self.conn()
            .query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE owner_id = ?1 AND id = ?2"),
                params![owner.to_string(), id.to_string()],
                row_to_account,
            )
            .optional()?
            .ok_or(StoreError::NotFound)
    }

    /// The account sync passes run against for this owner.
    pub fn get_active_account(&self, owner: Uuid) -> Result<TelegramAccount> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {ACCOUNT_COLUMNS} FROM accounts
                     WHERE owner_id = ?1 AND is_active = 1"
                ),
                params![owner.to_string()],
                row_to_account,
            )
            .optional()?
            .ok_or(StoreError::NotFound)
    }

    /// All of an owner's accounts, oldest first.
    pub fn list_accounts(&self, owner: Uuid) -> Result<Vec<TelegramAccount>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts
             WHERE owner_id = ?1
             ORDER BY created_at ASC"
        ))?;

        let rows = stmt.query_map(params![owner.to_string()], row_to_account)?;

        let mut accounts = Vec::new();
        for row in rows {
            accounts.push(row?);
        }
        Ok(accounts)
    }

    /// Make `id` the owner's active account, deactivating any sibling.
    pub fn set_active_account(&self, owner: Uuid, id: Uuid) -> Result<TelegramAccount> {
        // ownership check before touching sibling flags
        self.get_account(owner, id)?;

        // clear first: a partial unique index enforces one active row per owner
        self.conn().execute(
            "UPDATE accounts SET is_active = 0 WHERE owner_id = ?1",
            params![owner.to_string()],
        )?;
        self.conn().execute(
            "UPDATE accounts SET is_active = 1 WHERE id = ?1",
            params![id.to_string()],
        )?;

        self.get_account(owner, id)
    }

    /// Apply a partial update to an account's credentials and name.
    pub fn update_account(
        &self,
        owner: Uuid,
        id: Uuid,
        update: &AccountUpdate,
    ) -> Result<TelegramAccount> {
        let mut account = self.get_account(owner, id)?;

        if let Some(name) = &update.name {
            account.name = name.clone();
        }
        if let Some(api_id) = update.api_id {
            account.api_id = api_id;
        }
        if let Some(api_hash) = &update.api_hash {
            account.api_hash = api_hash.clone();
        }
        if let Some(cipher) = &update.session_cipher {
            account.session_cipher = cipher.clone();
        }

        self.conn().execute(
            "UPDATE accounts SET name = ?1, api_id = ?2, api_hash = ?3, session_cipher = ?4
             WHERE id = ?5",
            params![
                account.name,
                account.api_id,
                account.api_hash,
                account.session_cipher,
                id.to_string(),
            ],
        )?;

        Ok(account)
    }

    /// Store the remote profile snapshot fetched after a successful
    /// connection.
    pub fn update_account_profile(
        &self,
        owner: Uuid,
        id: Uuid,
        profile: &UserProfile,
    ) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE accounts
             SET remote_id = ?1, username = ?2, first_name = ?3, last_name = ?4, has_photo = ?5
             WHERE owner_id = ?6 AND id = ?7",
            params![
                profile.remote_id,
                profile.username,
                profile.first_name,
                profile.last_name,
                profile.has_photo,
                owner.to_string(),
                id.to_string(),
            ],
        )?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Record when a sync pass last completed for this account.
    pub fn touch_last_sync(&self, owner: Uuid, id: Uuid, when: DateTime<Utc>) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE accounts SET last_sync = ?1 WHERE owner_id = ?2 AND id = ?3",
            params![when.to_rfc3339(), owner.to_string(), id.to_string()],
        )?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Delete an account.  When the active account is removed, the
    /// owner's oldest remaining account is promoted in its place.
    pub fn delete_account(&self, owner: Uuid, id: Uuid) -> Result<()> {
        let account = self.get_account(owner, id)?;

        self.conn().execute(
            "DELETE FROM accounts WHERE id = ?1",
            params![id.to_string()],
        )?;

        if account.is_active {
            let next: Option<String> = self
                .conn()
                .query_row(
                    "SELECT id FROM accounts WHERE owner_id = ?1
                     ORDER BY created_at ASC LIMIT 1",
                    params![owner.to_string()],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(next_id) = next {
                self.conn().execute(
                    "UPDATE accounts SET is_active = 1 WHERE id = ?1",
                    params![next_id],
                )?;
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`TelegramAccount`].
fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<TelegramAccount> {
    let id_str: String = row.get(0)?;
    let owner_str: String = row.get(1)?;
    let last_sync_str: Option<String> = row.get(12)?;
    let created_str: String = row.get(13)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let owner_id = Uuid::parse_str(&owner_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let last_sync = last_sync_str
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        12,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })
        })
        .transpose()?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(13, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(TelegramAccount {
        id,
        owner_id,
        name: row.get(2)?,
        api_id: row.get(3)?,
        api_hash: row.get(4)?,
        session_cipher: row.get(5)?,
        is_active: row.get(6)?,
        remote_id: row.get(7)?,
        username: row.get(8)?,
        first_name: row.get(9)?,
        last_name: row.get(10)?,
        has_photo: row.get(11)?,
        last_sync,
        created_at,
    })
}
