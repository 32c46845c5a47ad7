//! v002 -- Stored Telegram accounts.
//!
//! Adds the `accounts` table holding per-owner API credentials, the
//! encrypted session envelope, and the remote profile snapshot.

use rusqlite::Connection;

/// SQL executed when upgrading from version 1 to version 2.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id             TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    owner_id       TEXT NOT NULL,              -- UUID v4
    name           TEXT NOT NULL,
    api_id         INTEGER NOT NULL,
    api_hash       TEXT NOT NULL,
    session_cipher TEXT NOT NULL,              -- hex(iv):hex(ciphertext) envelope
    is_active      INTEGER NOT NULL DEFAULT 0, -- boolean 0/1
    remote_id      INTEGER,                    -- Telegram user id, once known
    username       TEXT,
    first_name     TEXT,
    last_name      TEXT,
    has_photo      INTEGER NOT NULL DEFAULT 0, -- boolean 0/1
    last_sync      TEXT,                       -- ISO-8601
    created_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_accounts_owner ON accounts(owner_id);

-- at most one active account per owner
CREATE UNIQUE INDEX IF NOT EXISTS idx_accounts_owner_active
    ON accounts(owner_id) WHERE is_active = 1;
"#;

/// Apply the accounts migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
