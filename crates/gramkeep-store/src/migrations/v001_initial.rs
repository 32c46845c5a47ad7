//! v001 -- Initial schema creation.
//!
//! Creates the two core tables: `favorites` and `tags`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Favorites
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS favorites (
    id                TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    owner_id          TEXT NOT NULL,              -- UUID v4
    remote_message_id INTEGER NOT NULL,           -- message id in the saved dialog
    kind              TEXT NOT NULL,              -- text/photo/video/audio/document/link
    category          TEXT NOT NULL,              -- classifier output
    content           TEXT NOT NULL,              -- JSON payload
    tags              TEXT NOT NULL DEFAULT '[]', -- JSON array of tag names
    saved_at          TEXT NOT NULL,              -- remote save time, ISO-8601
    local_path        TEXT,                       -- downloaded media, if any
    is_downloaded     INTEGER NOT NULL DEFAULT 0, -- boolean 0/1
    created_at        TEXT NOT NULL,

    UNIQUE (owner_id, remote_message_id)
);

CREATE INDEX IF NOT EXISTS idx_favorites_owner_saved
    ON favorites(owner_id, saved_at DESC);

CREATE INDEX IF NOT EXISTS idx_favorites_owner_kind
    ON favorites(owner_id, kind);

CREATE INDEX IF NOT EXISTS idx_favorites_owner_category
    ON favorites(owner_id, category);

-- ----------------------------------------------------------------
-- Tags (reference-counted ledger)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS tags (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    owner_id   TEXT NOT NULL,               -- UUID v4
    name       TEXT NOT NULL,
    count      INTEGER NOT NULL DEFAULT 0,  -- favorites carrying this tag
    created_at TEXT NOT NULL,

    UNIQUE (owner_id, name)
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
