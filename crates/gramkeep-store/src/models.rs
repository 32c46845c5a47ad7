//! Domain model structs persisted in the local SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to an API layer.  The encrypted session envelope is explicitly
//! skipped during serialization so it can never leak into a response.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use gramkeep_shared::{Category, ContentKind, FavoriteContent};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Favorite
// ---------------------------------------------------------------------------

/// One archived message from the remote "saved messages" dialog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Favorite {
    /// Unique favorite identifier.
    pub id: Uuid,
    /// Owner scope; every query against favorites is bound to one owner.
    pub owner_id: Uuid,
    /// Message id on the remote side, unique per owner.
    pub remote_message_id: i64,
    /// What the message fundamentally is, fixed at ingestion.
    pub kind: ContentKind,
    /// Display bucket derived by the classifier.
    pub category: Category,
    /// Type-dependent payload, stored as a JSON column.
    pub content: FavoriteContent,
    /// Unique tag names, stored as a JSON array column.
    pub tags: Vec<String>,
    /// When the message was saved remotely (not when it was ingested).
    pub saved_at: DateTime<Utc>,
    /// Where downloaded media lives on disk, if it was fetched.
    pub local_path: Option<String>,
    pub is_downloaded: bool,
    /// When this record was created locally.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tag
// ---------------------------------------------------------------------------

/// A reference-counted tag name scoped to one owner.
///
/// `count` tracks how many favorites currently carry the tag; rows whose
/// count reaches zero are garbage-collected by the ledger operations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub count: i64,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Telegram account
// ---------------------------------------------------------------------------

/// Stored credentials and profile snapshot for one Telegram account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TelegramAccount {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// Display name chosen by the owner.
    pub name: String,
    pub api_id: i32,
    pub api_hash: String,
    /// Vault envelope holding the session string; never serialized outward.
    #[serde(skip_serializing, default)]
    pub session_cipher: String,
    /// Whether this is the account syncs run against.  At most one account
    /// per owner is active.
    pub is_active: bool,
    /// Telegram user id, filled in after the first successful connection.
    pub remote_id: Option<i64>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub has_photo: bool,
    /// When the last sync pass completed for this account.
    pub last_sync: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Partial update for a stored account; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub api_id: Option<i32>,
    pub api_hash: Option<String>,
    /// Replacement session envelope, already encrypted by the caller.
    pub session_cipher: Option<String>,
}

// ---------------------------------------------------------------------------
// List queries
// ---------------------------------------------------------------------------

/// Filters applied to favorite list queries.
///
/// All present filters must match; `tags` requires every named tag to be
/// present on the favorite.
#[derive(Debug, Clone, Default)]
pub struct FavoriteFilter {
    pub kind: Option<ContentKind>,
    pub category: Option<Category>,
    pub tags: Vec<String>,
    /// Substring match over the payload's text and caption fields.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FavoriteSort {
    /// Remote save time.
    #[default]
    SavedAt,
    /// Local ingestion time.
    CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// 1-based page request.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

/// Everything a favorite list query can vary on.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub filter: FavoriteFilter,
    pub sort: FavoriteSort,
    pub order: SortOrder,
    pub page: PageRequest,
}

/// One page of favorites plus pagination totals.
#[derive(Debug, Clone, Serialize)]
pub struct FavoritePage {
    pub favorites: Vec<Favorite>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

/// Aggregate counts over one owner's library.
#[derive(Debug, Clone, Serialize)]
pub struct FavoriteStats {
    pub total: i64,
    /// Favorite counts keyed by content kind.
    pub by_kind: BTreeMap<String, i64>,
    /// Favorite counts keyed by category.
    pub by_category: BTreeMap<String, i64>,
    /// All tags, most used first.
    pub tags: Vec<Tag>,
}
