//! CRUD and query operations for [`Favorite`] records.
//!
//! Tag mutations here keep the ledger in [`crate::tags`] in step: the
//! favorite row is written first and the ledger follows, so a failure
//! between the two leaves counts stale rather than losing the favorite.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, ToSql};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Favorite, FavoritePage, FavoriteSort, FavoriteStats, ListOptions, SortOrder};

const FAVORITE_COLUMNS: &str = "id, owner_id, remote_message_id, kind, category, content, tags, \
                                saved_at, local_path, is_downloaded, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new favorite.
    ///
    /// The (owner, remote message id) pair is enforced unique by the
    /// schema; callers are expected to check for an existing record first
    /// via [`Database::find_favorite_by_remote_id`].
    pub fn insert_favorite(&self, favorite: &Favorite) -> Result<()> {
        self.conn().execute(
            "INSERT INTO favorites (id, owner_id, remote_message_id, kind, category, content,
                                    tags, saved_at, local_path, is_downloaded, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                favorite.id.to_string(),
                favorite.owner_id.to_string(),
                favorite.remote_message_id,
                favorite.kind.as_str(),
                favorite.category.as_str(),
                serde_json::to_string(&favorite.content)?,
                serde_json::to_string(&favorite.tags)?,
                favorite.saved_at.to_rfc3339(),
                favorite.local_path,
                favorite.is_downloaded,
                favorite.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single favorite by id, scoped to its owner.
    pub fn get_favorite(&self, owner: Uuid, id: Uuid) -> Result<Favorite> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {FAVORITE_COLUMNS} FROM favorites WHERE owner_id = ?1 AND id = ?2"
                ),
                params![owner.to_string(), id.to_string()],
                row_to_favorite,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Look up a favorite by its remote message id.  This is the dedup
    /// check ingestion runs before creating anything.
    pub fn find_favorite_by_remote_id(
        &self,
        owner: Uuid,
        remote_message_id: i64,
    ) -> Result<Option<Favorite>> {
        let favorite = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {FAVORITE_COLUMNS} FROM favorites
                     WHERE owner_id = ?1 AND remote_message_id = ?2"
                ),
                params![owner.to_string(), remote_message_id],
                row_to_favorite,
            )
            .optional()?;
        Ok(favorite)
    }

    /// List an owner's favorites with filtering, sorting and pagination.
    pub fn list_favorites(&self, owner: Uuid, options: &ListOptions) -> Result<FavoritePage> {
        let mut conditions: Vec<String> = vec!["owner_id = ?".to_string()];
        let mut args: Vec<Box<dyn ToSql>> = vec![Box::new(owner.to_string())];

        if let Some(kind) = options.filter.kind {
            conditions.push("kind = ?".to_string());
            args.push(Box::new(kind.as_str()));
        }
        if let Some(category) = options.filter.category {
            conditions.push("category = ?".to_string());
            args.push(Box::new(category.as_str()));
        }
        for tag in &options.filter.tags {
            conditions.push(
                "EXISTS (SELECT 1 FROM json_each(favorites.tags) AS je WHERE je.value = ?)"
                    .to_string(),
            );
            args.push(Box::new(tag.clone()));
        }
        if let Some(search) = &options.filter.search {
            conditions.push(
                "(json_extract(content, '$.text') LIKE ?
                  OR json_extract(content, '$.caption') LIKE ?)"
                    .to_string(),
            );
            let pattern = format!("%{}%", search);
            args.push(Box::new(pattern.clone()));
            args.push(Box::new(pattern));
        }

        let where_clause = conditions.join(" AND ");

        let total: i64 = self.conn().query_row(
            &format!("SELECT COUNT(*) FROM favorites WHERE {where_clause}"),
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            |row| row.get(0),
        )?;

        let order_column = match options.sort {
            FavoriteSort::SavedAt => "saved_at",
            FavoriteSort::CreatedAt => "created_at",
        };
        let direction = match options.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };

        let page = options.page.page.max(1);
        let limit = options.page.limit.max(1);
        let offset = (page - 1) * limit;

        let sql = format!(
            "SELECT {FAVORITE_COLUMNS} FROM favorites
             WHERE {where_clause}
             ORDER BY {order_column} {direction}
             LIMIT ? OFFSET ?"
        );
        args.push(Box::new(limit));
        args.push(Box::new(offset));

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            row_to_favorite,
        )?;

        let mut favorites = Vec::new();
        for row in rows {
            favorites.push(row?);
        }

        let total_pages = ((total as u64 + limit as u64 - 1) / limit as u64) as u32;

        Ok(FavoritePage {
            favorites,
            total,
            page,
            limit,
            total_pages,
        })
    }

    /// Aggregate counts over one owner's library.
    pub fn favorite_stats(&self, owner: Uuid) -> Result<FavoriteStats> {
        let owner_str = owner.to_string();

        let total: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM favorites WHERE owner_id = ?1",
            params![owner_str],
            |row| row.get(0),
        )?;

        let by_kind = self.group_counts(&owner_str, "kind")?;
        let by_category = self.group_counts(&owner_str, "category")?;
        let tags = self.list_tags(owner)?;

        Ok(FavoriteStats {
            total,
            by_kind,
            by_category,
            tags,
        })
    }

    fn group_counts(&self, owner_str: &str, column: &str) -> Result<BTreeMap<String, i64>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {column}, COUNT(*) FROM favorites WHERE owner_id = ?1 GROUP BY {column}"
        ))?;

        let rows = stmt.query_map(params![owner_str], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let (key, count) = row?;
            counts.insert(key, count);
        }
        Ok(counts)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Replace a favorite's tag set and reconcile the ledger.
    ///
    /// Tags are deduplicated in caller order.  The favorite is saved
    /// first; ledger deltas follow (removed names decrement and garbage
    /// collect, added names increment or create).
    pub fn replace_favorite_tags(
        &self,
        owner: Uuid,
        favorite_id: Uuid,
        new_tags: &[String],
    ) -> Result<Favorite> {
        let mut favorite = self.get_favorite(owner, favorite_id)?;
        let old_tags = std::mem::take(&mut favorite.tags);

        let mut tags: Vec<String> = Vec::new();
        for tag in new_tags {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }

        self.conn().execute(
            "UPDATE favorites SET tags = ?1 WHERE id = ?2",
            params![serde_json::to_string(&tags)?, favorite_id.to_string()],
        )?;
        favorite.tags = tags;

        for tag in &old_tags {
            if !favorite.tags.contains(tag) {
                self.apply_tag_delta(owner, tag, -1)?;
                self.garbage_collect_tag(owner, tag)?;
            }
        }
        for tag in &favorite.tags {
            if !old_tags.contains(tag) {
                self.apply_tag_delta(owner, tag, 1)?;
            }
        }

        Ok(favorite)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a favorite and decrement the ledger for each of its tags.
    pub fn delete_favorite(&self, owner: Uuid, favorite_id: Uuid) -> Result<()> {
        let favorite = self.get_favorite(owner, favorite_id)?;

        for tag in &favorite.tags {
            self.apply_tag_delta(owner, tag, -1)?;
            self.garbage_collect_tag(owner, tag)?;
        }

        self.conn().execute(
            "DELETE FROM favorites WHERE id = ?1",
            params![favorite_id.to_string()],
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Favorite`].
fn row_to_favorite(row: &rusqlite::Row<'_>) -> rusqlite::Result<Favorite> {
    let id_str: String = row.get(0)?;
    let owner_str: String = row.get(1)?;
    let remote_message_id: i64 = row.get(2)?;
    let kind_str: String = row.get(3)?;
    let category_str: String = row.get(4)?;
    let content_json: String = row.get(5)?;
    let tags_json: String = row.get(6)?;
    let saved_str: String = row.get(7)?;
    let local_path: Option<String> = row.get(8)?;
    let is_downloaded: bool = row.get(9)?;
    let created_str: String = row.get(10)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let owner_id = Uuid::parse_str(&owner_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let kind = kind_str.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let category = category_str.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let content = serde_json::from_str(&content_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let tags = serde_json::from_str(&tags_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let saved_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&saved_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(10, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Favorite {
        id,
        owner_id,
        remote_message_id,
        kind,
        category,
        content,
        tags,
        saved_at,
        local_path,
        is_downloaded,
        created_at,
    })
}
