//! Reference-counted tag ledger.
//!
//! Tag rows track how many favorites carry each name.  Counts move through
//! [`Database::apply_tag_delta`]; decrementing flows pair each `-1` with
//! [`Database::garbage_collect_tag`] so rows whose count reaches zero do
//! not linger (explicitly created tags start at zero and survive until
//! first use and removal).
//!
//! [`Database::apply_tag_delta`]: crate::database::Database::apply_tag_delta
//! [`Database::garbage_collect_tag`]: crate::database::Database::garbage_collect_tag

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Tag;

impl Database {
    /// Add `delta` to a tag's reference count, creating the row when a
    /// positive delta names a tag that does not exist yet.
    ///
    /// Returns the tag as it exists after the mutation; `None` when no
    /// row existed and the delta was not positive.  The count is allowed
    /// to sit at zero or below until [`Database::garbage_collect_tag`]
    /// runs, which decrementing callers do immediately after.
    pub fn apply_tag_delta(&self, owner: Uuid, name: &str, delta: i64) -> Result<Option<Tag>> {
        let affected = self.conn().execute(
            "UPDATE tags SET count = count + ?1 WHERE owner_id = ?2 AND name = ?3",
            params![delta, owner.to_string(), name],
        )?;

        if affected == 0 {
            if delta <= 0 {
                return Ok(None);
            }

            let tag = Tag {
                id: Uuid::new_v4(),
                owner_id: owner,
                name: name.to_string(),
                count: delta,
                created_at: Utc::now(),
            };
            self.conn().execute(
                "INSERT INTO tags (id, owner_id, name, count, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    tag.id.to_string(),
                    tag.owner_id.to_string(),
                    tag.name,
                    tag.count,
                    tag.created_at.to_rfc3339(),
                ],
            )?;
            return Ok(Some(tag));
        }

        self.get_tag(owner, name)
    }

    /// Delete the tag row if its count is zero or below.
    ///
    /// Returns `true` if a row was removed.
    pub fn garbage_collect_tag(&self, owner: Uuid, name: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM tags WHERE owner_id = ?1 AND name = ?2 AND count <= 0",
            params![owner.to_string(), name],
        )?;
        Ok(affected > 0)
    }

    /// Fetch a single tag by name.
    pub fn get_tag(&self, owner: Uuid, name: &str) -> Result<Option<Tag>> {
        let tag = self
            .conn()
            .query_row(
                "SELECT id, owner_id, name, count, created_at
                 FROM tags
                 WHERE owner_id = ?1 AND name = ?2",
                params![owner.to_string(), name],
                row_to_tag,
            )
            .optional()?;
        Ok(tag)
    }

    /// List all of an owner's tags, most used first.
    pub fn list_tags(&self, owner: Uuid) -> Result<Vec<Tag>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, owner_id, name, count, created_at
             FROM tags
             WHERE owner_id = ?1
             ORDER BY count DESC, name ASC",
        )?;

        let rows = stmt.query_map(params![owner.to_string()], row_to_tag)?;

        let mut tags = Vec::new();
        for row in rows {
            tags.push(row?);
        }
        Ok(tags)
    }

    /// Create a tag with count zero, or return the existing row if the
    /// owner already has a tag by that name.
    pub fn create_tag(&self, owner: Uuid, name: &str) -> Result<Tag> {
        if let Some(existing) = self.get_tag(owner, name)? {
            return Ok(existing);
        }

        let tag = Tag {
            id: Uuid::new_v4(),
            owner_id: owner,
            name: name.to_string(),
            count: 0,
            created_at: Utc::now(),
        };
        self.conn().execute(
            "INSERT INTO tags (id, owner_id, name, count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                tag.id.to_string(),
                tag.owner_id.to_string(),
                tag.name,
                tag.count,
                tag.created_at.to_rfc3339(),
            ],
        )?;
        Ok(tag)
    }

    /// Rename a tag.
    ///
    /// Fails with [`StoreError::Conflict`] when the owner already has a tag
    /// under the target name -- renames never silently merge counts.
    /// Favorites keep the old name in their tag arrays; callers that want
    /// them moved must retag explicitly.
    pub fn rename_tag(&self, owner: Uuid, name: &str, new_name: &str) -> Result<Tag> {
        let tag = self.get_tag(owner, name)?.ok_or(StoreError::NotFound)?;

        if new_name != tag.name {
            if self.get_tag(owner, new_name)?.is_some() {
                return Err(StoreError::Conflict(format!(
                    "tag '{}' already exists",
                    new_name
                )));
            }

            self.conn().execute(
                "UPDATE tags SET name = ?1 WHERE owner_id = ?2 AND name = ?3",
                params![new_name, owner.to_string(), name],
            )?;
        }

        self.get_tag(owner, new_name)?.ok_or(StoreError::NotFound)
    }

    /// Detach a tag from every favorite that references it, then delete the
    /// tag row regardless of its count.
    pub fn remove_tag_everywhere(&self, owner: Uuid, name: &str) -> Result<()> {
        if self.get_tag(owner, name)?.is_none() {
            return Err(StoreError::NotFound);
        }

        self.conn().execute(
            "UPDATE favorites
             SET tags = (SELECT json_group_array(je.value)
                         FROM json_each(favorites.tags) AS je
                         WHERE je.value <> ?1)
             WHERE owner_id = ?2
               AND EXISTS (SELECT 1 FROM json_each(favorites.tags) AS je
                           WHERE je.value = ?1)",
            params![name, owner.to_string()],
        )?;

        self.conn().execute(
            "DELETE FROM tags WHERE owner_id = ?1 AND name = ?2",
            params![owner.to_string(), name],
        )?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Tag`].
fn row_to_tag(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tag> {
    let id_str: String = row.get(0)?;
    let owner_str: String = row.get(1)?;
    let name: String = row.get(2)?;
    let count: i64 = row.get(3)?;
    let created_str: String = row.get(4)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let owner_id = Uuid::parse_str(&owner_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Tag {
        id,
        owner_id,
        name,
        count,
        created_at,
    })
}
