//! CRUD operations for [`Chat`] session rows.

use chrono::{DateTime, Utc};
use rusqlite::params;

use petrel_shared::types::ChatType;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Chat, ChatPatch};

impl Database {
    // ------------------------------------------------------------------
    // Create / update
    // ------------------------------------------------------------------

    /// Insert or update a chat row, keyed by `chat_id`.
    ///
    /// Non-monotonic fields are last-write-wins; `sequence`,
    /// `message_time` and the preview are guarded so a stale idle task
    /// can never regress a newer mirror row.
    pub fn upsert_chat(&self, chat: &Chat) -> Result<()> {
        self.conn().execute(
            "INSERT INTO chats (chat_id, owner_id, to_id, chat_type, name, avatar, preview,
                                message_time, sequence, unread, is_top, is_mute, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(chat_id) DO UPDATE SET
                 name         = excluded.name,
                 avatar       = excluded.avatar,
                 unread       = excluded.unread,
                 is_top       = excluded.is_top,
                 is_mute      = excluded.is_mute,
                 preview      = CASE WHEN excluded.sequence >= chats.sequence
                                     THEN excluded.preview ELSE chats.preview END,
                 message_time = MAX(chats.message_time, excluded.message_time),
                 sequence     = MAX(chats.sequence, excluded.sequence)",
            params![
                chat.chat_id,
                chat.owner_id,
                chat.to_id,
                chat.chat_type.code(),
                chat.name,
                chat.avatar,
                chat.preview,
                chat.message_time,
                chat.sequence,
                chat.unread,
                chat.is_top as i64,
                chat.is_mute as i64,
                chat.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Apply a partial update to a chat row.
    pub fn patch_chat(&self, chat_id: &str, patch: &ChatPatch) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE chats SET
                 preview = COALESCE(?2, preview),
                 unread  = COALESCE(?3, unread),
                 is_top  = COALESCE(?4, is_top),
                 is_mute = COALESCE(?5, is_mute)
             WHERE chat_id = ?1",
            params![
                chat_id,
                patch.preview,
                patch.unread,
                patch.is_top.map(|b| b as i64),
                patch.is_mute.map(|b| b as i64),
            ],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single chat by id.
    pub fn select_chat(&self, chat_id: &str) -> Result<Chat> {
        self.conn()
            .query_row(
                "SELECT chat_id, owner_id, to_id, chat_type, name, avatar, preview,
                        message_time, sequence, unread, is_top, is_mute, created_at
                 FROM chats WHERE chat_id = ?1",
                params![chat_id],
                row_to_chat,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Look a chat up by its `(owner, peer)` pair.
    pub fn find_chat_by_peer(&self, owner_id: &str, to_id: &str) -> Result<Option<Chat>> {
        let found = self
            .conn()
            .query_row(
                "SELECT chat_id, owner_id, to_id, chat_type, name, avatar, preview,
                        message_time, sequence, unread, is_top, is_mute, created_at
                 FROM chats WHERE owner_id = ?1 AND to_id = ?2",
                params![owner_id, to_id],
                row_to_chat,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(StoreError::Sqlite(other)),
            })?;
        Ok(found)
    }

    /// List all chats for an account in display order.
    pub fn select_chats(&self, owner_id: &str) -> Result<Vec<Chat>> {
        let mut stmt = self.conn().prepare(
            "SELECT chat_id, owner_id, to_id, chat_type, name, avatar, preview,
                    message_time, sequence, unread, is_top, is_mute, created_at
             FROM chats
             WHERE owner_id = ?1
             ORDER BY is_top DESC, message_time DESC",
        )?;

        let rows = stmt.query_map(params![owner_id], row_to_chat)?;

        let mut chats = Vec::new();
        for row in rows {
            chats.push(row?);
        }
        Ok(chats)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a chat row. Returns `true` if a row was deleted.
    pub fn delete_chat(&self, chat_id: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM chats WHERE chat_id = ?1", params![chat_id])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Chat`].
fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chat> {
    let created_str: String = row.get(12)?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(12, rusqlite::types::Type::Text, Box::new(e))
        })?;

    let chat_type_code: i32 = row.get(3)?;
    let is_top: i64 = row.get(10)?;
    let is_mute: i64 = row.get(11)?;

    Ok(Chat {
        chat_id: row.get(0)?,
        owner_id: row.get(1)?,
        to_id: row.get(2)?,
        chat_type: ChatType::from_code(chat_type_code),
        name: row.get(4)?,
        avatar: row.get(5)?,
        preview: row.get(6)?,
        message_time: row.get(7)?,
        sequence: row.get(8)?,
        unread: row.get(9)?,
        is_top: is_top != 0,
        is_mute: is_mute != 0,
        created_at,
    })
}
