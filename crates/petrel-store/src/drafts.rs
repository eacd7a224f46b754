//! Draft persistence.
//!
//! One row per conversation; absence means "no draft". Saving an empty
//! or whitespace-only draft deletes the row instead of writing a
//! tombstone.

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Draft;

impl Database {
    /// Save a draft. Empty content deletes the row; returns whether a
    /// row exists afterwards.
    pub fn set_draft(&self, chat_id: &str, content: &str) -> Result<bool> {
        if content.trim().is_empty() {
            self.delete_draft(chat_id)?;
            return Ok(false);
        }

        self.conn().execute(
            "INSERT INTO drafts (chat_id, content, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(chat_id) DO UPDATE SET
                 content = excluded.content,
                 updated_at = excluded.updated_at",
            params![chat_id, content, Utc::now().to_rfc3339()],
        )?;
        Ok(true)
    }

    /// Fetch the draft for a conversation, if any.
    pub fn get_draft(&self, chat_id: &str) -> Result<Option<Draft>> {
        self.conn()
            .query_row(
                "SELECT chat_id, content, updated_at FROM drafts WHERE chat_id = ?1",
                params![chat_id],
                row_to_draft,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(StoreError::Sqlite(other)),
            })
    }

    /// Delete the draft for a conversation. Returns `true` if a row was
    /// deleted.
    pub fn delete_draft(&self, chat_id: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM drafts WHERE chat_id = ?1", params![chat_id])?;
        Ok(affected > 0)
    }
}

fn row_to_draft(row: &rusqlite::Row<'_>) -> rusqlite::Result<Draft> {
    let updated_str: String = row.get(2)?;
    let updated_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&updated_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Draft {
        chat_id: row.get(0)?,
        content: row.get(1)?,
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_load() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.set_draft("c1", "<p>unsent</p>").unwrap());

        let draft = db.get_draft("c1").unwrap().expect("draft exists");
        assert_eq!(draft.content, "<p>unsent</p>");
    }

    #[test]
    fn empty_content_deletes_the_row() {
        let db = Database::open_in_memory().unwrap();
        db.set_draft("c1", "something").unwrap();

        assert!(!db.set_draft("c1", "   ").unwrap());
        assert!(db.get_draft("c1").unwrap().is_none());
    }

    #[test]
    fn missing_draft_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_draft("nope").unwrap().is_none());
        assert!(!db.delete_draft("nope").unwrap());
    }
}
