//! Full-text shadow table maintenance and search.
//!
//! Shadow rows are strictly derived: losing one degrades search, never
//! correctness. Recalled messages must have their shadow deleted so a
//! recalled body cannot be found by search.

use rusqlite::params;

use crate::database::Database;
use crate::error::Result;

/// One full-text search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub message_id: String,
    pub chat_id: String,
}

impl Database {
    // ------------------------------------------------------------------
    // Message shadow rows
    // ------------------------------------------------------------------

    /// Insert or refresh the shadow row for a message. FTS5 has no
    /// native upsert, so this is a delete-then-insert keyed on the id.
    pub fn upsert_message_fts(&self, message_id: &str, chat_id: &str, content: &str) -> Result<()> {
        self.delete_message_fts(message_id)?;
        self.conn().execute(
            "INSERT INTO message_fts (message_id, chat_id, content) VALUES (?1, ?2, ?3)",
            params![message_id, chat_id, content],
        )?;
        Ok(())
    }

    /// Remove the shadow row for a message, if any.
    pub fn delete_message_fts(&self, message_id: &str) -> Result<()> {
        self.conn().execute(
            "DELETE FROM message_fts WHERE message_id = ?1",
            params![message_id],
        )?;
        Ok(())
    }

    /// Bulk shadow insert used by the offline history sync path.
    pub fn batch_insert_message_fts(&self, rows: &[(String, String, String)]) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;
        {
            let mut delete = tx.prepare("DELETE FROM message_fts WHERE message_id = ?1")?;
            let mut insert = tx.prepare(
                "INSERT INTO message_fts (message_id, chat_id, content) VALUES (?1, ?2, ?3)",
            )?;
            for (message_id, chat_id, content) in rows {
                delete.execute(params![message_id])?;
                insert.execute(params![message_id, chat_id, content])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Remove all shadow rows for a conversation.
    pub fn delete_message_fts_for_chat(&self, chat_id: &str) -> Result<()> {
        self.conn().execute(
            "DELETE FROM message_fts WHERE chat_id = ?1",
            params![chat_id],
        )?;
        Ok(())
    }

    /// Search message bodies. Results are FTS5 rank order.
    pub fn search_messages(&self, query: &str, limit: u32) -> Result<Vec<SearchHit>> {
        let mut stmt = self.conn().prepare(
            "SELECT message_id, chat_id FROM message_fts
             WHERE message_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![query, limit], |row| {
            Ok(SearchHit {
                message_id: row.get(0)?,
                chat_id: row.get(1)?,
            })
        })?;

        let mut hits = Vec::new();
        for row in rows {
            hits.push(row?);
        }
        Ok(hits)
    }

    // ------------------------------------------------------------------
    // Chat shadow rows
    // ------------------------------------------------------------------

    /// Insert or refresh the shadow row for a chat's name and preview.
    pub fn upsert_chat_fts(&self, chat_id: &str, name: &str, preview: &str) -> Result<()> {
        self.delete_chat_fts(chat_id)?;
        self.conn().execute(
            "INSERT INTO chat_fts (chat_id, name, preview) VALUES (?1, ?2, ?3)",
            params![chat_id, name, preview],
        )?;
        Ok(())
    }

    /// Remove the shadow row for a chat, if any.
    pub fn delete_chat_fts(&self, chat_id: &str) -> Result<()> {
        self.conn().execute(
            "DELETE FROM chat_fts WHERE chat_id = ?1",
            params![chat_id],
        )?;
        Ok(())
    }
}
