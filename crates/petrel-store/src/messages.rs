//! CRUD operations for durable [`MessageRecord`] rows.

use rusqlite::params;

use petrel_shared::message::ContentType;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::MessageRecord;

impl Database {
    /// Insert or update a message row, keyed by its authoritative id.
    ///
    /// The same key is used for the optimistic local copy (temp id) and
    /// for redeliveries, so replays converge instead of duplicating.
    pub fn upsert_message(&self, record: &MessageRecord) -> Result<()> {
        self.conn().execute(
            "INSERT INTO messages (id, chat_id, from_id, content_type, body, message_time, sequence)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                 content_type = excluded.content_type,
                 body         = excluded.body,
                 message_time = excluded.message_time,
                 sequence     = excluded.sequence",
            params![
                record.id,
                record.chat_id,
                record.from_id,
                record.content_type.code(),
                record.body,
                record.message_time,
                record.sequence,
            ],
        )?;
        Ok(())
    }

    /// Bulk insert used by the offline history sync path.
    pub fn batch_insert_messages(&self, records: &[MessageRecord]) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO messages (id, chat_id, from_id, content_type, body, message_time, sequence)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                     content_type = excluded.content_type,
                     body         = excluded.body,
                     message_time = excluded.message_time,
                     sequence     = excluded.sequence",
            )?;
            for record in records {
                stmt.execute(params![
                    record.id,
                    record.chat_id,
                    record.from_id,
                    record.content_type.code(),
                    record.body,
                    record.message_time,
                    record.sequence,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Fetch a single message by id.
    pub fn select_message(&self, id: &str) -> Result<MessageRecord> {
        self.conn()
            .query_row(
                "SELECT id, chat_id, from_id, content_type, body, message_time, sequence
                 FROM messages WHERE id = ?1",
                params![id],
                row_to_record,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// One backward page of a conversation's history, newest first.
    ///
    /// Display order is decided by `sequence`; callers reverse the page
    /// before prepending it to the visible list.
    pub fn select_messages(&self, chat_id: &str, limit: u32, offset: u32) -> Result<Vec<MessageRecord>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, chat_id, from_id, content_type, body, message_time, sequence
             FROM messages
             WHERE chat_id = ?1
             ORDER BY sequence DESC, message_time DESC
             LIMIT ?2 OFFSET ?3",
        )?;

        let rows = stmt.query_map(params![chat_id, limit, offset], row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Total number of durable messages in a conversation.
    pub fn count_messages(&self, chat_id: &str) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM messages WHERE chat_id = ?1",
            params![chat_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Replace a message's body in place, reclassifying its content type.
    ///
    /// Used for recall tombstones and edits; the row keeps its position
    /// in history. Returns `true` if a row was updated. Idempotent.
    pub fn replace_message_body(
        &self,
        id: &str,
        content_type: ContentType,
        body: &str,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE messages SET content_type = ?2, body = ?3 WHERE id = ?1",
            params![id, content_type.code(), body],
        )?;
        Ok(affected > 0)
    }

    /// Delete every message belonging to a conversation. Returns the
    /// number of rows removed.
    pub fn delete_messages_for_chat(&self, chat_id: &str) -> Result<usize> {
        let affected = self.conn().execute(
            "DELETE FROM messages WHERE chat_id = ?1",
            params![chat_id],
        )?;
        Ok(affected)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRecord> {
    let content_code: i32 = row.get(3)?;
    Ok(MessageRecord {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        from_id: row.get(2)?,
        content_type: ContentType::from_code(content_code),
        body: row.get(4)?,
        message_time: row.get(5)?,
        sequence: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, sequence: i64) -> MessageRecord {
        MessageRecord {
            id: id.into(),
            chat_id: "c1".into(),
            from_id: "u2".into(),
            content_type: ContentType::Text,
            body: r#"{"content":"hi"}"#.into(),
            message_time: sequence * 10,
            sequence,
        }
    }

    #[test]
    fn upsert_converges_on_replay() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_message(&record("m1", 1)).unwrap();
        db.upsert_message(&record("m1", 1)).unwrap();

        assert_eq!(db.count_messages("c1").unwrap(), 1);
    }

    #[test]
    fn pages_come_back_newest_first() {
        let db = Database::open_in_memory().unwrap();
        for seq in 1..=5 {
            db.upsert_message(&record(&format!("m{seq}"), seq)).unwrap();
        }

        let page = db.select_messages("c1", 2, 0).unwrap();
        let ids: Vec<&str> = page.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["m5", "m4"]);

        let older = db.select_messages("c1", 2, 2).unwrap();
        let ids: Vec<&str> = older.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["m3", "m2"]);
    }

    #[test]
    fn replace_body_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_message(&record("m1", 1)).unwrap();

        let tombstone = r#"{"recalled":true,"operatorId":"u2","recallTime":5}"#;
        assert!(db
            .replace_message_body("m1", ContentType::Recall, tombstone)
            .unwrap());
        assert!(db
            .replace_message_body("m1", ContentType::Recall, tombstone)
            .unwrap());

        let loaded = db.select_message("m1").unwrap();
        assert_eq!(loaded.content_type, ContentType::Recall);
        assert_eq!(loaded.body, tombstone);
        assert_eq!(loaded.sequence, 1);
    }

    #[test]
    fn batch_insert_then_delete_for_chat() {
        let db = Database::open_in_memory().unwrap();
        let batch: Vec<MessageRecord> = (1..=4).map(|seq| record(&format!("m{seq}"), seq)).collect();
        db.batch_insert_messages(&batch).unwrap();
        assert_eq!(db.count_messages("c1").unwrap(), 4);

        assert_eq!(db.delete_messages_for_chat("c1").unwrap(), 4);
        assert_eq!(db.count_messages("c1").unwrap(), 0);
    }
}
