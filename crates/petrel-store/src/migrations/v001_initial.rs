//! v001 -- Initial schema creation.
//!
//! Creates the session tables (`chats`, `messages`, `drafts`) and the
//! two derived FTS5 shadow tables. The shadow tables are disposable:
//! dropping and re-deriving them loses nothing but search.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Chats (sessions)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chats (
    chat_id      TEXT PRIMARY KEY NOT NULL,
    owner_id     TEXT NOT NULL,               -- local account the session belongs to
    to_id        TEXT NOT NULL,               -- peer user id or group id
    chat_type    INTEGER NOT NULL,            -- 1 single / 2 group
    name         TEXT NOT NULL,
    avatar       TEXT,
    preview      TEXT NOT NULL DEFAULT '',
    message_time INTEGER NOT NULL DEFAULT 0,  -- epoch milliseconds
    sequence     INTEGER NOT NULL DEFAULT 0,  -- server ordering key, monotone
    unread       INTEGER NOT NULL DEFAULT 0,
    is_top       INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    is_mute      INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    created_at   TEXT NOT NULL                -- ISO-8601 / RFC-3339
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_chats_owner_peer ON chats(owner_id, to_id);
CREATE INDEX IF NOT EXISTS idx_chats_order ON chats(is_top DESC, message_time DESC);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
-- No foreign key to chats: a message may be persisted before its chat
-- row, and the mirror must tolerate that.
CREATE TABLE IF NOT EXISTS messages (
    id           TEXT PRIMARY KEY NOT NULL,   -- server id, or client temp id before ack
    chat_id      TEXT NOT NULL,
    from_id      TEXT NOT NULL,
    content_type INTEGER NOT NULL,
    body         TEXT NOT NULL,               -- canonical JSON
    message_time INTEGER NOT NULL,
    sequence     INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_messages_chat_seq
    ON messages(chat_id, sequence DESC, message_time DESC);

-- ----------------------------------------------------------------
-- Drafts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS drafts (
    chat_id    TEXT PRIMARY KEY NOT NULL,
    content    TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Full-text shadows (derived, disposable)
-- ----------------------------------------------------------------
CREATE VIRTUAL TABLE IF NOT EXISTS message_fts USING fts5(
    message_id UNINDEXED,
    chat_id UNINDEXED,
    content
);

CREATE VIRTUAL TABLE IF NOT EXISTS chat_fts USING fts5(
    chat_id UNINDEXED,
    name,
    preview
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
