//! # petrel-store
//!
//! Local persistence for the Petrel message pipeline, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD verbs for chats,
//! messages, drafts, and the derived full-text shadow tables. The store
//! is a mirror of the in-memory session state: writes are best-effort
//! and keyed upserts, so a lost write self-heals on the next one.

pub mod chats;
pub mod database;
pub mod drafts;
pub mod fts;
pub mod messages;
pub mod migrations;
pub mod models;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
