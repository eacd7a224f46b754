//! # petrel-core
//!
//! The message pipeline of the Petrel desktop client.
//!
//! Socket payloads enter through the [`dispatch::Pipeline`], are lane-
//! sequenced by the [`queue::InboundQueue`], normalized by the shared
//! codec, and merged into session state by the
//! [`session::SessionReconciler`]. Persistence and indexing ride the
//! [`idle::IdleExecutor`] so they never compete with input latency.
//!
//! The in-memory chat list is the source of truth for the session; the
//! local store is an eventually consistent mirror and every write to it
//! is a self-contained keyed upsert.

pub mod api;
pub mod config;
pub mod dispatch;
pub mod draft;
pub mod group;
pub mod idle;
pub mod notify;
pub mod queue;
pub mod session;

mod error;

pub use config::PipelineConfig;
pub use dispatch::Pipeline;
pub use error::PipelineError;
pub use session::{SessionContext, SessionReconciler};
