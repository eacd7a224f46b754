//! The server HTTP collaborator, behind a trait seam.
//!
//! The pipeline never constructs requests itself; a host supplies a
//! [`ChatApi`] implementation. Every call made on a reconciliation path
//! goes through [`safe_execute`], which converts failure into `None`
//! plus a logged warning so a flaky network can never wedge the drain
//! loop.

use std::future::Future;

use async_trait::async_trait;
use thiserror::Error;

use petrel_shared::message::WireMessage;
use petrel_shared::types::{ChatType, GroupMember};
use petrel_store::Chat;

/// Errors a [`ChatApi`] implementation may return.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response shape: {0}")]
    Decode(String),
}

/// Server endpoints the pipeline depends on.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Fetch the session for a peer, creating it server-side if the
    /// backend does so implicitly.
    async fn get_chat(
        &self,
        owner_id: &str,
        to_id: &str,
        chat_type: ChatType,
    ) -> Result<Chat, ApiError>;

    /// Explicitly create a session for a peer.
    async fn create_chat(
        &self,
        owner_id: &str,
        to_id: &str,
        chat_type: ChatType,
    ) -> Result<Chat, ApiError>;

    /// Full session list for an account.
    async fn get_chat_list(&self, owner_id: &str) -> Result<Vec<Chat>, ApiError>;

    /// One backward page of server-side history.
    async fn get_message_list(
        &self,
        chat_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<WireMessage>, ApiError>;

    /// Ask the server to recall a message.
    async fn recall_message(&self, chat_id: &str, message_id: &str) -> Result<(), ApiError>;

    /// Member roster of a group conversation.
    async fn get_group_members(&self, group_id: &str) -> Result<Vec<GroupMember>, ApiError>;
}

/// Run a collaborator call, reducing failure to `None` + a warning.
///
/// Reconciliation must keep flowing when the network does not; only
/// user-initiated actions are allowed to propagate an [`ApiError`].
pub async fn safe_execute<T>(
    context: &'static str,
    fut: impl Future<Output = Result<T, ApiError>>,
) -> Option<T> {
    match fut.await {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(context, error = %err, "api call failed, continuing without it");
            None
        }
    }
}
