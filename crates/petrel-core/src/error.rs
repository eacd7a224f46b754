use thiserror::Error;

use crate::api::ApiError;
use petrel_shared::codec::DecodeError;
use petrel_store::StoreError;

/// Errors surfaced by pipeline operations.
///
/// Most collaborator failures never reach this type: reconciliation
/// paths swallow them into logged warnings. What remains are the
/// user-initiated operations that must show a blocking failure and the
/// per-item processing errors the dispatcher logs.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("api error: {0}")]
    Api(#[from] ApiError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("no conversation is currently open")]
    NoOpenChat,

    #[error("unknown conversation '{0}'")]
    ChatNotFound(String),

    #[error("malformed operation: {0}")]
    InvalidOperation(String),
}
