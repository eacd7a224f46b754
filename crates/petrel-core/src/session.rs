//! Session reconciler: the heart of the pipeline.
//!
//! Given a normalized inbound message, the reconciler finds or
//! materializes the conversation, computes the unread delta and the
//! preview, keeps the chat list sorted, and schedules persistence on
//! the idle executor. The in-memory chat list is authoritative for the
//! session; store writes are best-effort mirrors that self-heal on the
//! next upsert.
//!
//! No lock is held across an await. Every mutation happens in a short
//! mutex scope; between a mutation and its persistence task arbitrarily
//! many other messages may interleave, which the keyed, monotonically
//! guarded upserts tolerate.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use uuid::Uuid;

use petrel_shared::codec;
use petrel_shared::message::{
    ContentType, EditBody, GroupOpKind, GroupOperationBody, Message, MessageBody, RecallBody,
    TextBody, WireMessage,
};
use petrel_shared::preview;
use petrel_shared::types::ChatType;
use petrel_store::{Chat, ChatPatch, Database, MessageRecord};

use crate::api::{safe_execute, ChatApi};
use crate::config::PipelineConfig;
use crate::draft::DraftManager;
use crate::error::PipelineError;
use crate::group::GroupDirectory;
use crate::idle::IdleExecutor;
use crate::notify::Notifier;

/// Everything the reconciler needs from the host, bundled explicitly.
/// One context per logged-in session; torn down on logout.
pub struct SessionContext {
    /// The local account id. Messages authored by it never bump unread.
    pub owner_id: String,
    pub db: Arc<Mutex<Database>>,
    pub idle: IdleExecutor,
    pub api: Arc<dyn ChatApi>,
    pub notifier: Arc<dyn Notifier>,
    pub groups: GroupDirectory,
    pub drafts: DraftManager,
}

struct SessionState {
    chats: Vec<Chat>,
    open_chat_id: Option<String>,
    /// Messages of the open conversation, feeding the virtualized view.
    visible: Vec<Message>,
    /// Cached durable count for the open conversation; refetched only
    /// when unset.
    total_count: Option<i64>,
    pages_loaded: u32,
}

pub struct SessionReconciler {
    ctx: SessionContext,
    state: Mutex<SessionState>,
    page_size: u32,
}

impl SessionReconciler {
    pub fn new(ctx: SessionContext, config: &PipelineConfig) -> Self {
        Self {
            ctx,
            state: Mutex::new(SessionState {
                chats: Vec::new(),
                open_chat_id: None,
                visible: Vec::new(),
                total_count: None,
                pages_loaded: 0,
            }),
            page_size: config.effective_page_size(),
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Snapshot of the chat list in display order.
    pub fn chats(&self) -> Vec<Chat> {
        self.state.lock().expect("session state poisoned").chats.clone()
    }

    /// Snapshot of the open conversation's visible messages.
    pub fn visible_messages(&self) -> Vec<Message> {
        self.state
            .lock()
            .expect("session state poisoned")
            .visible
            .clone()
    }

    pub fn open_chat_id(&self) -> Option<String> {
        self.state
            .lock()
            .expect("session state poisoned")
            .open_chat_id
            .clone()
    }

    /// Load the chat list at session start: local store first, server
    /// fallback when the store is empty.
    pub async fn bootstrap(&self) {
        let local = {
            let db = self.ctx.db.lock().expect("db lock poisoned");
            db.select_chats(&self.ctx.owner_id)
        };

        let chats = match local {
            Ok(rows) if !rows.is_empty() => rows,
            Ok(_) => {
                let fetched = safe_execute(
                    "get_chat_list",
                    self.ctx.api.get_chat_list(&self.ctx.owner_id),
                )
                .await
                .unwrap_or_default();
                for chat in &fetched {
                    self.schedule_chat_upsert(chat.clone(), None);
                }
                fetched
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to load local chat list");
                Vec::new()
            }
        };

        let mut state = self.state.lock().expect("session state poisoned");
        state.chats = chats;
        sort_chats(&mut state.chats);
    }

    /// Pipeline entry for a normalized inbound or outbound message.
    pub async fn ingest(&self, message: Message) {
        if message.from_id != self.ctx.owner_id {
            self.create_or_update(&message).await;
        }
        self.create_message(message).await;
    }

    /// Merge a message into the chat list: find or materialize the
    /// session, evaluate the notify side effect, compute preview and
    /// unread, re-sort, and schedule the mirror upsert.
    pub async fn create_or_update(&self, message: &Message) {
        let conv_peer = self.conversation_peer(message);

        let mut existed = {
            let state = self.state.lock().expect("session state poisoned");
            state.chats.iter().any(|c| c.to_id == conv_peer)
        };

        if !existed {
            let stored = {
                let db = self.ctx.db.lock().expect("db lock poisoned");
                match db.find_chat_by_peer(&self.ctx.owner_id, &conv_peer) {
                    Ok(found) => found,
                    Err(err) => {
                        tracing::warn!(error = %err, "chat lookup failed; treating as absent");
                        None
                    }
                }
            };

            let chat = match stored {
                Some(chat) => {
                    existed = true;
                    chat
                }
                None => {
                    // The only synchronous network call on this path.
                    let fetched = match safe_execute(
                        "get_chat",
                        self.ctx
                            .api
                            .get_chat(&self.ctx.owner_id, &conv_peer, message.chat_type),
                    )
                    .await
                    {
                        Some(chat) => Some(chat),
                        None => {
                            safe_execute(
                                "create_chat",
                                self.ctx.api.create_chat(
                                    &self.ctx.owner_id,
                                    &conv_peer,
                                    message.chat_type,
                                ),
                            )
                            .await
                        }
                    };
                    fetched.unwrap_or_else(|| {
                        Chat::materialize(
                            Uuid::new_v4().to_string(),
                            self.ctx.owner_id.clone(),
                            conv_peer.clone(),
                            message.chat_type,
                            conv_peer.clone(),
                        )
                    })
                }
            };

            let mut state = self.state.lock().expect("session state poisoned");
            // Re-check: another task may have materialized the session
            // while this one was at the store or on the network.
            if state.chats.iter().any(|c| c.to_id == conv_peer) {
                existed = true;
            } else {
                state.chats.push(chat);
            }
        }

        let owner = self.ctx.owner_id.clone();
        let is_self = message.from_id == owner;

        // Group-operation tips want roster names as they were before the
        // delta is applied, so the text is rendered up front.
        let group_tip = match &message.body {
            MessageBody::GroupOperation(op) => {
                Some(self.describe_group_operation(&conv_peer, op))
            }
            _ => None,
        };

        let (should_notify, snapshot, fts_text) = {
            let mut state = self.state.lock().expect("session state poisoned");
            let open_id = state.open_chat_id.clone();
            let Some(chat) = state.chats.iter_mut().find(|c| c.to_id == conv_peer) else {
                return;
            };
            let is_open = open_id.as_deref() == Some(chat.chat_id.as_str());

            let should_notify = existed && !is_self && !chat.is_mute && !is_open;

            // Monotonic guard: an out-of-order straggler must not
            // regress the preview, the ordering key, or the timestamp.
            let mut fts_text = None;
            if message.sequence >= chat.sequence {
                chat.preview = match &group_tip {
                    Some(tip) => tip.clone(),
                    None if is_open => preview::plain_preview(&message.body),
                    None => preview::html_preview(&message.body, &owner),
                };
                chat.sequence = message.sequence;
                if message.message_time > chat.message_time {
                    chat.message_time = message.message_time;
                }
                fts_text = Some(
                    group_tip
                        .clone()
                        .unwrap_or_else(|| preview::plain_preview(&message.body)),
                );
            }

            if !is_open && !is_self {
                chat.unread += 1;
            }

            let snapshot = chat.clone();
            sort_chats(&mut state.chats);
            (should_notify, snapshot, fts_text)
        };

        if should_notify {
            // Fire-and-forget; never awaited.
            self.ctx.notifier.notify(&snapshot, message);
        }

        self.schedule_chat_upsert(snapshot, fts_text);
    }

    /// Append a message to the visible list (when its conversation is
    /// open) and insert it into durable history. Self-sent messages
    /// also refresh the sender's own chat-list row immediately.
    pub async fn create_message(&self, message: Message) {
        if message.from_id == self.ctx.owner_id {
            self.create_or_update(&message).await;
        }

        let conv_peer = self.conversation_peer(&message);

        // A group-operation envelope drives the roster state machine
        // before anything renders.
        if let MessageBody::GroupOperation(op) = &message.body {
            self.ctx.groups.roster(&conv_peer).apply(op);
        }

        let chat_id = self
            .chat_id_for_peer(&conv_peer)
            .unwrap_or_else(|| conv_peer.clone());

        let record_id = match message.identity() {
            "" => Uuid::new_v4().to_string(),
            id => id.to_string(),
        };

        {
            let mut state = self.state.lock().expect("session state poisoned");
            if state.open_chat_id.as_deref() == Some(chat_id.as_str()) {
                insert_by_sequence(&mut state.visible, message.clone());
            }
        }

        let record = MessageRecord {
            id: record_id,
            chat_id,
            from_id: message.from_id.clone(),
            content_type: message.content_type,
            body: codec::encode(&message.body),
            message_time: message.message_time,
            sequence: message.sequence,
        };
        let fts_content = if message.content_type.is_textual() {
            Some(preview::plain_preview(&message.body))
        } else {
            None
        };

        let db = Arc::clone(&self.ctx.db);
        self.ctx.idle.add_task(move || async move {
            let guard = db.lock().expect("db lock poisoned");
            guard.upsert_message(&record)?;
            if let Some(content) = fts_content {
                guard.upsert_message_fts(&record.id, &record.chat_id, &content)?;
            }
            Ok(())
        });
    }

    /// Route a message-operation envelope (recall or edit) to its
    /// handler. The directive's own `message_id` names the target.
    pub async fn apply_operation(&self, message: Message) -> Result<(), PipelineError> {
        let conv_peer = self.conversation_peer(&message);
        let chat_id = self
            .chat_id_for_peer(&conv_peer)
            .unwrap_or_else(|| conv_peer.clone());

        match message.body {
            MessageBody::Recall(tombstone) => {
                let target = message.message_id.clone().ok_or_else(|| {
                    PipelineError::InvalidOperation("recall directive without a target id".into())
                })?;
                self.apply_recall(&target, tombstone);
                Ok(())
            }
            MessageBody::Edit(edit) => {
                self.apply_edit(&chat_id, &edit);
                Ok(())
            }
            _ => {
                tracing::warn!(
                    content_type = message.content_type.code(),
                    "unexpected message-operation payload; ignoring"
                );
                Ok(())
            }
        }
    }

    /// Replace a message with a recall tombstone, in the live list and
    /// in durable storage, and drop its full-text shadow. Idempotent:
    /// the row and its position in history are preserved.
    pub fn apply_recall(&self, target_id: &str, tombstone: RecallBody) {
        let body = MessageBody::Recall(tombstone);

        {
            let mut state = self.state.lock().expect("session state poisoned");
            if let Some(item) = state
                .visible
                .iter_mut()
                .find(|m| m.identity() == target_id)
            {
                item.body = body.clone();
                item.content_type = ContentType::Recall;
            }
        }

        let encoded = codec::encode(&body);
        let target = target_id.to_string();
        let db = Arc::clone(&self.ctx.db);
        self.ctx.idle.add_task(move || async move {
            let guard = db.lock().expect("db lock poisoned");
            guard.replace_message_body(&target, ContentType::Recall, &encoded)?;
            // A recalled message must not be findable by search.
            guard.delete_message_fts(&target)?;
            Ok(())
        });
    }

    /// Replace a message's content with an edited body, re-indexing the
    /// full-text shadow.
    pub fn apply_edit(&self, chat_id: &str, edit: &EditBody) {
        let body = MessageBody::Text(TextBody {
            content: edit.new_content.clone(),
            at_user_ids: Vec::new(),
        });

        {
            let mut state = self.state.lock().expect("session state poisoned");
            if let Some(item) = state
                .visible
                .iter_mut()
                .find(|m| m.identity() == edit.target_message_id)
            {
                item.body = body.clone();
                item.content_type = ContentType::Text;
            }
        }

        let encoded = codec::encode(&body);
        let target = edit.target_message_id.clone();
        let chat_id = chat_id.to_string();
        let content = edit.new_content.clone();
        let db = Arc::clone(&self.ctx.db);
        self.ctx.idle.add_task(move || async move {
            let guard = db.lock().expect("db lock poisoned");
            guard.replace_message_body(&target, ContentType::Text, &encoded)?;
            guard.upsert_message_fts(&target, &chat_id, &content)?;
            Ok(())
        });
    }

    /// User-initiated recall: the server call may fail and that failure
    /// is surfaced, unlike anything on the reconciliation path.
    pub async fn request_recall(
        &self,
        chat_id: &str,
        message_id: &str,
    ) -> Result<(), PipelineError> {
        self.ctx.api.recall_message(chat_id, message_id).await?;

        let tombstone = RecallBody {
            recalled: true,
            operator_id: self.ctx.owner_id.clone(),
            recall_time: chrono::Utc::now().timestamp_millis(),
            reason: None,
        };
        self.apply_recall(message_id, tombstone);
        Ok(())
    }

    /// Open a conversation: reset unread, clear the visible list and
    /// pagination, and persist the unread reset.
    pub fn open_chat(&self, chat_id: &str) {
        let had_unread = {
            let mut state = self.state.lock().expect("session state poisoned");
            state.open_chat_id = Some(chat_id.to_string());
            state.visible.clear();
            state.total_count = None;
            state.pages_loaded = 0;

            match state.chats.iter_mut().find(|c| c.chat_id == chat_id) {
                Some(chat) => {
                    let had = chat.unread != 0;
                    chat.unread = 0;
                    had
                }
                None => false,
            }
        };

        if had_unread {
            self.schedule_chat_patch(
                chat_id.to_string(),
                ChatPatch {
                    unread: Some(0),
                    ..ChatPatch::default()
                },
            );
        }
    }

    pub fn close_chat(&self) {
        let mut state = self.state.lock().expect("session state poisoned");
        state.open_chat_id = None;
        state.visible.clear();
        state.total_count = None;
        state.pages_loaded = 0;
    }

    /// Pin or unpin a conversation. Mutates memory synchronously,
    /// persists asynchronously, re-sorts because the sort key changed.
    pub fn set_top(&self, chat_id: &str, pinned: bool) -> Result<(), PipelineError> {
        {
            let mut state = self.state.lock().expect("session state poisoned");
            let chat = state
                .chats
                .iter_mut()
                .find(|c| c.chat_id == chat_id)
                .ok_or_else(|| PipelineError::ChatNotFound(chat_id.to_string()))?;
            chat.is_top = pinned;
            sort_chats(&mut state.chats);
        }

        self.schedule_chat_patch(
            chat_id.to_string(),
            ChatPatch {
                is_top: Some(pinned),
                ..ChatPatch::default()
            },
        );
        Ok(())
    }

    /// Mute or unmute a conversation. No re-sort: mute is not a sort
    /// key.
    pub fn set_mute(&self, chat_id: &str, muted: bool) -> Result<(), PipelineError> {
        {
            let mut state = self.state.lock().expect("session state poisoned");
            let chat = state
                .chats
                .iter_mut()
                .find(|c| c.chat_id == chat_id)
                .ok_or_else(|| PipelineError::ChatNotFound(chat_id.to_string()))?;
            chat.is_mute = muted;
        }

        self.schedule_chat_patch(
            chat_id.to_string(),
            ChatPatch {
                is_mute: Some(muted),
                ..ChatPatch::default()
            },
        );
        Ok(())
    }

    /// Delete a conversation: drop it from memory, clear its draft, and
    /// when it is the open one, clear the visible list and pagination.
    /// Local history and shadows are removed asynchronously.
    pub fn remove_chat(&self, chat_id: &str) -> Result<(), PipelineError> {
        let to_id = {
            let mut state = self.state.lock().expect("session state poisoned");
            let idx = state
                .chats
                .iter()
                .position(|c| c.chat_id == chat_id)
                .ok_or_else(|| PipelineError::ChatNotFound(chat_id.to_string()))?;
            let removed = state.chats.remove(idx);

            if state.open_chat_id.as_deref() == Some(chat_id) {
                state.open_chat_id = None;
                state.visible.clear();
                state.total_count = None;
                state.pages_loaded = 0;
            }
            removed.to_id
        };

        self.ctx.drafts.clear(chat_id);
        self.ctx.groups.remove(&to_id);

        let chat_id = chat_id.to_string();
        let db = Arc::clone(&self.ctx.db);
        self.ctx.idle.add_task(move || async move {
            let guard = db.lock().expect("db lock poisoned");
            guard.delete_chat(&chat_id)?;
            guard.delete_chat_fts(&chat_id)?;
            guard.delete_messages_for_chat(&chat_id)?;
            guard.delete_message_fts_for_chat(&chat_id)?;
            Ok(())
        });
        Ok(())
    }

    /// Fetch one more backward page of history for the open
    /// conversation and prepend it to the visible list. The returned
    /// page is in ascending display order.
    pub async fn load_more(&self) -> Result<Vec<Message>, PipelineError> {
        let (chat_id, pages_loaded, cached_total) = {
            let state = self.state.lock().expect("session state poisoned");
            let chat_id = state
                .open_chat_id
                .clone()
                .ok_or(PipelineError::NoOpenChat)?;
            (chat_id, state.pages_loaded, state.total_count)
        };

        // The count query runs once per opened conversation.
        let total = match cached_total {
            Some(total) => total,
            None => {
                let total = {
                    let db = self.ctx.db.lock().expect("db lock poisoned");
                    db.count_messages(&chat_id)?
                };
                let mut state = self.state.lock().expect("session state poisoned");
                state.total_count = Some(total);
                total
            }
        };

        let offset = pages_loaded * self.page_size;
        if i64::from(offset) >= total {
            return Ok(Vec::new());
        }

        let records = {
            let db = self.ctx.db.lock().expect("db lock poisoned");
            db.select_messages(&chat_id, self.page_size, offset)?
        };

        let mut page: Vec<Message> = records
            .into_iter()
            .map(|record| self.record_to_message(record))
            .collect();
        // The store hands pages newest-first; the view wants ascending.
        page.reverse();

        {
            let mut state = self.state.lock().expect("session state poisoned");
            // The user may have switched conversations mid-query.
            if state.open_chat_id.as_deref() == Some(chat_id.as_str()) {
                state.visible.splice(0..0, page.iter().cloned());
                state.pages_loaded += 1;
            }
        }

        Ok(page)
    }

    /// Bulk offline sync: normalize server history and batch it into
    /// the store (messages plus textual shadows) in one idle task.
    pub fn sync_history(&self, wires: Vec<WireMessage>) {
        let mut records = Vec::with_capacity(wires.len());
        let mut fts_rows = Vec::new();

        for wire in &wires {
            let (message, decode_err) = codec::normalize(wire);
            if let Some(err) = decode_err {
                tracing::warn!(error = %err, "history message body kept as unknown");
            }

            let conv_peer = self.conversation_peer(&message);
            let chat_id = self
                .chat_id_for_peer(&conv_peer)
                .unwrap_or_else(|| conv_peer.clone());
            let id = match message.identity() {
                "" => Uuid::new_v4().to_string(),
                id => id.to_string(),
            };

            if message.content_type.is_textual() {
                fts_rows.push((
                    id.clone(),
                    chat_id.clone(),
                    preview::plain_preview(&message.body),
                ));
            }
            records.push(MessageRecord {
                id,
                chat_id,
                from_id: message.from_id.clone(),
                content_type: message.content_type,
                body: codec::encode(&message.body),
                message_time: message.message_time,
                sequence: message.sequence,
            });
        }

        let db = Arc::clone(&self.ctx.db);
        self.ctx.idle.add_task(move || async move {
            let guard = db.lock().expect("db lock poisoned");
            guard.batch_insert_messages(&records)?;
            guard.batch_insert_message_fts(&fts_rows)?;
            Ok(())
        });
    }

    /// Pull one page of server-side history and batch it into local
    /// storage. Failures are swallowed; the next sync attempt heals.
    pub async fn sync_from_server(&self, chat_id: &str, page: u32) {
        let fetched = safe_execute(
            "get_message_list",
            self.ctx.api.get_message_list(chat_id, page, self.page_size),
        )
        .await;
        if let Some(wires) = fetched {
            if !wires.is_empty() {
                self.sync_history(wires);
            }
        }
    }

    /// Replace a group's roster from the server.
    pub async fn refresh_group_roster(&self, group_id: &str) {
        if let Some(members) = safe_execute(
            "get_group_members",
            self.ctx.api.get_group_members(group_id),
        )
        .await
        {
            self.ctx.groups.roster(group_id).seed(members);
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Human line for a group-operation delta, resolved against the
    /// roster as it stands before the delta applies.
    fn describe_group_operation(&self, group_id: &str, op: &GroupOperationBody) -> String {
        let handle = self.ctx.groups.roster(group_id).handle();
        let operator = handle.display_name(&op.operator_id);
        let targets = op
            .target_ids
            .iter()
            .map(|id| handle.display_name(id))
            .collect::<Vec<_>>()
            .join(", ");

        match GroupOpKind::from_code(op.op_code) {
            GroupOpKind::Join => format!("{targets} joined the group"),
            GroupOpKind::Leave => format!("{operator} left the group"),
            GroupOpKind::Kick => format!("{operator} removed {targets}"),
            GroupOpKind::Promote => format!("{operator} made {targets} an admin"),
            GroupOpKind::Demote | GroupOpKind::SetRole => {
                format!("{operator} changed the role of {targets}")
            }
            GroupOpKind::TransferOwner => {
                format!("{operator} transferred ownership to {targets}")
            }
            GroupOpKind::MuteMember => format!("{operator} muted {targets}"),
            GroupOpKind::UnmuteMember => format!("{operator} unmuted {targets}"),
            GroupOpKind::MuteAll => format!("{operator} muted the group"),
            GroupOpKind::UnmuteAll => format!("{operator} unmuted the group"),
            GroupOpKind::SetInfo => format!("{operator} changed the group info"),
            GroupOpKind::SetAnnouncement => format!("{operator} updated the announcement"),
            GroupOpKind::SetJoinMode => format!("{operator} changed how members join"),
            GroupOpKind::Dismiss => "The group was dismissed".to_string(),
            GroupOpKind::Unrecognized(_) => "[Group notice]".to_string(),
        }
    }

    /// The peer key a message's conversation is looked up by: the group
    /// id for group traffic, the other participant for single chats.
    fn conversation_peer(&self, message: &Message) -> String {
        match message.chat_type {
            ChatType::Group => message.to_id.clone(),
            ChatType::Single => {
                if message.from_id == self.ctx.owner_id {
                    message.to_id.clone()
                } else {
                    message.from_id.clone()
                }
            }
        }
    }

    fn chat_id_for_peer(&self, conv_peer: &str) -> Option<String> {
        let state = self.state.lock().expect("session state poisoned");
        state
            .chats
            .iter()
            .find(|c| c.to_id == conv_peer)
            .map(|c| c.chat_id.clone())
    }

    fn record_to_message(&self, record: MessageRecord) -> Message {
        let body =
            codec::decode_or_unknown(&Value::String(record.body.clone()), record.content_type);

        let (chat_type, chat_to_id) = {
            let state = self.state.lock().expect("session state poisoned");
            state
                .chats
                .iter()
                .find(|c| c.chat_id == record.chat_id)
                .map(|c| (c.chat_type, c.to_id.clone()))
                .unwrap_or((ChatType::Single, record.chat_id.clone()))
        };

        let to_id = match chat_type {
            ChatType::Group => chat_to_id,
            ChatType::Single => {
                if record.from_id == self.ctx.owner_id {
                    chat_to_id
                } else {
                    self.ctx.owner_id.clone()
                }
            }
        };

        Message {
            from_id: record.from_id,
            to_id,
            chat_type,
            message_id: Some(record.id),
            message_temp_id: None,
            message_time: record.message_time,
            sequence: record.sequence,
            content_type: record.content_type,
            body,
        }
    }

    fn schedule_chat_upsert(&self, chat: Chat, fts_text: Option<String>) {
        let db = Arc::clone(&self.ctx.db);
        self.ctx.idle.add_task(move || async move {
            let guard = db.lock().expect("db lock poisoned");
            guard.upsert_chat(&chat)?;
            if let Some(text) = fts_text {
                guard.upsert_chat_fts(&chat.chat_id, &chat.name, &text)?;
            }
            Ok(())
        });
    }

    fn schedule_chat_patch(&self, chat_id: String, patch: ChatPatch) {
        let db = Arc::clone(&self.ctx.db);
        self.ctx.idle.add_task(move || async move {
            let guard = db.lock().expect("db lock poisoned");
            guard.patch_chat(&chat_id, &patch)?;
            Ok(())
        });
    }
}

/// Display order: pinned first, then newest activity; stable for ties.
fn sort_chats(chats: &mut [Chat]) {
    chats.sort_by(|a, b| {
        b.is_top
            .cmp(&a.is_top)
            .then(b.message_time.cmp(&a.message_time))
    });
}

/// Insert into the visible list at the position its sequence dictates.
/// Unacked outgoing messages (sequence 0) append at the end.
fn insert_by_sequence(visible: &mut Vec<Message>, message: Message) {
    if message.sequence <= 0 {
        visible.push(message);
        return;
    }
    let pos = visible
        .iter()
        .rposition(|m| m.sequence <= message.sequence)
        .map(|p| p + 1)
        .unwrap_or(0);
    visible.insert(pos, message);
}
