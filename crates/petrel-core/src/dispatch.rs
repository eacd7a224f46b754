//! Pipeline wiring: socket envelope in, reconciled session state out.
//!
//! [`Pipeline::submit`] classifies the envelope into a queue lane and
//! spawns the per-item consumer. Consumers are isolated: one malformed
//! message logs a warning and the drain keeps flowing. Session-control
//! codes (forced logout, token refresh, registration and heartbeat
//! acks) are routed to the host's [`ControlEvents`] handler — auth
//! handling itself lives outside the pipeline.

use std::sync::Arc;

use tokio::task::JoinHandle;

use petrel_shared::codec::{self, DecodeError};
use petrel_shared::codes::{self, priority_for};
use petrel_shared::envelope::InboundEnvelope;
use petrel_shared::message::WireMessage;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::notify::ControlEvents;
use crate::queue::InboundQueue;
use crate::session::SessionReconciler;

pub struct Pipeline {
    queue: InboundQueue,
    reconciler: Arc<SessionReconciler>,
    control: Arc<dyn ControlEvents>,
}

impl Pipeline {
    pub fn new(
        config: &PipelineConfig,
        reconciler: Arc<SessionReconciler>,
        control: Arc<dyn ControlEvents>,
    ) -> Self {
        Self {
            queue: InboundQueue::new(config.queue.clone()),
            reconciler,
            control,
        }
    }

    pub fn queue(&self) -> &InboundQueue {
        &self.queue
    }

    /// Enqueue one socket payload. Returns the consumer task handle so
    /// hosts (and tests) can await completion of the processing.
    pub fn submit(&self, envelope: InboundEnvelope) -> JoinHandle<()> {
        let priority = priority_for(envelope.code);
        let rx = self.queue.push(envelope, priority);

        let reconciler = Arc::clone(&self.reconciler);
        let control = Arc::clone(&self.control);
        tokio::spawn(async move {
            // A closed queue means the session is tearing down.
            let Ok(delivery) = rx.await else { return };
            let code = delivery.envelope.code;
            if let Err(err) = process(&reconciler, &control, delivery.envelope).await {
                tracing::warn!(code, error = %err, "inbound event failed; pipeline continues");
            }
        })
    }
}

async fn process(
    reconciler: &SessionReconciler,
    control: &Arc<dyn ControlEvents>,
    envelope: InboundEnvelope,
) -> Result<(), PipelineError> {
    match envelope.code {
        codes::SINGLE_MESSAGE | codes::GROUP_MESSAGE | codes::VIDEO_MESSAGE
        | codes::GROUP_OPERATION => {
            let message = normalize_envelope(&envelope)?;
            reconciler.ingest(message).await;
            Ok(())
        }
        codes::MESSAGE_OPERATION => {
            let message = normalize_envelope(&envelope)?;
            reconciler.apply_operation(message).await
        }
        _ => {
            control.on_control(&envelope);
            Ok(())
        }
    }
}

fn normalize_envelope(
    envelope: &InboundEnvelope,
) -> Result<petrel_shared::message::Message, PipelineError> {
    let wire: WireMessage =
        serde_json::from_value(envelope.data.clone()).map_err(DecodeError::MalformedJson)?;

    let (message, decode_err) = codec::normalize(&wire);
    if let Some(err) = decode_err {
        // The message still flows, rendered as an unknown placeholder.
        tracing::warn!(
            code = envelope.code,
            error = %err,
            "message body kept as unknown placeholder"
        );
    }
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    use serde_json::json;

    use crate::config::{DraftConfig, IdleConfig};
    use crate::draft::DraftManager;
    use crate::group::GroupDirectory;
    use crate::idle::IdleExecutor;
    use crate::notify::{NoopNotifier, Notifier};
    use crate::session::SessionContext;
    use petrel_store::Database;

    use crate::api::{ApiError, ChatApi};
    use async_trait::async_trait;
    use petrel_shared::types::{ChatType, GroupMember};
    use petrel_store::Chat;

    struct StubApi;

    #[async_trait]
    impl ChatApi for StubApi {
        async fn get_chat(
            &self,
            owner_id: &str,
            to_id: &str,
            chat_type: ChatType,
        ) -> Result<Chat, ApiError> {
            Ok(Chat::materialize(
                format!("chat-{to_id}"),
                owner_id,
                to_id,
                chat_type,
                to_id,
            ))
        }

        async fn create_chat(
            &self,
            owner_id: &str,
            to_id: &str,
            chat_type: ChatType,
        ) -> Result<Chat, ApiError> {
            self.get_chat(owner_id, to_id, chat_type).await
        }

        async fn get_chat_list(&self, _owner_id: &str) -> Result<Vec<Chat>, ApiError> {
            Ok(Vec::new())
        }

        async fn get_message_list(
            &self,
            _chat_id: &str,
            _page: u32,
            _page_size: u32,
        ) -> Result<Vec<WireMessage>, ApiError> {
            Ok(Vec::new())
        }

        async fn recall_message(&self, _chat_id: &str, _message_id: &str) -> Result<(), ApiError> {
            Ok(())
        }

        async fn get_group_members(&self, _group_id: &str) -> Result<Vec<GroupMember>, ApiError> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct RecordingControl {
        seen: StdMutex<Vec<i32>>,
    }

    impl ControlEvents for RecordingControl {
        fn on_control(&self, envelope: &InboundEnvelope) {
            self.seen.lock().unwrap().push(envelope.code);
        }
    }

    fn pipeline_with_control(
        control: Arc<dyn ControlEvents>,
    ) -> (Pipeline, Arc<SessionReconciler>, IdleExecutor) {
        let db = Arc::new(StdMutex::new(Database::open_in_memory().unwrap()));
        let idle = IdleExecutor::new(IdleConfig::default());
        let drafts = DraftManager::new(Arc::clone(&db), DraftConfig::default());

        let ctx = SessionContext {
            owner_id: "me".into(),
            db,
            idle: idle.clone(),
            api: Arc::new(StubApi),
            notifier: Arc::new(NoopNotifier) as Arc<dyn Notifier>,
            groups: GroupDirectory::new(),
            drafts,
        };
        let reconciler = Arc::new(SessionReconciler::new(ctx, &PipelineConfig::default()));
        let pipeline = Pipeline::new(
            &PipelineConfig::default(),
            Arc::clone(&reconciler),
            control,
        );
        (pipeline, reconciler, idle)
    }

    fn message_envelope(code: i32, from: &str, to: &str, id: &str, sequence: i64) -> InboundEnvelope {
        InboundEnvelope::new(
            code,
            json!({
                "fromId": from,
                "toId": to,
                "chatType": if code == codes::GROUP_MESSAGE { 2 } else { 1 },
                "messageId": id,
                "messageTime": sequence * 100,
                "sequence": sequence,
                "messageContentType": 1,
                "messageBody": {"content": format!("msg {id}")}
            }),
        )
    }

    #[tokio::test]
    async fn urgent_control_beats_earlier_heartbeat() {
        let control = Arc::new(RecordingControl::default());
        let (pipeline, _reconciler, _idle) =
            pipeline_with_control(Arc::clone(&control) as Arc<dyn ControlEvents>);

        let hb = pipeline.submit(InboundEnvelope::new(codes::HEART_BEAT_SUCCESS, json!(null)));
        let logout = pipeline.submit(InboundEnvelope::new(codes::FORCE_LOGOUT, json!(null)));

        hb.await.unwrap();
        logout.await.unwrap();

        let seen = control.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![codes::FORCE_LOGOUT, codes::HEART_BEAT_SUCCESS]);
    }

    #[tokio::test]
    async fn single_message_flows_into_the_chat_list() {
        let (pipeline, reconciler, idle) =
            pipeline_with_control(Arc::new(crate::notify::NoopControl));

        pipeline
            .submit(message_envelope(codes::SINGLE_MESSAGE, "u2", "me", "m1", 1))
            .await
            .unwrap();
        idle.wait_until_idle().await;

        let chats = reconciler.chats();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].to_id, "u2");
        assert_eq!(chats[0].unread, 1);
        assert!(chats[0].preview.contains("msg m1"));
    }

    #[tokio::test]
    async fn malformed_payload_does_not_wedge_the_pipeline() {
        let (pipeline, reconciler, idle) =
            pipeline_with_control(Arc::new(crate::notify::NoopControl));

        // Garbage first; a valid message right behind it must land.
        pipeline
            .submit(InboundEnvelope::new(
                codes::SINGLE_MESSAGE,
                json!({"this": "is not a wire message"}),
            ))
            .await
            .unwrap();
        pipeline
            .submit(message_envelope(codes::SINGLE_MESSAGE, "u2", "me", "m1", 1))
            .await
            .unwrap();
        idle.wait_until_idle().await;

        assert_eq!(reconciler.chats().len(), 1);
    }

    #[tokio::test]
    async fn recall_operation_tombstones_the_target() {
        let (pipeline, reconciler, idle) =
            pipeline_with_control(Arc::new(crate::notify::NoopControl));

        pipeline
            .submit(message_envelope(codes::SINGLE_MESSAGE, "u2", "me", "m1", 1))
            .await
            .unwrap();
        idle.wait_until_idle().await;

        let recall = InboundEnvelope::new(
            codes::MESSAGE_OPERATION,
            json!({
                "fromId": "u2",
                "toId": "me",
                "chatType": 1,
                "messageId": "m1",
                "messageTime": 200,
                "sequence": 2,
                "messageContentType": 13,
                "messageBody": {
                    "recalled": true,
                    "operator_id": "u2",
                    "recall_time": 200
                }
            }),
        );
        pipeline.submit(recall).await.unwrap();
        idle.wait_until_idle().await;

        let db = reconciler.context().db.lock().unwrap();
        let row = db.select_message("m1").unwrap();
        assert_eq!(
            row.content_type,
            petrel_shared::message::ContentType::Recall
        );
        assert!(db.search_messages("msg", 5).unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_codes_reach_the_control_handler() {
        let control = Arc::new(RecordingControl::default());
        let (pipeline, _reconciler, _idle) =
            pipeline_with_control(Arc::clone(&control) as Arc<dyn ControlEvents>);

        pipeline
            .submit(InboundEnvelope::new(4242, json!({"future": true})))
            .await
            .unwrap();

        assert_eq!(control.seen.lock().unwrap().clone(), vec![4242]);
    }
}
