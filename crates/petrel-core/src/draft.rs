//! Per-conversation draft cache with debounced persistence.
//!
//! Edits land in an in-memory cache immediately; a debounce timer
//! persists them after a quiet period. The timer is the one cancelable
//! piece of the pipeline: switching conversations must flush or discard
//! a pending save deterministically, never let a stale timer fire
//! against the wrong conversation. The save lifecycle is observable
//! through a watch channel so those races are testable.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use petrel_store::Database;

use crate::config::DraftConfig;

/// Observable state of the most recent save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftSaveState {
    /// No save has been scheduled yet.
    Idle,
    /// A debounce timer is armed.
    Pending,
    /// The last scheduled save reached the store.
    Flushed,
    /// The last scheduled save was cancelled before firing.
    Cancelled,
}

struct PendingSave {
    chat_id: String,
    handle: JoinHandle<()>,
}

struct Inner {
    db: Arc<Mutex<Database>>,
    debounce: Duration,
    cache: Mutex<HashMap<String, String>>,
    pending: Mutex<Option<PendingSave>>,
    state_tx: watch::Sender<DraftSaveState>,
    state_rx: watch::Receiver<DraftSaveState>,
}

/// Cloneable draft manager handle.
#[derive(Clone)]
pub struct DraftManager {
    inner: Arc<Inner>,
}

impl DraftManager {
    pub fn new(db: Arc<Mutex<Database>>, config: DraftConfig) -> Self {
        let (state_tx, state_rx) = watch::channel(DraftSaveState::Idle);
        Self {
            inner: Arc::new(Inner {
                db,
                debounce: config.debounce(),
                cache: Mutex::new(HashMap::new()),
                pending: Mutex::new(None),
                state_tx,
                state_rx,
            }),
        }
    }

    /// Record an edit and (re)arm the debounce timer.
    ///
    /// An empty or whitespace-only draft means "no draft": the cache
    /// entry is dropped and the eventual save deletes the row.
    pub fn set_draft(&self, chat_id: &str, content: &str) {
        {
            let mut cache = self.inner.cache.lock().expect("draft cache poisoned");
            if content.trim().is_empty() {
                cache.remove(chat_id);
            } else {
                cache.insert(chat_id.to_string(), content.to_string());
            }
        }

        self.abort_pending();

        let inner = Arc::clone(&self.inner);
        let chat_id_owned = chat_id.to_string();
        let content_owned = content.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            persist(&inner, &chat_id_owned, &content_owned);
            {
                let mut pending = inner.pending.lock().expect("pending lock poisoned");
                *pending = None;
            }
            let _ = inner.state_tx.send(DraftSaveState::Flushed);
        });

        {
            let mut pending = self.inner.pending.lock().expect("pending lock poisoned");
            *pending = Some(PendingSave {
                chat_id: chat_id.to_string(),
                handle,
            });
        }
        let _ = self.inner.state_tx.send(DraftSaveState::Pending);
    }

    /// Current draft for a conversation: cache first, store second.
    pub fn load(&self, chat_id: &str) -> Option<String> {
        if let Some(content) = self
            .inner
            .cache
            .lock()
            .expect("draft cache poisoned")
            .get(chat_id)
            .cloned()
        {
            return Some(content);
        }

        let db = self.inner.db.lock().expect("db lock poisoned");
        match db.get_draft(chat_id) {
            Ok(found) => found.map(|draft| draft.content),
            Err(err) => {
                tracing::warn!(chat_id, error = %err, "failed to load draft");
                None
            }
        }
    }

    /// Flush the pending save (if any) immediately. Called on
    /// conversation switch so the outgoing conversation's draft is
    /// durable before the view changes.
    pub fn flush(&self) {
        let Some(pending) = self.take_pending() else {
            return;
        };
        pending.handle.abort();

        let content = self
            .inner
            .cache
            .lock()
            .expect("draft cache poisoned")
            .get(&pending.chat_id)
            .cloned()
            .unwrap_or_default();
        persist(&self.inner, &pending.chat_id, &content);
        let _ = self.inner.state_tx.send(DraftSaveState::Flushed);
    }

    /// Drop the pending save without persisting.
    pub fn cancel(&self) {
        if let Some(pending) = self.take_pending() {
            pending.handle.abort();
            let _ = self.inner.state_tx.send(DraftSaveState::Cancelled);
        }
    }

    /// Forget a conversation's draft entirely: cache, timer, and row.
    /// Used when the conversation is deleted.
    pub fn clear(&self, chat_id: &str) {
        {
            let mut cache = self.inner.cache.lock().expect("draft cache poisoned");
            cache.remove(chat_id);
        }

        let pending_for_chat = {
            let pending = self.inner.pending.lock().expect("pending lock poisoned");
            pending
                .as_ref()
                .map(|p| p.chat_id == chat_id)
                .unwrap_or(false)
        };
        if pending_for_chat {
            self.cancel();
        }

        let db = self.inner.db.lock().expect("db lock poisoned");
        if let Err(err) = db.delete_draft(chat_id) {
            tracing::warn!(chat_id, error = %err, "failed to delete draft row");
        }
    }

    /// Snapshot of the save lifecycle.
    pub fn save_state(&self) -> DraftSaveState {
        *self.inner.state_rx.borrow()
    }

    /// Watch the save lifecycle; used by tests and by hosts that block
    /// shutdown on a pending save.
    pub fn subscribe(&self) -> watch::Receiver<DraftSaveState> {
        self.inner.state_rx.clone()
    }

    fn abort_pending(&self) {
        if let Some(pending) = self.take_pending() {
            pending.handle.abort();
        }
    }

    fn take_pending(&self) -> Option<PendingSave> {
        self.inner
            .pending
            .lock()
            .expect("pending lock poisoned")
            .take()
    }
}

fn persist(inner: &Inner, chat_id: &str, content: &str) {
    let db = inner.db.lock().expect("db lock poisoned");
    if let Err(err) = db.set_draft(chat_id, content) {
        tracing::warn!(chat_id, error = %err, "failed to persist draft");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (DraftManager, Arc<Mutex<Database>>) {
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let config = DraftConfig { debounce_ms: 300 };
        (DraftManager::new(Arc::clone(&db), config), db)
    }

    fn stored(db: &Arc<Mutex<Database>>, chat_id: &str) -> Option<String> {
        db.lock()
            .unwrap()
            .get_draft(chat_id)
            .unwrap()
            .map(|d| d.content)
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_flushes_after_quiet_period() {
        let (drafts, db) = manager();

        drafts.set_draft("c1", "<p>unsent</p>");
        assert_eq!(drafts.save_state(), DraftSaveState::Pending);
        assert_eq!(stored(&db, "c1"), None);

        let mut state = drafts.subscribe();
        state
            .wait_for(|s| *s == DraftSaveState::Flushed)
            .await
            .unwrap();

        assert_eq!(stored(&db, "c1"), Some("<p>unsent</p>".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_collapse_into_the_last_save() {
        let (drafts, db) = manager();

        drafts.set_draft("c1", "first");
        drafts.set_draft("c1", "second");

        let mut state = drafts.subscribe();
        state
            .wait_for(|s| *s == DraftSaveState::Flushed)
            .await
            .unwrap();

        assert_eq!(stored(&db, "c1"), Some("second".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_the_pending_save() {
        let (drafts, db) = manager();

        drafts.set_draft("c1", "doomed");
        drafts.cancel();
        assert_eq!(drafts.save_state(), DraftSaveState::Cancelled);

        // Even well past the debounce, nothing was written.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(stored(&db, "c1"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_persists_immediately_on_switch() {
        let (drafts, db) = manager();

        drafts.set_draft("c1", "leaving soon");
        drafts.flush();

        assert_eq!(drafts.save_state(), DraftSaveState::Flushed);
        assert_eq!(stored(&db, "c1"), Some("leaving soon".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_draft_deletes_the_row() {
        let (drafts, db) = manager();

        drafts.set_draft("c1", "something");
        drafts.flush();
        assert_eq!(stored(&db, "c1"), Some("something".into()));

        drafts.set_draft("c1", "   ");
        drafts.flush();
        assert_eq!(stored(&db, "c1"), None);
        assert_eq!(drafts.load("c1"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_removes_cache_timer_and_row() {
        let (drafts, db) = manager();

        drafts.set_draft("c1", "bye");
        drafts.flush();
        drafts.set_draft("c1", "newer");
        drafts.clear("c1");

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(stored(&db, "c1"), None);
        assert_eq!(drafts.load("c1"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn load_falls_back_to_the_store() {
        let (drafts, db) = manager();
        db.lock().unwrap().set_draft("c9", "from disk").unwrap();

        assert_eq!(drafts.load("c9"), Some("from disk".into()));
    }
}
