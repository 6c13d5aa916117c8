//! Chat session manager.
//!
//! `ChatSession` owns the thread collection and the active view, applies
//! optimistic local mutations, persists the resulting snapshot after every
//! change, and folds streamed assistant output back into both the live view
//! and the durable thread.
//!
//! Invalid preconditions (no thread selected, no model selected, unknown
//! ids) are silent no-ops; they are reported as [`SendOutcome::Ignored`]
//! rather than errors.

use super::backend::{ChatBackend, SendMessageRequest};
use super::message::Message;
use super::model::{timestamp_thread_id, ChatThread};
use super::store::ChatStore;
use crate::error::Result;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;

/// Notifications published to presentation subscribers.
///
/// The session pushes these over unbounded channels so the UI can observe
/// state changes without polling.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The thread collection changed (create/rename/delete/persisted reply).
    ThreadsChanged,
    /// The active view was replaced or appended to.
    ViewChanged,
    /// An assistant reply started streaming; the view now ends with an empty
    /// placeholder message.
    ReplyStarted { thread_id: i64 },
    /// A cumulative snapshot of the in-progress reply. Carries the entire
    /// accumulated text so far, never a delta.
    ReplyChunk { thread_id: i64, text: String },
    /// The reply stream completed and the final text was persisted.
    ReplyFinished { thread_id: i64, text: String },
    /// The send request failed before any reply text arrived. The
    /// placeholder is left showing empty text and nothing was persisted
    /// beyond the user's own message.
    ReplyAborted { thread_id: i64 },
    /// A user-visible notification (rename/delete confirmations etc.).
    Notice(String),
}

/// Result of a send or edit operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The reply stream ran to completion and was persisted.
    Completed,
    /// The request failed before a body was available; only the user's
    /// message was persisted.
    Aborted,
    /// Preconditions were not met (no thread or no model selected, invalid
    /// index); nothing happened.
    Ignored,
}

#[derive(Debug, Default)]
struct SessionState {
    threads: Vec<ChatThread>,
    selected: Option<i64>,
    /// Live message view of the selected thread. May end with a
    /// not-yet-persisted assistant placeholder while a send is in flight.
    view: Vec<Message>,
    models: Vec<String>,
    selected_model: Option<String>,
    pending_delete: Option<i64>,
    sending: bool,
}

impl SessionState {
    fn thread(&self, id: i64) -> Option<&ChatThread> {
        self.threads.iter().find(|t| t.id == id)
    }

    fn thread_mut(&mut self, id: i64) -> Option<&mut ChatThread> {
        self.threads.iter_mut().find(|t| t.id == id)
    }
}

/// The central session manager.
///
/// All state lives behind a `RwLock`; methods take `&self` and never hold
/// the lock across an await point. Mutations follow "mutate in-memory state,
/// then persist the resulting snapshot".
pub struct ChatSession {
    state: RwLock<SessionState>,
    store: Arc<dyn ChatStore>,
    backend: Arc<dyn ChatBackend>,
    subscribers: Mutex<Vec<UnboundedSender<SessionEvent>>>,
}

impl ChatSession {
    /// Creates a session manager over the given store and backend.
    pub fn new(store: Arc<dyn ChatStore>, backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            state: RwLock::new(SessionState::default()),
            store,
            backend,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Loads the persisted thread collection into memory.
    ///
    /// Called once at startup. Malformed persisted data arrives here as an
    /// empty collection (the store guarantees that), so only genuine I/O
    /// failures surface.
    pub async fn load(&self) -> Result<()> {
        let threads = self.store.load_all().await?;
        let mut state = self.state.write().await;
        state.threads = threads;
        drop(state);
        self.emit(SessionEvent::ThreadsChanged);
        Ok(())
    }

    /// Subscribes to session events.
    pub fn subscribe(&self) -> UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .expect("subscriber registry poisoned")
            .push(tx);
        rx
    }

    fn emit(&self, event: SessionEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .expect("subscriber registry poisoned");
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Refreshes the model set from the backend.
    ///
    /// A fetch failure is logged and degrades to an empty model set; it is
    /// never surfaced as a blocking error. The first model in the backend's
    /// response order becomes the default selection.
    pub async fn refresh_models(&self) -> Vec<String> {
        let models = match self.backend.list_models().await {
            Ok(models) => models,
            Err(e) => {
                tracing::warn!("Failed to fetch model list: {}", e);
                Vec::new()
            }
        };
        self.set_models(models.clone()).await;
        models
    }

    /// Replaces the model set, selecting the first entry if present.
    pub async fn set_models(&self, models: Vec<String>) {
        let mut state = self.state.write().await;
        state.selected_model = models.first().cloned();
        state.models = models;
    }

    /// Selects a model from the available set. Unknown names are ignored.
    pub async fn select_model(&self, name: &str) -> bool {
        let mut state = self.state.write().await;
        if state.models.iter().any(|m| m == name) {
            state.selected_model = Some(name.to_string());
            true
        } else {
            tracing::debug!("Ignoring selection of unknown model '{}'", name);
            false
        }
    }

    /// Creates a new thread, selects it and persists the collection.
    ///
    /// Returns the new thread id. Ids are creation timestamps in
    /// milliseconds, bumped until unique within the collection.
    pub async fn create_thread(&self) -> Result<i64> {
        let snapshot = {
            let mut state = self.state.write().await;
            let mut id = timestamp_thread_id();
            while state.thread(id).is_some() {
                id += 1;
            }
            let name = format!("Chat {}", state.threads.len() + 1);
            state.threads.push(ChatThread::new(id, name));
            state.selected = Some(id);
            state.view.clear();
            (id, state.threads.clone())
        };
        self.store.save_all(&snapshot.1).await?;
        self.emit(SessionEvent::ThreadsChanged);
        self.emit(SessionEvent::ViewChanged);
        Ok(snapshot.0)
    }

    /// Makes the given thread active and loads its messages into the view.
    ///
    /// Selecting a nonexistent id is a silent no-op; prior selection and
    /// view stay untouched.
    pub async fn select_thread(&self, id: i64) {
        let mut state = self.state.write().await;
        let Some(thread) = state.thread(id) else {
            tracing::debug!("Ignoring selection of unknown thread {}", id);
            return;
        };
        state.view = thread.messages.clone();
        state.selected = Some(id);
        drop(state);
        self.emit(SessionEvent::ViewChanged);
    }

    /// Renames a thread and persists the collection.
    ///
    /// The new name is not validated (empty names are accepted); unknown
    /// ids are silent no-ops.
    pub async fn rename_thread(&self, id: i64, new_name: impl Into<String>) -> Result<()> {
        let new_name = new_name.into();
        let snapshot = {
            let mut state = self.state.write().await;
            let Some(thread) = state.thread_mut(id) else {
                tracing::debug!("Ignoring rename of unknown thread {}", id);
                return Ok(());
            };
            thread.name = new_name.clone();
            state.threads.clone()
        };
        self.store.save_all(&snapshot).await?;
        self.emit(SessionEvent::ThreadsChanged);
        self.emit(SessionEvent::Notice(format!(
            "Chat renamed to '{}'",
            new_name
        )));
        Ok(())
    }

    /// First phase of deletion: arms the confirmation for the given thread.
    ///
    /// Returns the thread name for the confirmation prompt, or `None` if the
    /// id is unknown (nothing is armed).
    pub async fn request_delete(&self, id: i64) -> Option<String> {
        let mut state = self.state.write().await;
        let name = state.thread(id).map(|t| t.name.clone())?;
        state.pending_delete = Some(id);
        Some(name)
    }

    /// Second phase of deletion: removes the armed thread and persists.
    ///
    /// Clears the selection (and view) if the deleted thread was active.
    /// A no-op when no deletion is armed.
    pub async fn confirm_delete(&self) -> Result<()> {
        let snapshot = {
            let mut state = self.state.write().await;
            let Some(id) = state.pending_delete.take() else {
                return Ok(());
            };
            state.threads.retain(|t| t.id != id);
            if state.selected == Some(id) {
                state.selected = None;
                state.view.clear();
            }
            state.threads.clone()
        };
        self.store.save_all(&snapshot).await?;
        self.emit(SessionEvent::ThreadsChanged);
        self.emit(SessionEvent::ViewChanged);
        self.emit(SessionEvent::Notice("Chat deleted".to_string()));
        Ok(())
    }

    /// Declines an armed deletion, leaving all state untouched.
    pub async fn cancel_delete(&self) {
        let mut state = self.state.write().await;
        state.pending_delete = None;
    }

    /// Sends a user message on the active thread and streams the reply.
    ///
    /// Steps: append the user message to thread and view and persist; append
    /// an empty assistant placeholder to the view only; drive the backend
    /// and replace the placeholder text with each cumulative snapshot; on
    /// stream completion persist the final assistant message.
    ///
    /// A no-op (`Ignored`) when no thread or no model is selected.
    pub async fn send_message(&self, text: impl Into<String>) -> Result<SendOutcome> {
        let text = text.into();
        let (chat_id, model, snapshot) = {
            let mut state = self.state.write().await;
            let Some(chat_id) = state.selected else {
                return Ok(SendOutcome::Ignored);
            };
            let Some(model) = state.selected_model.clone() else {
                return Ok(SendOutcome::Ignored);
            };
            let Some(thread) = state.thread_mut(chat_id) else {
                return Ok(SendOutcome::Ignored);
            };
            thread.messages.push(Message::user(text.clone()));
            // Rebuilding the view from the thread drops any stale
            // placeholder left by an earlier aborted send, keeping view
            // indices aligned with thread indices.
            let messages = thread.messages.clone();
            state.view = messages;
            (chat_id, model, state.threads.clone())
        };
        self.store.save_all(&snapshot).await?;
        self.emit(SessionEvent::ThreadsChanged);
        self.emit(SessionEvent::ViewChanged);

        self.stream_reply(chat_id, model, text).await
    }

    /// Edits the user message at `index` in the active thread and replays
    /// the conversation from that point.
    ///
    /// Replaces the text, truncates the thread (and view) to end at `index`
    /// inclusive, persists the truncated sequence, then re-runs the
    /// streaming pipeline against the truncated history. The edited message
    /// is not appended a second time; exactly one new send is triggered.
    pub async fn edit_message(
        &self,
        index: usize,
        new_text: impl Into<String>,
    ) -> Result<SendOutcome> {
        let new_text = new_text.into();
        let (chat_id, model, snapshot) = {
            let mut state = self.state.write().await;
            let Some(chat_id) = state.selected else {
                return Ok(SendOutcome::Ignored);
            };
            let Some(model) = state.selected_model.clone() else {
                return Ok(SendOutcome::Ignored);
            };
            let Some(thread) = state.thread_mut(chat_id) else {
                return Ok(SendOutcome::Ignored);
            };
            // Only user messages can be edited.
            if !thread.messages.get(index).is_some_and(|m| m.is_user) {
                return Ok(SendOutcome::Ignored);
            }
            thread.messages[index].text = new_text.clone();
            thread.messages.truncate(index + 1);
            let truncated = thread.messages.clone();
            state.view = truncated;
            (chat_id, model, state.threads.clone())
        };
        self.store.save_all(&snapshot).await?;
        self.emit(SessionEvent::ThreadsChanged);
        self.emit(SessionEvent::ViewChanged);

        self.stream_reply(chat_id, model, new_text).await
    }

    /// Drives one streaming reply: placeholder, cumulative merge, final
    /// persistence.
    async fn stream_reply(&self, chat_id: i64, model: String, content: String) -> Result<SendOutcome> {
        let (placeholder_index, history) = {
            let mut state = self.state.write().await;
            state.sending = true;
            let history = state
                .thread(chat_id)
                .map(|t| t.messages.clone())
                .unwrap_or_default();
            // The placeholder sits right after the thread's messages, so
            // its view index is the thread length at send time.
            if state.selected == Some(chat_id) {
                state.view.push(Message::assistant(""));
            }
            (history.len(), history)
        };
        self.emit(SessionEvent::ReplyStarted { thread_id: chat_id });

        let request = SendMessageRequest {
            content,
            model,
            history,
            chat_id,
        };
        let mut stream = match self.backend.send_message(request).await {
            Ok(stream) => stream,
            Err(e) => {
                // Aborted before a body was available: the user's message is
                // already persisted, the placeholder stays empty and is
                // never written to the store.
                tracing::warn!("send-message request failed: {}", e);
                let mut state = self.state.write().await;
                state.sending = false;
                drop(state);
                self.emit(SessionEvent::ReplyAborted { thread_id: chat_id });
                return Ok(SendOutcome::Aborted);
            }
        };

        // Each snapshot is the whole accumulated reply; merging is a full
        // replacement of the placeholder text, idempotent per snapshot.
        let mut final_text = String::new();
        while let Some(accumulated) = stream.recv().await {
            final_text = accumulated.clone();
            let mut state = self.state.write().await;
            // The view belongs to whichever thread is selected now; only
            // patch it while that is still the streaming thread.
            if state.selected == Some(chat_id) {
                if let Some(slot) = state.view.get_mut(placeholder_index) {
                    slot.text = accumulated.clone();
                }
            }
            drop(state);
            self.emit(SessionEvent::ReplyChunk {
                thread_id: chat_id,
                text: accumulated,
            });
        }

        let snapshot = {
            let mut state = self.state.write().await;
            state.sending = false;
            if let Some(thread) = state.thread_mut(chat_id) {
                thread.messages.push(Message::assistant(final_text.clone()));
            }
            if state.selected == Some(chat_id) {
                let messages = state
                    .thread(chat_id)
                    .map(|t| t.messages.clone())
                    .unwrap_or_default();
                state.view = messages;
            }
            state.threads.clone()
        };
        self.store.save_all(&snapshot).await?;
        self.emit(SessionEvent::ThreadsChanged);
        self.emit(SessionEvent::ReplyFinished {
            thread_id: chat_id,
            text: final_text,
        });
        Ok(SendOutcome::Completed)
    }

    /// Returns a snapshot of all threads.
    pub async fn threads(&self) -> Vec<ChatThread> {
        self.state.read().await.threads.clone()
    }

    /// Returns a snapshot of the active view.
    pub async fn view(&self) -> Vec<Message> {
        self.state.read().await.view.clone()
    }

    /// Returns the id of the active thread, if any.
    pub async fn selected_thread_id(&self) -> Option<i64> {
        self.state.read().await.selected
    }

    /// Returns the available model identifiers in backend order.
    pub async fn models(&self) -> Vec<String> {
        self.state.read().await.models.clone()
    }

    /// Returns the currently selected model, if any.
    pub async fn selected_model(&self) -> Option<String> {
        self.state.read().await.selected_model.clone()
    }

    /// Advisory busy flag: `true` while a reply stream is in flight.
    pub async fn is_sending(&self) -> bool {
        self.state.read().await.sending
    }
}
