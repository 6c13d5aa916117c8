use super::backend::{ChatBackend, ReplyStream, SendMessageRequest};
use super::message::Message;
use super::model::ChatThread;
use super::session::{ChatSession, SendOutcome, SessionEvent};
use super::store::ChatStore;
use crate::error::{HaskoError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;

// Mock ChatStore that records every persisted snapshot
struct MockChatStore {
    initial: Mutex<Vec<ChatThread>>,
    saves: Mutex<Vec<Vec<ChatThread>>>,
}

impl MockChatStore {
    fn new() -> Self {
        Self {
            initial: Mutex::new(Vec::new()),
            saves: Mutex::new(Vec::new()),
        }
    }

    fn with_threads(threads: Vec<ChatThread>) -> Self {
        Self {
            initial: Mutex::new(threads),
            saves: Mutex::new(Vec::new()),
        }
    }

    fn last_saved(&self) -> Option<Vec<ChatThread>> {
        self.saves.lock().unwrap().last().cloned()
    }

    fn save_count(&self) -> usize {
        self.saves.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatStore for MockChatStore {
    async fn load_all(&self) -> Result<Vec<ChatThread>> {
        Ok(self.initial.lock().unwrap().clone())
    }

    async fn save_all(&self, threads: &[ChatThread]) -> Result<()> {
        self.saves.lock().unwrap().push(threads.to_vec());
        Ok(())
    }
}

// Scripted backend: each send pops the next reply script
enum ScriptedReply {
    /// Cumulative snapshots delivered in order.
    Snapshots(Vec<&'static str>),
    /// A caller-held channel; the test drives snapshot delivery itself.
    Stream(ReplyStream),
    /// Request fails before any body is available.
    Fail,
}

struct MockBackend {
    models: Result<Vec<String>>,
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<SendMessageRequest>>,
}

impl MockBackend {
    fn new(models: Vec<&str>) -> Self {
        Self {
            models: Ok(models.into_iter().map(String::from).collect()),
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing_models() -> Self {
        Self {
            models: Err(HaskoError::http("connection refused")),
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn script(self, reply: ScriptedReply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    fn requests(&self) -> Vec<SendMessageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn list_models(&self) -> Result<Vec<String>> {
        match &self.models {
            Ok(models) => Ok(models.clone()),
            Err(_) => Err(HaskoError::http("connection refused")),
        }
    }

    async fn send_message(&self, request: SendMessageRequest) -> Result<ReplyStream> {
        self.requests.lock().unwrap().push(request);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted reply left");
        match reply {
            ScriptedReply::Fail => Err(HaskoError::http("status 500")),
            ScriptedReply::Stream(rx) => Ok(rx),
            ScriptedReply::Snapshots(snapshots) => {
                let (tx, rx) = tokio::sync::mpsc::channel(snapshots.len().max(1));
                for snapshot in snapshots {
                    tx.send(snapshot.to_string()).await.unwrap();
                }
                Ok(rx)
            }
        }
    }
}

fn drain(rx: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn session_with(
    store: MockChatStore,
    backend: MockBackend,
) -> (ChatSession, Arc<MockChatStore>, Arc<MockBackend>) {
    let store = Arc::new(store);
    let backend = Arc::new(backend);
    let session = ChatSession::new(store.clone(), backend.clone());
    (session, store, backend)
}

#[tokio::test]
async fn test_create_thread_selects_and_persists() {
    let (session, store, _) = session_with(MockChatStore::new(), MockBackend::new(vec!["a"]));

    let id = session.create_thread().await.unwrap();

    assert_eq!(session.selected_thread_id().await, Some(id));
    let threads = session.threads().await;
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].name, "Chat 1");
    assert!(threads[0].messages.is_empty());
    // Persisted collection matches the in-memory one exactly
    assert_eq!(store.last_saved().unwrap(), threads);
}

#[tokio::test]
async fn test_thread_ids_are_unique() {
    let (session, _, _) = session_with(MockChatStore::new(), MockBackend::new(vec!["a"]));

    let first = session.create_thread().await.unwrap();
    let second = session.create_thread().await.unwrap();
    let third = session.create_thread().await.unwrap();

    assert_ne!(first, second);
    assert_ne!(second, third);
    let threads = session.threads().await;
    assert_eq!(threads[1].name, "Chat 2");
    assert_eq!(threads[2].name, "Chat 3");
}

#[tokio::test]
async fn test_persisted_matches_memory_across_mutations() {
    let (session, store, _) = session_with(MockChatStore::new(), MockBackend::new(vec!["a"]));

    let first = session.create_thread().await.unwrap();
    assert_eq!(store.last_saved().unwrap(), session.threads().await);

    let _second = session.create_thread().await.unwrap();
    assert_eq!(store.last_saved().unwrap(), session.threads().await);

    session.request_delete(first).await.unwrap();
    session.confirm_delete().await.unwrap();
    assert_eq!(store.last_saved().unwrap(), session.threads().await);
}

#[tokio::test]
async fn test_select_nonexistent_thread_is_noop() {
    let backend = MockBackend::new(vec!["a"]).script(ScriptedReply::Snapshots(vec!["yo"]));
    let (session, _, _) = session_with(MockChatStore::new(), backend);
    session.refresh_models().await;
    let id = session.create_thread().await.unwrap();
    session.send_message("hello").await.unwrap();
    let view_before = session.view().await;
    assert!(!view_before.is_empty());

    session.select_thread(999).await;

    assert_eq!(session.selected_thread_id().await, Some(id));
    assert_eq!(session.view().await, view_before);
}

#[tokio::test]
async fn test_rename_persists_and_notifies() {
    let (session, store, _) = session_with(MockChatStore::new(), MockBackend::new(vec!["a"]));
    let id = session.create_thread().await.unwrap();
    let mut rx = session.subscribe();

    session.rename_thread(id, "Project notes").await.unwrap();

    assert_eq!(session.threads().await[0].name, "Project notes");
    assert_eq!(store.last_saved().unwrap()[0].name, "Project notes");
    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::Notice(n) if n.contains("Project notes"))));
}

#[tokio::test]
async fn test_rename_accepts_empty_name() {
    let (session, _, _) = session_with(MockChatStore::new(), MockBackend::new(vec!["a"]));
    let id = session.create_thread().await.unwrap();

    session.rename_thread(id, "").await.unwrap();

    assert_eq!(session.threads().await[0].name, "");
}

#[tokio::test]
async fn test_cancelled_delete_leaves_state_unchanged() {
    let (session, store, _) = session_with(MockChatStore::new(), MockBackend::new(vec!["a"]));
    let id = session.create_thread().await.unwrap();
    let saves_before = store.save_count();

    let name = session.request_delete(id).await;
    assert_eq!(name.as_deref(), Some("Chat 1"));
    session.cancel_delete().await;

    assert_eq!(session.threads().await.len(), 1);
    assert_eq!(session.selected_thread_id().await, Some(id));
    assert_eq!(store.save_count(), saves_before);

    // A later confirm without a new request is also a no-op
    session.confirm_delete().await.unwrap();
    assert_eq!(session.threads().await.len(), 1);
}

#[tokio::test]
async fn test_confirmed_delete_removes_thread_and_clears_selection() {
    let (session, store, _) = session_with(MockChatStore::new(), MockBackend::new(vec!["a"]));
    let keep = session.create_thread().await.unwrap();
    let doomed = session.create_thread().await.unwrap();

    session.request_delete(doomed).await.unwrap();
    session.confirm_delete().await.unwrap();

    let threads = session.threads().await;
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].id, keep);
    // The deleted thread was selected, so selection is cleared
    assert_eq!(session.selected_thread_id().await, None);
    assert!(session.view().await.is_empty());
    assert_eq!(store.last_saved().unwrap(), threads);
}

#[tokio::test]
async fn test_delete_unselected_thread_keeps_selection() {
    let (session, _, _) = session_with(MockChatStore::new(), MockBackend::new(vec!["a"]));
    let first = session.create_thread().await.unwrap();
    let second = session.create_thread().await.unwrap();
    session.select_thread(first).await;

    session.request_delete(second).await.unwrap();
    session.confirm_delete().await.unwrap();

    assert_eq!(session.selected_thread_id().await, Some(first));
}

#[tokio::test]
async fn test_send_without_thread_is_ignored() {
    let (session, store, backend) =
        session_with(MockChatStore::new(), MockBackend::new(vec!["a"]));
    session.set_models(vec!["a".to_string()]).await;

    let outcome = session.send_message("hello").await.unwrap();

    assert_eq!(outcome, SendOutcome::Ignored);
    assert_eq!(store.save_count(), 0);
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_send_without_model_is_ignored() {
    let (session, _, backend) = session_with(MockChatStore::new(), MockBackend::new(vec![]));
    session.create_thread().await.unwrap();
    session.set_models(Vec::new()).await;

    let outcome = session.send_message("hello").await.unwrap();

    assert_eq!(outcome, SendOutcome::Ignored);
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_streamed_reply_is_cumulative_and_persisted_once() {
    let backend = MockBackend::new(vec!["llama3"])
        .script(ScriptedReply::Snapshots(vec!["Hel", "Hello w", "Helloworld"]));
    let (session, store, backend) = session_with(MockChatStore::new(), backend);
    session.refresh_models().await;
    session.create_thread().await.unwrap();
    let mut rx = session.subscribe();

    let outcome = session.send_message("greet me").await.unwrap();
    assert_eq!(outcome, SendOutcome::Completed);

    // The live view passed through the cumulative snapshot states
    let events = drain(&mut rx);
    let chunks: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::ReplyChunk { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(chunks, vec!["Hel", "Hello w", "Helloworld"]);
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::ReplyStarted { .. })));

    // Final view: user message plus the completed assistant message
    let view = session.view().await;
    assert_eq!(view.len(), 2);
    assert_eq!(view[1], Message::assistant("Helloworld"));

    // The persisted thread contains the final text exactly once
    let persisted = store.last_saved().unwrap();
    let texts: Vec<&str> = persisted[0]
        .messages
        .iter()
        .map(|m| m.text.as_str())
        .collect();
    assert_eq!(texts, vec!["greet me", "Helloworld"]);

    // The request carried the full history including the new user message
    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].content, "greet me");
    assert_eq!(requests[0].model, "llama3");
    assert_eq!(requests[0].history, vec![Message::user("greet me")]);
}

#[tokio::test]
async fn test_failed_send_persists_user_message_only() {
    let backend = MockBackend::new(vec!["llama3"]).script(ScriptedReply::Fail);
    let (session, store, _) = session_with(MockChatStore::new(), backend);
    session.refresh_models().await;
    session.create_thread().await.unwrap();
    let mut rx = session.subscribe();

    let outcome = session.send_message("hello?").await.unwrap();
    assert_eq!(outcome, SendOutcome::Aborted);

    // The user's own message was persisted, but no assistant entry
    let persisted = store.last_saved().unwrap();
    assert_eq!(persisted[0].messages, vec![Message::user("hello?")]);

    // The live placeholder is left showing empty text
    let view = session.view().await;
    assert_eq!(view.len(), 2);
    assert_eq!(view[1], Message::assistant(""));

    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, SessionEvent::ReplyAborted { .. })));
    assert!(!session.is_sending().await);
}

#[tokio::test]
async fn test_empty_stream_persists_empty_reply() {
    // A successful response with no chunks completes with empty text.
    let backend = MockBackend::new(vec!["llama3"]).script(ScriptedReply::Snapshots(vec![]));
    let (session, store, _) = session_with(MockChatStore::new(), backend);
    session.refresh_models().await;
    session.create_thread().await.unwrap();

    let outcome = session.send_message("hi").await.unwrap();

    assert_eq!(outcome, SendOutcome::Completed);
    let persisted = store.last_saved().unwrap();
    assert_eq!(
        persisted[0].messages,
        vec![Message::user("hi"), Message::assistant("")]
    );
}

#[tokio::test]
async fn test_midstream_thread_switch_leaves_other_view_intact() {
    let (tx, rx) = tokio::sync::mpsc::channel(8);
    let backend = MockBackend::new(vec!["llama3"])
        .script(ScriptedReply::Snapshots(vec!["b answer"]))
        .script(ScriptedReply::Stream(rx));
    let (session, _, _) = session_with(MockChatStore::new(), backend);
    let session = Arc::new(session);
    session.refresh_models().await;
    let thread_b = session.create_thread().await.unwrap();
    session.send_message("b question").await.unwrap();
    let thread_a = session.create_thread().await.unwrap();

    // Thread A's reply stays in flight until the test delivers it
    let in_flight = tokio::spawn({
        let session = session.clone();
        async move { session.send_message("a question").await.unwrap() }
    });
    while !session.is_sending().await {
        tokio::task::yield_now().await;
    }

    // Switch to B while A is still streaming, then deliver A's snapshot
    session.select_thread(thread_b).await;
    tx.send("A REPLY".to_string()).await.unwrap();
    drop(tx);
    assert_eq!(in_flight.await.unwrap(), SendOutcome::Completed);

    // B's view is untouched by A's stream
    assert_eq!(
        session.view().await,
        vec![Message::user("b question"), Message::assistant("b answer")]
    );

    // A's reply was still persisted into A's thread
    let threads = session.threads().await;
    let thread = threads.iter().find(|t| t.id == thread_a).unwrap();
    assert_eq!(
        thread.messages,
        vec![Message::user("a question"), Message::assistant("A REPLY")]
    );
}

#[tokio::test]
async fn test_send_after_abort_drops_stale_placeholder() {
    let backend = MockBackend::new(vec!["llama3"])
        .script(ScriptedReply::Fail)
        .script(ScriptedReply::Snapshots(vec!["second reply"]));
    let (session, _, _) = session_with(MockChatStore::new(), backend);
    session.refresh_models().await;
    session.create_thread().await.unwrap();

    session.send_message("one").await.unwrap();
    // The aborted send leaves its empty placeholder in the view
    assert_eq!(session.view().await.len(), 2);

    session.send_message("two").await.unwrap();

    // The stale placeholder is gone; view indices match thread indices
    assert_eq!(
        session.view().await,
        vec![
            Message::user("one"),
            Message::user("two"),
            Message::assistant("second reply"),
        ]
    );
}

#[tokio::test]
async fn test_edit_after_abort_targets_displayed_index() {
    let backend = MockBackend::new(vec!["llama3"])
        .script(ScriptedReply::Fail)
        .script(ScriptedReply::Snapshots(vec!["replayed"]));
    let (session, _, backend) = session_with(MockChatStore::new(), backend);
    session.refresh_models().await;
    session.create_thread().await.unwrap();

    session.send_message("one").await.unwrap();
    // Displayed: [0] user "one", [1] empty placeholder

    // The placeholder is not editable
    let outcome = session.edit_message(1, "tampered").await.unwrap();
    assert_eq!(outcome, SendOutcome::Ignored);

    // Editing the displayed index of the user message replays it
    let outcome = session.edit_message(0, "one, revised").await.unwrap();
    assert_eq!(outcome, SendOutcome::Completed);
    assert_eq!(
        session.view().await,
        vec![Message::user("one, revised"), Message::assistant("replayed")]
    );
    let requests = backend.requests();
    assert_eq!(requests[1].history, vec![Message::user("one, revised")]);
}

#[tokio::test]
async fn test_edit_truncates_and_replays_once() {
    let backend = MockBackend::new(vec!["llama3"])
        .script(ScriptedReply::Snapshots(vec!["first reply"]))
        .script(ScriptedReply::Snapshots(vec!["second reply"]))
        .script(ScriptedReply::Snapshots(vec!["replayed"]));
    let (session, store, backend) = session_with(MockChatStore::new(), backend);
    session.refresh_models().await;
    session.create_thread().await.unwrap();
    session.send_message("one").await.unwrap();
    session.send_message("two").await.unwrap();
    // Thread now holds [one, first reply, two, second reply]
    assert_eq!(session.view().await.len(), 4);

    let outcome = session.edit_message(0, "one, revised").await.unwrap();
    assert_eq!(outcome, SendOutcome::Completed);

    // Truncated to index + 1, text replaced, one new reply appended
    let persisted = store.last_saved().unwrap();
    let texts: Vec<&str> = persisted[0]
        .messages
        .iter()
        .map(|m| m.text.as_str())
        .collect();
    assert_eq!(texts, vec!["one, revised", "replayed"]);

    // Exactly one new send, against the truncated history
    let requests = backend.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[2].content, "one, revised");
    assert_eq!(requests[2].history, vec![Message::user("one, revised")]);
}

#[tokio::test]
async fn test_edit_assistant_message_is_ignored() {
    let backend =
        MockBackend::new(vec!["llama3"]).script(ScriptedReply::Snapshots(vec!["a reply"]));
    let (session, _, backend) = session_with(MockChatStore::new(), backend);
    session.refresh_models().await;
    session.create_thread().await.unwrap();
    session.send_message("hi").await.unwrap();

    // Index 1 is the assistant reply
    let outcome = session.edit_message(1, "tampered").await.unwrap();

    assert_eq!(outcome, SendOutcome::Ignored);
    assert_eq!(session.view().await.len(), 2);
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test]
async fn test_edit_out_of_bounds_is_ignored() {
    let (session, _, _) = session_with(MockChatStore::new(), MockBackend::new(vec!["llama3"]));
    session.refresh_models().await;
    session.create_thread().await.unwrap();

    let outcome = session.edit_message(5, "nothing there").await.unwrap();

    assert_eq!(outcome, SendOutcome::Ignored);
}

#[tokio::test]
async fn test_model_list_defaults_to_first() {
    let (session, _, _) = session_with(MockChatStore::new(), MockBackend::new(vec!["a", "b"]));

    let models = session.refresh_models().await;

    assert_eq!(models, vec!["a", "b"]);
    assert_eq!(session.selected_model().await.as_deref(), Some("a"));
}

#[tokio::test]
async fn test_model_fetch_failure_degrades_to_empty() {
    let (session, _, _) = session_with(MockChatStore::new(), MockBackend::failing_models());

    let models = session.refresh_models().await;

    assert!(models.is_empty());
    assert_eq!(session.selected_model().await, None);
}

#[tokio::test]
async fn test_select_model() {
    let (session, _, _) = session_with(MockChatStore::new(), MockBackend::new(vec!["a", "b"]));
    session.refresh_models().await;

    assert!(session.select_model("b").await);
    assert_eq!(session.selected_model().await.as_deref(), Some("b"));

    // Unknown names are ignored
    assert!(!session.select_model("zzz").await);
    assert_eq!(session.selected_model().await.as_deref(), Some("b"));
}

#[tokio::test]
async fn test_load_restores_persisted_threads() {
    let mut thread = ChatThread::new(7, "Restored");
    thread.messages.push(Message::user("hello"));
    let (session, _, _) = session_with(
        MockChatStore::with_threads(vec![thread]),
        MockBackend::new(vec!["a"]),
    );

    session.load().await.unwrap();

    let threads = session.threads().await;
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].name, "Restored");
    // Nothing is selected until the user picks a thread
    assert_eq!(session.selected_thread_id().await, None);
    assert!(session.view().await.is_empty());
}
