//! Chat backend trait.
//!
//! The seam between the session manager and the relay service. The concrete
//! HTTP implementation lives in `hasko-interaction`; tests substitute a
//! scripted mock.

use super::message::Message;
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

/// Request body for the relay's `POST /send-message` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    /// The user's message content.
    pub content: String,
    /// Model identifier to run the request against.
    pub model: String,
    /// Full message history of the thread, in conversation order.
    pub history: Vec<Message>,
    /// Identifier of the thread this message belongs to.
    pub chat_id: i64,
}

/// A lazy sequence of cumulative partial assistant text.
///
/// Each received item is the *entire* accumulated reply so far, not a delta.
/// The sequence ends when the underlying response stream signals end-of-data
/// or fails mid-flight (logged by the producer, not surfaced).
pub type ReplyStream = mpsc::Receiver<String>;

/// Backend operations the session manager drives.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Fetches the list of available model identifiers.
    ///
    /// The response order is significant: the first entry becomes the
    /// default selection.
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Issues a send-message request and returns the reply stream.
    ///
    /// A non-success status or missing response body is an `Err` before any
    /// snapshot is produced.
    async fn send_message(&self, request: SendMessageRequest) -> Result<ReplyStream>;
}
