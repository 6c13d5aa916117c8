//! Chat thread domain model.
//!
//! A thread is a persisted, named conversation consisting of an ordered
//! message sequence. Threads are owned by the session manager and persisted
//! as a whole collection on every mutation.

use super::message::Message;
use serde::{Deserialize, Serialize};

/// A persisted conversation thread.
///
/// The serialized shape (`id`/`name`/`createdDate`/`messages`) is the storage
/// format of the chat collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatThread {
    /// Unique thread identifier, derived from the creation timestamp in
    /// milliseconds. Doubles as the wire `chat_id`.
    pub id: i64,
    /// Human-readable thread name, user-editable. Defaults to "Chat N".
    pub name: String,
    /// Display string for the creation date.
    pub created_date: String,
    /// Ordered conversation history.
    pub messages: Vec<Message>,
}

impl ChatThread {
    /// Creates an empty thread with the given id and name, dated now.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            created_date: chrono::Local::now().format("%Y-%m-%d").to_string(),
            messages: Vec::new(),
        }
    }
}

/// Generates a thread id from the current time in milliseconds.
///
/// Collisions are only possible when two threads are created within the same
/// millisecond, so callers bump the candidate until it is unused.
pub fn timestamp_thread_id() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
