//! Chat message types.
//!
//! A message is the smallest unit of a conversation: a piece of text plus a
//! flag telling whether the user or the assistant wrote it. The serialized
//! field names (`text`/`isUser`) are the wire and storage format shared with
//! the relay backend.

use serde::{Deserialize, Serialize};

/// A single message in a chat thread.
///
/// Ordering within a thread is significant (conversation order = vector
/// order). Consecutive same-role messages are legal; an in-progress
/// assistant placeholder is an empty assistant message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// The content of the message.
    pub text: String,
    /// `true` if the user wrote this message, `false` for the assistant.
    pub is_user: bool,
}

impl Message {
    /// Creates a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_user: true,
        }
    }

    /// Creates an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_user: false,
        }
    }
}
