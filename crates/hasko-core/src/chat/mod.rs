//! Chat domain: threads, messages, the session manager and its seams.

pub mod backend;
pub mod message;
pub mod model;
pub mod session;
pub mod store;

pub use backend::{ChatBackend, ReplyStream, SendMessageRequest};
pub use message::Message;
pub use model::{timestamp_thread_id, ChatThread};
pub use session::{ChatSession, SendOutcome, SessionEvent};
pub use store::ChatStore;

#[cfg(test)]
mod session_test;
