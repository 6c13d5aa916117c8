pub mod chat;
pub mod error;

// Re-export common error type
pub use error::{HaskoError, Result};
