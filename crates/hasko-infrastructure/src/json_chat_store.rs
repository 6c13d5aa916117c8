//! JSON-file backed ChatStore implementation.
//!
//! The whole thread collection lives in a single `chats.json` document.
//! Every save overwrites the document atomically; a malformed or missing
//! document loads as an empty collection.

use crate::paths::HaskoPaths;
use crate::storage::atomic_json::AtomicJsonFile;
use async_trait::async_trait;
use hasko_core::chat::{ChatStore, ChatThread};
use hasko_core::error::{HaskoError, Result};
use std::path::PathBuf;

/// `ChatStore` over a single JSON document on disk.
pub struct JsonChatStore {
    path: PathBuf,
}

impl JsonChatStore {
    /// Creates a store at the given file path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Creates a store at the default location (`~/.config/hasko/chats.json`).
    pub fn default_location() -> Result<Self> {
        let path = HaskoPaths::chats_file()
            .map_err(|e| HaskoError::config(format!("Failed to resolve chats path: {}", e)))?;
        Ok(Self::new(path))
    }

    fn file(&self) -> AtomicJsonFile<Vec<ChatThread>> {
        AtomicJsonFile::new(self.path.clone())
    }
}

#[async_trait]
impl ChatStore for JsonChatStore {
    async fn load_all(&self) -> Result<Vec<ChatThread>> {
        let file = self.file();
        let loaded = tokio::task::spawn_blocking(move || file.load())
            .await
            .map_err(|e| HaskoError::internal(format!("Store task panicked: {}", e)))?;

        match loaded {
            Ok(Some(threads)) => Ok(threads),
            Ok(None) => Ok(Vec::new()),
            Err(e) => {
                // Malformed persisted data must not crash the load; it is
                // treated as empty history.
                tracing::warn!("Discarding unreadable chat collection: {}", e);
                Ok(Vec::new())
            }
        }
    }

    async fn save_all(&self, threads: &[ChatThread]) -> Result<()> {
        let file = self.file();
        let snapshot = threads.to_vec();
        tokio::task::spawn_blocking(move || file.save(&snapshot))
            .await
            .map_err(|e| HaskoError::internal(format!("Store task panicked: {}", e)))?
            .map_err(|e| HaskoError::data_access(format!("Failed to save chats: {}", e)))
    }
}
