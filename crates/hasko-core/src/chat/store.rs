//! Chat store trait.
//!
//! Defines the interface for persisting the chat thread collection.

use super::model::ChatThread;
use crate::error::Result;
use async_trait::async_trait;

/// An abstract store for the ordered chat thread collection.
///
/// The store is deliberately coarse-grained: the whole collection is
/// overwritten after every mutating session operation ("last write wins").
/// There are no partial or incremental writes and no versioning of the
/// persisted shape.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Loads the full thread collection.
    ///
    /// Implementations must treat missing or malformed persisted data as an
    /// empty collection rather than an error; only genuine I/O failures
    /// should surface as `Err`.
    async fn load_all(&self) -> Result<Vec<ChatThread>>;

    /// Overwrites the persisted collection with the given snapshot.
    async fn save_all(&self, threads: &[ChatThread]) -> Result<()>;
}
