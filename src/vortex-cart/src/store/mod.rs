//! Expiring token → snapshot storage.
//!
//! Stores are injected wherever they are needed; there is no process-wide
//! instance. Lookups never consume an entry: a link stays usable until its
//! TTL runs out.

mod file;
mod memory;

pub use file::FileSnapshotStore;
pub use memory::MemorySnapshotStore;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::snapshot::CartSnapshot;
use crate::token::Token;

/// How long a cart link stays resolvable.
pub const DEFAULT_LINK_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Snapshot store failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Background task failed: {0}")]
    Task(String),
}

/// Key/value store for cart snapshots with TTL-based expiry.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Store `snapshot` under `token`, silently replacing any previous entry.
    async fn put(
        &self,
        token: &Token,
        snapshot: &CartSnapshot,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Fetch a live snapshot.
    ///
    /// Expired, never-issued and purged tokens all come back as `Ok(None)`.
    async fn get(&self, token: &Token) -> Result<Option<CartSnapshot>, StoreError>;

    /// Drop every expired entry, returning how many were removed.
    async fn purge_expired(&self) -> Result<usize, StoreError>;

    /// Number of entries currently held, live or not yet purged.
    async fn count(&self) -> Result<usize, StoreError>;
}
