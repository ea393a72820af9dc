//! Visit ledger
//!
//! Remembers whether the narrative has already been shown. The ledger
//! sits on an injected [`StateStore`] so tests can fake persistence and
//! the command-line player can choose between a file and memory.

pub mod store;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::schema::DEFAULT_VISIT_KEY;
use crate::error::StoreError;

pub use store::{FileStore, MemoryStore};

/// Value written once the narrative has been shown.
pub const VISITED_VALUE: &str = "true";

/// Durable key-value storage.
pub trait StateStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Reads and writes the persisted "has visited" flag.
///
/// Storage failures never propagate: an unreadable store reads as a first
/// visit, and a failed write is logged and dropped.
#[derive(Clone)]
pub struct VisitLedger {
    store: Arc<dyn StateStore>,
    key: String,
}

impl VisitLedger {
    /// Creates a ledger over `store` using the default key.
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self::with_key(store, DEFAULT_VISIT_KEY)
    }

    /// Creates a ledger over `store` using a custom key.
    #[must_use]
    pub fn with_key(store: Arc<dyn StateStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Returns the storage key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns `true` if the narrative has been shown before.
    #[must_use]
    pub fn has_visited(&self) -> bool {
        match self.store.get(&self.key) {
            Ok(value) => value.as_deref() == Some(VISITED_VALUE),
            Err(error) => {
                warn!(%error, key = %self.key, "visit ledger unreadable; treating as first visit");
                false
            }
        }
    }

    /// Records that the narrative has been shown. Idempotent.
    ///
    /// Returns `false` if the store rejected the write.
    #[must_use]
    pub fn mark_visited(&self) -> bool {
        match self.store.set(&self.key, VISITED_VALUE) {
            Ok(()) => {
                debug!(key = %self.key, "visit recorded");
                true
            }
            Err(error) => {
                warn!(%error, key = %self.key, "failed to record visit");
                false
            }
        }
    }
}

impl std::fmt::Debug for VisitLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisitLedger")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
