//! Local fallback facts.
//!
//! Substituted whole whenever a remote batch cannot be completed, so the
//! narrative keeps a consistent tone and length.

use async_trait::async_trait;

use super::{FactBatch, FactSource};

/// Built-in fallback pool.
pub const FALLBACK_FACTS: [&str; 5] = [
    "The first computer programmer was Ada Lovelace, who wrote algorithms for Charles Babbage's Analytical Engine in 1843.",
    "The first 1GB hard drive, announced in 1980, weighed about 550 pounds and cost $40,000.",
    "The QWERTY keyboard layout was designed to slow typists down and prevent jamming on mechanical typewriters.",
    "Over 6,000 new computer viruses are created and released every month.",
    "The first website ever created is still online at info.cern.ch.",
];

/// A fact source that never touches the network.
///
/// Used by `stagehand play --offline` and by tests that need a
/// deterministic batch.
#[derive(Debug, Clone)]
pub struct OfflineFacts {
    pool: Vec<String>,
}

impl OfflineFacts {
    /// Creates an offline source over the given pool.
    #[must_use]
    pub const fn new(pool: Vec<String>) -> Self {
        Self { pool }
    }
}

impl Default for OfflineFacts {
    fn default() -> Self {
        Self::new(FALLBACK_FACTS.iter().map(ToString::to_string).collect())
    }
}

#[async_trait]
impl FactSource for OfflineFacts {
    async fn fetch_facts(&self, count: usize) -> FactBatch {
        FactBatch::fallback(&self.pool, count)
    }
}
