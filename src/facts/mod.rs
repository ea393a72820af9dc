//! Fact provider
//!
//! Supplies short pieces of text for fetched-text steps. A batch is either
//! entirely remote or entirely fallback; callers never see an error.
//!
//! - [`FactSource`] — the seam the engine depends on
//! - [`HttpFactProvider`] — remote endpoint with per-call timeout
//! - [`OfflineFacts`] — fallback pool only

pub mod fallback;
pub mod http;

use async_trait::async_trait;
use serde::Serialize;

pub use fallback::{FALLBACK_FACTS, OfflineFacts};
pub use http::HttpFactProvider;

/// Where a batch came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FactOrigin {
    /// Every entry came from the remote endpoint.
    Remote,
    /// Every entry came from the local fallback pool.
    Fallback,
}

impl FactOrigin {
    /// Returns the metrics/event label for this origin.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for FactOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// An ordered list of facts with a single origin.
///
/// Constructed only through [`FactBatch::remote`] and
/// [`FactBatch::fallback`], so a batch cannot mix sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactBatch {
    facts: Vec<String>,
    origin: FactOrigin,
}

impl FactBatch {
    /// Wraps a fully successful remote batch.
    #[must_use]
    pub const fn remote(facts: Vec<String>) -> Self {
        Self {
            facts,
            origin: FactOrigin::Remote,
        }
    }

    /// Takes the first `count` entries of `pool`.
    #[must_use]
    pub fn fallback(pool: &[String], count: usize) -> Self {
        Self {
            facts: pool.iter().take(count).cloned().collect(),
            origin: FactOrigin::Fallback,
        }
    }

    /// The facts, in display order.
    #[must_use]
    pub fn facts(&self) -> &[String] {
        &self.facts
    }

    /// Consumes the batch and returns the facts.
    #[must_use]
    pub fn into_facts(self) -> Vec<String> {
        self.facts
    }

    /// Where the batch came from.
    #[must_use]
    pub const fn origin(&self) -> FactOrigin {
        self.origin
    }

    /// Number of facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Returns `true` when the batch holds no facts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

/// Source of facts for fetched-text steps.
///
/// Implementations must absorb every failure and return a batch; the
/// engine relies on this to keep the timer chain moving.
#[async_trait]
pub trait FactSource: Send + Sync {
    /// Returns up to `count` facts. Never fails.
    async fn fetch_facts(&self, count: usize) -> FactBatch;
}
