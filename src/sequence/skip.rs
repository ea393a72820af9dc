//! Skip channel
//!
//! A cloneable handle that lets the visitor end the active sequence early.
//! The handle holds a weak reference: once the engine is dropped every
//! skip is a no-op.

use std::sync::{Arc, Weak};

use super::engine::Shared;

/// User-raised cancellation for one engine instance.
#[derive(Clone)]
pub struct SkipChannel {
    shared: Weak<Shared>,
}

impl SkipChannel {
    pub(crate) fn new(shared: &Arc<Shared>) -> Self {
        Self {
            shared: Arc::downgrade(shared),
        }
    }

    /// Requests an early exit.
    ///
    /// The first effective call cancels the driver and every pending timer,
    /// shows the terminal step, and schedules the completion callback after
    /// the sequence's `skip_exit_ms`. It returns `true`. Later calls, calls
    /// during the natural exit transition, and calls after completion or
    /// unmount return `false` and change nothing.
    ///
    /// # Panics
    ///
    /// Panics if an effective skip is requested outside a Tokio runtime.
    pub fn skip(&self) -> bool {
        self.shared.upgrade().is_some_and(|shared| shared.skip())
    }

    /// Returns `true` once a skip has taken effect.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| shared.snapshot().cancelled)
    }
}

impl std::fmt::Debug for SkipChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkipChannel")
            .field("attached", &(self.shared.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::config::schema::{Phase, SequenceConfig, Step, StepKind};
    use crate::facts::OfflineFacts;
    use crate::sequence::{RunStatus, SequenceEngine};

    use super::*;

    fn engine(calls: &Arc<AtomicUsize>) -> SequenceEngine {
        let config = SequenceConfig {
            name: "skip-test".to_string(),
            skip_exit_ms: 100,
            phases: vec![Phase {
                id: "only".to_string(),
                steps: vec![
                    Step {
                        id: "quotes".to_string(),
                        kind: StepKind::QuoteRotation {
                            quotes: vec!["a".to_string(), "b".to_string()],
                            shuffle: false,
                        },
                        duration_ms: 1000,
                        transition_ms: 200,
                        fade_in_ms: 0,
                    },
                    Step {
                        id: "end".to_string(),
                        kind: StepKind::Terminal {
                            text: "bye".to_string(),
                            subtitle: None,
                        },
                        duration_ms: 500,
                        transition_ms: 400,
                        fade_in_ms: 0,
                    },
                ],
            }],
        };
        let counter = Arc::clone(calls);
        SequenceEngine::new(
            Arc::new(config),
            Arc::new(OfflineFacts::default()),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_one_cancellation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine(&calls);
        engine.start();
        let first = engine.skip_channel();
        let second = first.clone();

        assert!(!first.is_cancelled());
        assert!(second.skip());
        assert!(first.is_cancelled());
        assert!(!first.skip());

        assert_eq!(engine.finished().await, RunStatus::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_before_start_still_completes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine(&calls);
        assert!(engine.skip_channel().skip());
        assert!(!engine.start());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_channel_is_noop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine(&calls);
        let channel = engine.skip_channel();
        drop(engine);

        assert!(!channel.skip());
        assert!(!channel.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
