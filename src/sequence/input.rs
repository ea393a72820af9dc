//! Input gate
//!
//! The single free-text field an input-gather step waits on. The gate
//! mirrors the visitor's draft into the published view and forwards a
//! submission to the waiting driver. Whitespace-only values are never
//! forwarded; the continue action simply stays disabled.

use std::sync::{Arc, Weak};

use super::engine::Shared;

/// Returns `true` if `text` may be submitted.
#[must_use]
pub fn can_submit(text: &str) -> bool {
    !text.trim().is_empty()
}

/// Cloneable handle to an engine's input surface.
#[derive(Clone)]
pub struct InputGate {
    shared: Weak<Shared>,
}

impl InputGate {
    pub(crate) fn new(shared: &Arc<Shared>) -> Self {
        Self {
            shared: Arc::downgrade(shared),
        }
    }

    /// Returns `true` while an input step is waiting for a value.
    #[must_use]
    pub fn is_awaiting(&self) -> bool {
        self.shared.upgrade().is_some_and(|shared| {
            shared.has_pending_input() && shared.snapshot().is_awaiting_input()
        })
    }

    /// Reports the current draft. Updates `draft` and `submit_enabled` on
    /// the input view; ignored when no input step is showing.
    pub fn set_draft(&self, draft: &str) {
        if let Some(shared) = self.shared.upgrade() {
            shared.set_draft(draft, can_submit(draft));
        }
    }

    /// Submits `value`. Returns `true` if it was accepted.
    ///
    /// The value is trimmed. Blank values, submissions while no input step
    /// is waiting, and submissions after a skip are ignored.
    pub fn submit(&self, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return false;
        }
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        shared
            .take_pending_input()
            .is_some_and(|tx| tx.send(value.to_string()).is_ok())
    }
}

impl std::fmt::Debug for InputGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputGate")
            .field("awaiting", &self.is_awaiting())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::config::schema::{Phase, SequenceConfig, Step, StepKind};
    use crate::facts::OfflineFacts;
    use crate::sequence::{SequenceEngine, StepView};

    use super::*;

    fn name_then_greeting() -> SequenceEngine {
        let config = SequenceConfig {
            name: "input-test".to_string(),
            skip_exit_ms: 50,
            phases: vec![Phase {
                id: "hello".to_string(),
                steps: vec![
                    Step {
                        id: "ask".to_string(),
                        kind: StepKind::InputGather {
                            prompt: "What's your name?".to_string(),
                            field: "name".to_string(),
                            placeholder: Some("Enter your name".to_string()),
                        },
                        duration_ms: 0,
                        transition_ms: 100,
                        fade_in_ms: 0,
                    },
                    Step {
                        id: "greet".to_string(),
                        kind: StepKind::StaticText {
                            text: "Hi ${name}".to_string(),
                        },
                        duration_ms: 1000,
                        transition_ms: 0,
                        fade_in_ms: 0,
                    },
                    Step {
                        id: "end".to_string(),
                        kind: StepKind::Terminal {
                            text: "bye".to_string(),
                            subtitle: None,
                        },
                        duration_ms: 100,
                        transition_ms: 100,
                        fade_in_ms: 0,
                    },
                ],
            }],
        };
        SequenceEngine::new(Arc::new(config), Arc::new(OfflineFacts::default()), || {})
    }

    #[test]
    fn test_can_submit() {
        assert!(!can_submit(""));
        assert!(!can_submit("   \t\n"));
        assert!(can_submit(" Ava "));
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_blocks_until_submitted() {
        let engine = name_then_greeting();
        let gate = engine.input();
        engine.start();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(gate.is_awaiting());
        assert_eq!(engine.snapshot().step_id, "ask");
        assert_eq!(engine.snapshot().progress.completed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_draft_controls_submit_flag() {
        let engine = name_then_greeting();
        let gate = engine.input();
        engine.start();
        tokio::time::sleep(Duration::from_millis(1)).await;

        gate.set_draft("   ");
        assert!(matches!(
            engine.snapshot().view,
            StepView::Input { submit_enabled: false, .. }
        ));
        gate.set_draft("Ava");
        assert!(matches!(
            engine.snapshot().view,
            StepView::Input { submit_enabled: true, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_submission_is_ignored() {
        let engine = name_then_greeting();
        let gate = engine.input();
        engine.start();
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(!gate.submit("  "));
        assert!(gate.is_awaiting());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(engine.snapshot().step_id, "ask");
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_feeds_template() {
        let engine = name_then_greeting();
        let gate = engine.input();
        engine.start();
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(gate.submit("  Ava "));
        assert!(!gate.submit("Bob"));
        tokio::time::sleep(Duration::from_millis(150)).await;

        let state = engine.snapshot();
        assert_eq!(state.step_id, "greet");
        assert_eq!(
            state.view,
            StepView::Text {
                text: "Hi Ava".to_string(),
                item: 0,
                of: 1
            }
        );
        assert_eq!(engine.variables().get("name").map(String::as_str), Some("Ava"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_after_skip_is_rejected() {
        let engine = name_then_greeting();
        let gate = engine.input();
        engine.start();
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(engine.skip());
        assert!(!gate.is_awaiting());
        assert!(!gate.submit("Ava"));
    }
}
