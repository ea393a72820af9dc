//! Sequence engine
//!
//! One configuration-driven engine runs every narrative and boot sequence.
//!
//! - [`SequenceEngine`] — drives the steps of a [`SequenceConfig`] on timers
//! - [`SkipChannel`] — visitor-raised early exit
//! - [`InputGate`] — the free-text field input steps wait on
//! - [`RunState`] — snapshot published on every change
//!
//! [`SequenceConfig`]: crate::config::schema::SequenceConfig

pub mod engine;
pub mod input;
pub mod skip;
pub mod state;
pub mod template;
pub mod timer;

pub use engine::{CompletionCallback, SequenceEngine};
pub use input::{InputGate, can_submit};
pub use skip::SkipChannel;
pub use state::{CompletionCause, Progress, RunState, RunStatus, StepView};
pub use timer::TimerSet;
