//! Run state published by a sequence engine.
//!
//! A [`RunState`] snapshot is what a renderer draws: the current phase and
//! step, the view for that step, the fade flag and the progress bar. The
//! engine mutates it only under its generation check.

use serde::Serialize;

/// Lifecycle of one engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Constructed, not started.
    Pending,
    /// Timer chain running (or waiting for input).
    Running,
    /// Terminal view shown and fading out; completion is scheduled.
    Exiting,
    /// `on_complete` has run.
    Completed,
    /// Torn down before or after completion; nothing further happens.
    Unmounted,
}

impl RunStatus {
    /// Returns `true` once no further transitions can occur.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Unmounted)
    }
}

/// How a sequence reached completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionCause {
    /// The terminal step ran its full hold and exit transition.
    Natural,
    /// The visitor skipped.
    Skipped,
}

impl std::fmt::Display for CompletionCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Natural => f.write_str("natural"),
            Self::Skipped => f.write_str("skipped"),
        }
    }
}

/// Completed and total progress units.
///
/// `total` counts every item of every non-terminal step plus one for the
/// terminal step. Non-terminal advances saturate one short of `total`, so
/// 100% is reachable only through [`Progress::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Units completed so far.
    pub completed: usize,
    /// Units in the whole sequence.
    pub total: usize,
}

impl Progress {
    /// Creates progress at zero of `total` (at least one).
    #[must_use]
    pub const fn new(total: usize) -> Self {
        Self {
            completed: 0,
            total: if total == 0 { 1 } else { total },
        }
    }

    /// Returns progress as a percentage in `0.0..=100.0`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(self) -> f64 {
        if self.completed >= self.total {
            100.0
        } else {
            self.completed as f64 * 100.0 / self.total as f64
        }
    }

    /// Returns `true` once the terminal step has been reached.
    #[must_use]
    pub const fn is_complete(self) -> bool {
        self.completed >= self.total
    }

    /// Advances by `units` non-terminal units.
    pub fn advance(&mut self, units: usize) {
        self.completed = self
            .completed
            .saturating_add(units)
            .min(self.total.saturating_sub(1))
            .max(self.completed);
    }

    /// Marks the terminal unit reached.
    pub const fn finish(&mut self) {
        self.completed = self.total;
    }
}

/// What the current step is showing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum StepView {
    /// Nothing mounted yet.
    Pending,
    /// A fetched-text step is waiting for its batch.
    Loading,
    /// One text item of a static, fetched or rotation step.
    Text {
        /// Rendered text.
        text: String,
        /// Zero-based item index within the step.
        item: usize,
        /// Number of items in the step.
        of: usize,
    },
    /// Waiting for the visitor to submit a value.
    Input {
        /// Prompt shown above the field.
        prompt: String,
        /// Placeholder for the empty field.
        placeholder: Option<String>,
        /// Current draft as last reported by the input surface.
        draft: String,
        /// Whether the continue action is enabled for `draft`.
        submit_enabled: bool,
    },
    /// The terminal step.
    Terminal {
        /// Rendered headline.
        text: String,
        /// Rendered secondary line.
        subtitle: Option<String>,
    },
}

/// Snapshot of one engine's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunState {
    /// Index of the current phase.
    pub phase_index: usize,
    /// Identifier of the current phase.
    pub phase_id: String,
    /// Index of the current step within its phase.
    pub step_index: usize,
    /// Identifier of the current step.
    pub step_id: String,
    /// Index of the current item within a rotating step.
    pub item_index: usize,
    /// What the step is showing.
    pub view: StepView,
    /// Fade flag: `false` while fading in or out.
    pub visible: bool,
    /// Set once a skip has taken effect.
    pub cancelled: bool,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Progress bar value.
    pub progress: Progress,
    #[serde(skip)]
    pub(crate) generation: u64,
}

impl RunState {
    /// Initial state for a sequence with `total_units` progress units.
    #[must_use]
    pub fn new(total_units: usize) -> Self {
        Self {
            phase_index: 0,
            phase_id: String::new(),
            step_index: 0,
            step_id: String::new(),
            item_index: 0,
            view: StepView::Pending,
            visible: false,
            cancelled: false,
            status: RunStatus::Pending,
            progress: Progress::new(total_units),
            generation: 0,
        }
    }

    /// Returns `true` while an input step is waiting for a value.
    #[must_use]
    pub const fn is_awaiting_input(&self) -> bool {
        matches!(self.view, StepView::Input { .. }) && matches!(self.status, RunStatus::Running)
    }
}
