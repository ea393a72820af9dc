//! Configuration schema types
//!
//! Typed structures for sequence and site configuration. Sequences are a
//! forward-only list of phases, each holding an ordered list of steps;
//! the step kind decides how the engine drives it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::facts::fallback::FALLBACK_FACTS;

// ============================================================================
// Defaults
// ============================================================================

/// Storage key under which the visit flag is persisted.
pub const DEFAULT_VISIT_KEY: &str = "stagehand.intro_seen";

/// Default remote fact endpoint.
pub const DEFAULT_FACT_ENDPOINT: &str = "https://uselessfacts.jsph.pl/api/v2/facts/random?language=en";

/// Default per-call timeout for remote fact requests.
pub const DEFAULT_FACT_TIMEOUT_MS: u64 = 5_000;

/// Default sanity limit for a single fact, in characters.
pub const DEFAULT_FACT_MAX_CHARS: usize = 400;

/// Default delay between a skip and the completion callback.
pub const DEFAULT_SKIP_EXIT_MS: u64 = 800;

/// Default template variable written by an input step.
pub const DEFAULT_INPUT_FIELD: &str = "name";

const fn default_skip_exit_ms() -> u64 {
    DEFAULT_SKIP_EXIT_MS
}

fn default_input_field() -> String {
    DEFAULT_INPUT_FIELD.to_string()
}

// ============================================================================
// Sequence
// ============================================================================

/// A complete sequence: ordered phases run by one engine instance.
///
/// Immutable once an engine is built from it; the engine holds it behind
/// an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SequenceConfig {
    /// Human-readable sequence name (used in logs and events).
    pub name: String,

    /// Delay between a skip request and the completion callback.
    #[serde(default = "default_skip_exit_ms")]
    pub skip_exit_ms: u64,

    /// Ordered phases; visited forward-only.
    pub phases: Vec<Phase>,
}

impl SequenceConfig {
    /// Total progress units: every item of every non-terminal step plus
    /// one for the terminal step.
    #[must_use]
    pub fn total_units(&self) -> usize {
        self.steps().map(|(_, _, step)| step.units()).sum::<usize>() + 1
    }

    /// Iterates `(phase_index, step_index, step)` in run order.
    pub fn steps(&self) -> impl Iterator<Item = (usize, usize, &Step)> {
        self.phases.iter().enumerate().flat_map(|(pi, phase)| {
            phase
                .steps
                .iter()
                .enumerate()
                .map(move |(si, step)| (pi, si, step))
        })
    }

    /// Returns the terminal step with its location, if one exists.
    #[must_use]
    pub fn terminal(&self) -> Option<(usize, usize, &Step)> {
        self.steps().find(|(_, _, step)| step.kind.is_terminal())
    }

    /// Sum of every natural timer in the sequence, excluding fetch latency
    /// and time spent waiting for input.
    #[must_use]
    pub fn natural_budget_ms(&self) -> u64 {
        self.steps()
            .map(|(_, _, step)| {
                let per_item = step.duration_ms + step.transition_ms;
                match &step.kind {
                    StepKind::FetchedText { count, settle_ms } => {
                        settle_ms + per_item * *count as u64
                    }
                    StepKind::QuoteRotation { quotes, .. } => per_item * quotes.len() as u64,
                    _ => per_item,
                }
            })
            .sum()
    }
}

/// A named group of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Phase {
    /// Phase identifier, unique within the sequence.
    pub id: String,

    /// Ordered steps.
    pub steps: Vec<Step>,
}

/// A single timed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Step identifier, unique within its phase.
    pub id: String,

    /// What the step shows and how it advances.
    #[serde(flatten)]
    pub kind: StepKind,

    /// Time an item stays mounted before its fade-out starts.
    #[serde(default)]
    pub duration_ms: u64,

    /// Fade-out time before the next item mounts.
    #[serde(default)]
    pub transition_ms: u64,

    /// Delay between mounting an item and making it visible.
    /// Clamped to `duration_ms`.
    #[serde(default)]
    pub fade_in_ms: u64,
}

impl Step {
    /// Number of progress units this step contributes.
    #[must_use]
    pub fn units(&self) -> usize {
        match &self.kind {
            StepKind::StaticText { .. } | StepKind::InputGather { .. } => 1,
            StepKind::FetchedText { count, .. } => *count,
            StepKind::QuoteRotation { quotes, .. } => quotes.len(),
            StepKind::Terminal { .. } => 0,
        }
    }
}

/// Tagged step variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepKind {
    /// Fixed text shown for one hold.
    StaticText {
        /// Text, template-expanded at mount time.
        text: String,
    },

    /// Remote facts fetched at mount time and rotated like quotes.
    FetchedText {
        /// Number of facts to request.
        count: usize,
        /// Pause after the batch resolves, before the first fact mounts.
        #[serde(default)]
        settle_ms: u64,
    },

    /// Free-text prompt; the timer chain waits for a non-empty submission.
    InputGather {
        /// Prompt shown above the field.
        prompt: String,
        /// Template variable that receives the submitted value.
        #[serde(default = "default_input_field")]
        field: String,
        /// Placeholder text for the empty field.
        #[serde(default)]
        placeholder: Option<String>,
    },

    /// In-memory list shown one item per hold; exhausting it advances.
    QuoteRotation {
        /// Items, template-expanded at mount time.
        quotes: Vec<String>,
        /// Shuffle the list once when the step mounts.
        #[serde(default)]
        shuffle: bool,
    },

    /// Final step; holds, fades, then completes the sequence.
    Terminal {
        /// Headline text.
        text: String,
        /// Optional secondary line.
        #[serde(default)]
        subtitle: Option<String>,
    },
}

impl StepKind {
    /// Returns the configuration tag for this kind.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StaticText { .. } => "static_text",
            Self::FetchedText { .. } => "fetched_text",
            Self::InputGather { .. } => "input_gather",
            Self::QuoteRotation { .. } => "quote_rotation",
            Self::Terminal { .. } => "terminal",
        }
    }

    /// Returns `true` for the terminal variant.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal { .. })
    }
}

// ============================================================================
// Site configuration
// ============================================================================

/// Where a sequence comes from: a built-in theme or an inline definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SequenceSource {
    /// Reference to a built-in theme by name.
    Theme {
        /// Theme name (e.g., `cinematic`).
        theme: String,
    },
    /// Inline sequence definition.
    Inline(SequenceConfig),
}

impl SequenceSource {
    /// Shorthand for a theme reference.
    #[must_use]
    pub fn theme(name: impl Into<String>) -> Self {
        Self::Theme { theme: name.into() }
    }
}

/// Remote fact provider settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FactSourceConfig {
    /// Endpoint returning `{"text": "..."}`.
    pub endpoint: String,

    /// Per-call timeout.
    pub timeout_ms: u64,

    /// Facts longer than this many characters count as failures.
    pub max_chars: usize,

    /// Local list substituted whenever any remote attempt fails.
    pub fallback: Vec<String>,
}

impl Default for FactSourceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_FACT_ENDPOINT.to_string(),
            timeout_ms: DEFAULT_FACT_TIMEOUT_MS,
            max_chars: DEFAULT_FACT_MAX_CHARS,
            fallback: FALLBACK_FACTS.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Visit ledger settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    /// JSON file holding persisted state. `None` selects the platform
    /// default chosen by the CLI.
    pub path: Option<PathBuf>,

    /// Storage key for the visit flag.
    pub key: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: None,
            key: DEFAULT_VISIT_KEY.to_string(),
        }
    }
}

/// Main-content hand-off settings for the command-line player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MainConfig {
    /// Banner printed when main content mounts.
    pub banner: String,
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            banner: "main content mounted".to_string(),
        }
    }
}

/// Site configuration as written in YAML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// First-visit narrative sequence.
    pub narrative: SequenceSource,

    /// Boot animation sequence.
    pub boot: SequenceSource,

    /// Fact provider settings.
    pub facts: FactSourceConfig,

    /// Visit ledger settings.
    pub ledger: LedgerConfig,

    /// Main-content settings.
    pub main: MainConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            narrative: SequenceSource::theme("cinematic"),
            boot: SequenceSource::theme("console"),
            facts: FactSourceConfig::default(),
            ledger: LedgerConfig::default(),
            main: MainConfig::default(),
        }
    }
}
