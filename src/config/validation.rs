//! Configuration validation
//!
//! Semantic checks run on fully resolved sequences, after theme references
//! have been replaced by their definitions.
//!
//! Validation collects ALL errors (doesn't stop at first) to provide
//! comprehensive feedback to users.

use std::collections::HashSet;

use crate::config::loader::{ConfigLimits, LoadedSite};
use crate::config::schema::{FactSourceConfig, LedgerConfig, SequenceConfig, Step, StepKind};
use crate::error::{Severity, ValidationIssue};
use crate::sequence::template;

/// Durations above this are legal but almost certainly a typo.
const LONG_DURATION_MS: u64 = 60_000;

// ============================================================================
// Public API
// ============================================================================

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a resolved site and returns every issue found.
    pub fn validate(&mut self, site: &LoadedSite, limits: &ConfigLimits) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        let pool = site.facts.fallback.len();
        self.check_sequence(&site.narrative, "narrative", pool, limits);
        self.check_sequence(&site.boot, "boot", pool, limits);
        self.check_facts(&site.facts);
        self.check_ledger(&site.ledger);

        self.finish()
    }

    /// Validates a single sequence against a fallback pool of
    /// `fallback_pool` entries.
    pub fn validate_sequence(
        &mut self,
        config: &SequenceConfig,
        path: &str,
        fallback_pool: usize,
        limits: &ConfigLimits,
    ) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();
        self.check_sequence(config, path, fallback_pool, limits);
        self.finish()
    }

    fn finish(&mut self) -> ValidationResult {
        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Sequences
    // ========================================================================

    fn check_sequence(
        &mut self,
        config: &SequenceConfig,
        path: &str,
        fallback_pool: usize,
        limits: &ConfigLimits,
    ) {
        if config.name.trim().is_empty() {
            self.add_error(&format!("{path}.name"), "Sequence name cannot be empty");
        }

        if config.phases.is_empty() {
            self.add_error(
                &format!("{path}.phases"),
                "Sequence must have at least one phase",
            );
            return;
        }

        if config.phases.len() > limits.max_phases {
            self.add_error(
                &format!("{path}.phases"),
                &format!(
                    "Too many phases: {} (maximum: {}). \
                     Set STAGEHAND_MAX_PHASES to increase the limit.",
                    config.phases.len(),
                    limits.max_phases
                ),
            );
        }

        let mut phase_ids = HashSet::new();
        let mut gathered = HashSet::new();
        for (pi, phase) in config.phases.iter().enumerate() {
            let phase_path = format!("{path}.phases[{pi}]");
            if phase.id.trim().is_empty() {
                self.add_error(&format!("{phase_path}.id"), "Phase id cannot be empty");
            } else if !phase_ids.insert(phase.id.as_str()) {
                self.add_error(
                    &format!("{phase_path}.id"),
                    &format!("Duplicate phase id '{}'", phase.id),
                );
            }

            if phase.steps.is_empty() {
                self.add_error(
                    &format!("{phase_path}.steps"),
                    "Phase must have at least one step",
                );
            }

            let mut step_ids = HashSet::new();
            for (si, step) in phase.steps.iter().enumerate() {
                let step_path = format!("{phase_path}.steps[{si}]");
                if step.id.trim().is_empty() {
                    self.add_error(&format!("{step_path}.id"), "Step id cannot be empty");
                } else if !step_ids.insert(step.id.as_str()) {
                    self.add_error(
                        &format!("{step_path}.id"),
                        &format!("Duplicate step id '{}' in phase '{}'", step.id, phase.id),
                    );
                }
                self.check_step(step, &step_path, fallback_pool, &gathered);
                if let StepKind::InputGather { field, .. } = &step.kind {
                    gathered.insert(field.clone());
                }
            }
        }

        self.check_terminal(config, path);
    }

    fn check_step(
        &mut self,
        step: &Step,
        path: &str,
        fallback_pool: usize,
        gathered: &HashSet<String>,
    ) {
        match &step.kind {
            StepKind::StaticText { text } => {
                self.check_templates(text, &format!("{path}.text"), gathered);
            }
            StepKind::FetchedText { count, .. } => {
                if *count == 0 {
                    self.add_error(&format!("{path}.count"), "Fact count must be at least 1");
                } else if *count > fallback_pool {
                    self.add_error(
                        &format!("{path}.count"),
                        &format!(
                            "Fact count {count} exceeds the fallback pool ({fallback_pool} entries)"
                        ),
                    );
                }
            }
            StepKind::InputGather { prompt, field, .. } => {
                if field.trim().is_empty() {
                    self.add_error(&format!("{path}.field"), "Input field name cannot be empty");
                }
                if prompt.trim().is_empty() {
                    self.add_warning(&format!("{path}.prompt"), "Input prompt is empty");
                }
                self.check_templates(prompt, &format!("{path}.prompt"), gathered);
            }
            StepKind::QuoteRotation { quotes, .. } => {
                if quotes.is_empty() {
                    self.add_error(&format!("{path}.quotes"), "Quote list cannot be empty");
                }
                for (qi, quote) in quotes.iter().enumerate() {
                    self.check_templates(quote, &format!("{path}.quotes[{qi}]"), gathered);
                }
            }
            StepKind::Terminal { text, subtitle } => {
                self.check_templates(text, &format!("{path}.text"), gathered);
                if let Some(subtitle) = subtitle {
                    self.check_templates(subtitle, &format!("{path}.subtitle"), gathered);
                }
            }
        }

        let shows_text = matches!(
            step.kind,
            StepKind::StaticText { .. }
                | StepKind::FetchedText { .. }
                | StepKind::QuoteRotation { .. }
        );
        if shows_text && step.duration_ms == 0 {
            self.add_warning(
                &format!("{path}.duration_ms"),
                "Text step has zero duration and will never be visible",
            );
        }
        if shows_text && step.fade_in_ms > step.duration_ms {
            self.add_warning(
                &format!("{path}.fade_in_ms"),
                "Fade-in is longer than the hold and will be clamped",
            );
        }

        for (field, value) in [
            ("duration_ms", step.duration_ms),
            ("transition_ms", step.transition_ms),
            ("fade_in_ms", step.fade_in_ms),
        ] {
            if value > LONG_DURATION_MS {
                self.add_warning(
                    &format!("{path}.{field}"),
                    &format!("Unusually long duration ({value} ms)"),
                );
            }
        }
    }

    fn check_templates(&mut self, text: &str, path: &str, gathered: &HashSet<String>) {
        for variable in template::referenced_variables(text) {
            if !gathered.contains(&variable) {
                self.add_warning(
                    path,
                    &format!(
                        "Variable '${{{variable}}}' is not gathered by an earlier input step \
                         and will render empty"
                    ),
                );
            }
        }
    }

    fn check_terminal(&mut self, config: &SequenceConfig, path: &str) {
        let terminals: Vec<_> = config
            .steps()
            .filter(|(_, _, step)| step.kind.is_terminal())
            .collect();

        match terminals.as_slice() {
            [] => self.add_error(path, "Sequence must end with a terminal step"),
            [(pi, si, step)] => {
                let last_phase = config.phases.len() - 1;
                let is_last = *pi == last_phase && *si + 1 == config.phases[last_phase].steps.len();
                if !is_last {
                    self.add_error(
                        &format!("{path}.phases[{pi}].steps[{si}]"),
                        "Terminal step must be the last step of the last phase",
                    );
                }
                if config.skip_exit_ms >= step.transition_ms {
                    self.add_error(
                        &format!("{path}.skip_exit_ms"),
                        &format!(
                            "Skip exit ({} ms) must be shorter than the terminal transition ({} ms)",
                            config.skip_exit_ms, step.transition_ms
                        ),
                    );
                }
            }
            [_, rest @ ..] => {
                for (pi, si, _) in rest {
                    self.add_error(
                        &format!("{path}.phases[{pi}].steps[{si}]"),
                        "Sequence has more than one terminal step",
                    );
                }
            }
        }
    }

    // ========================================================================
    // Site sections
    // ========================================================================

    fn check_facts(&mut self, facts: &FactSourceConfig) {
        if facts.endpoint.trim().is_empty() {
            self.add_error("facts.endpoint", "Fact endpoint cannot be empty");
        } else {
            match reqwest::Url::parse(&facts.endpoint) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                _ => self.add_error(
                    "facts.endpoint",
                    &format!("'{}' is not an http(s) URL", facts.endpoint),
                ),
            }
        }

        if facts.timeout_ms == 0 {
            self.add_error("facts.timeout_ms", "Fact timeout must be greater than zero");
        }
        if facts.max_chars == 0 {
            self.add_error("facts.max_chars", "Fact length limit must be greater than zero");
        }
        for (i, fact) in facts.fallback.iter().enumerate() {
            if fact.trim().is_empty() {
                self.add_error(&format!("facts.fallback[{i}]"), "Fallback fact is empty");
            }
        }
    }

    fn check_ledger(&mut self, ledger: &LedgerConfig) {
        if ledger.key.trim().is_empty() {
            self.add_error("ledger.key", "Ledger key cannot be empty");
        }
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    /// Adds an error to the collection.
    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    /// Adds a warning to the collection.
    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::Phase;

    fn limits() -> ConfigLimits {
        ConfigLimits::default()
    }

    fn step(id: &str, kind: StepKind, duration_ms: u64, transition_ms: u64) -> Step {
        Step {
            id: id.to_string(),
            kind,
            duration_ms,
            transition_ms,
            fade_in_ms: 0,
        }
    }

    fn text(id: &str) -> Step {
        step(
            id,
            StepKind::StaticText {
                text: id.to_string(),
            },
            150,
            0,
        )
    }

    fn terminal() -> Step {
        step(
            "ready",
            StepKind::Terminal {
                text: "Ready!".to_string(),
                subtitle: None,
            },
            500,
            300,
        )
    }

    fn sequence(phases: Vec<Phase>) -> SequenceConfig {
        SequenceConfig {
            name: "boot".to_string(),
            skip_exit_ms: 150,
            phases,
        }
    }

    fn phase(id: &str, steps: Vec<Step>) -> Phase {
        Phase {
            id: id.to_string(),
            steps,
        }
    }

    fn validate(config: &SequenceConfig) -> ValidationResult {
        Validator::new().validate_sequence(config, "boot", 5, &limits())
    }

    fn has_error(result: &ValidationResult, needle: &str) -> bool {
        result.errors.iter().any(|e| e.message.contains(needle))
    }

    #[test]
    fn test_valid_sequence() {
        let config = sequence(vec![
            phase("checks", vec![text("init"), text("live")]),
            phase("done", vec![terminal()]),
        ]);
        let result = validate(&config);
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_no_phases() {
        let result = validate(&sequence(vec![]));
        assert!(has_error(&result, "at least one phase"));
    }

    #[test]
    fn test_empty_phase() {
        let config = sequence(vec![phase("empty", vec![]), phase("done", vec![terminal()])]);
        assert!(has_error(&validate(&config), "at least one step"));
    }

    #[test]
    fn test_duplicate_ids() {
        let config = sequence(vec![
            phase("a", vec![text("x"), text("x")]),
            phase("a", vec![terminal()]),
        ]);
        let result = validate(&config);
        assert!(has_error(&result, "Duplicate step id 'x'"));
        assert!(has_error(&result, "Duplicate phase id 'a'"));
    }

    #[test]
    fn test_missing_terminal() {
        let config = sequence(vec![phase("a", vec![text("x")])]);
        assert!(has_error(&validate(&config), "must end with a terminal"));
    }

    #[test]
    fn test_terminal_not_last() {
        let config = sequence(vec![
            phase("a", vec![terminal(), text("x")]),
        ]);
        assert!(has_error(&validate(&config), "last step of the last phase"));
    }

    #[test]
    fn test_two_terminals() {
        let config = sequence(vec![phase("a", vec![terminal()]), phase("b", vec![terminal()])]);
        assert!(has_error(&validate(&config), "more than one terminal"));
    }

    #[test]
    fn test_skip_exit_must_be_shorter_than_terminal_transition() {
        let mut config = sequence(vec![phase("a", vec![text("x"), terminal()])]);
        config.skip_exit_ms = 300;
        assert!(has_error(&validate(&config), "Skip exit"));
    }

    #[test]
    fn test_fetched_count_bounds() {
        let zero = sequence(vec![phase(
            "a",
            vec![
                step("f", StepKind::FetchedText { count: 0, settle_ms: 0 }, 100, 0),
                terminal(),
            ],
        )]);
        assert!(has_error(&validate(&zero), "at least 1"));

        let too_many = sequence(vec![phase(
            "a",
            vec![
                step("f", StepKind::FetchedText { count: 6, settle_ms: 0 }, 100, 0),
                terminal(),
            ],
        )]);
        assert!(has_error(&validate(&too_many), "exceeds the fallback pool"));
    }

    #[test]
    fn test_empty_quotes() {
        let config = sequence(vec![phase(
            "a",
            vec![
                step(
                    "q",
                    StepKind::QuoteRotation {
                        quotes: vec![],
                        shuffle: false,
                    },
                    100,
                    0,
                ),
                terminal(),
            ],
        )]);
        assert!(has_error(&validate(&config), "Quote list cannot be empty"));
    }

    #[test]
    fn test_warnings_do_not_fail() {
        let config = sequence(vec![phase(
            "a",
            vec![
                step(
                    "zero",
                    StepKind::StaticText {
                        text: "Hi ${name}".to_string(),
                    },
                    0,
                    90_000,
                ),
                terminal(),
            ],
        )]);
        let result = validate(&config);
        assert!(result.is_valid(), "{:?}", result.errors);
        let messages: Vec<_> = result.warnings.iter().map(|w| w.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("zero duration")));
        assert!(messages.iter().any(|m| m.contains("Unusually long")));
        assert!(messages.iter().any(|m| m.contains("'${name}'")));
    }

    #[test]
    fn test_gathered_variable_is_not_flagged() {
        let config = sequence(vec![phase(
            "a",
            vec![
                step(
                    "ask",
                    StepKind::InputGather {
                        prompt: "Name?".to_string(),
                        field: "name".to_string(),
                        placeholder: None,
                    },
                    0,
                    100,
                ),
                step(
                    "hi",
                    StepKind::StaticText {
                        text: "Hi ${name}".to_string(),
                    },
                    100,
                    0,
                ),
                terminal(),
            ],
        )]);
        let result = validate(&config);
        assert!(result.is_valid());
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn test_site_sections() {
        let mut facts = FactSourceConfig::default();
        facts.endpoint = "ftp://example.com".to_string();
        facts.timeout_ms = 0;
        let mut validator = Validator::new();
        validator.check_facts(&facts);
        validator.check_ledger(&LedgerConfig {
            path: None,
            key: " ".to_string(),
        });
        let result = validator.finish();
        assert!(has_error(&result, "not an http(s) URL"));
        assert!(has_error(&result, "timeout"));
        assert!(has_error(&result, "Ledger key"));
    }

    #[test]
    fn test_collects_all_errors() {
        let config = SequenceConfig {
            name: String::new(),
            skip_exit_ms: 100,
            phases: vec![phase("", vec![])],
        };
        let result = validate(&config);
        assert!(result.errors.len() >= 3, "{:?}", result.errors);
    }
}
