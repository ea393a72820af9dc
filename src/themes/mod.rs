//! Built-in themes
//!
//! Curated sequence definitions embedded in the binary at compile time, so
//! `stagehand play` works with no configuration file at all.

use std::fmt;
use std::sync::LazyLock;

use crate::config::schema::SequenceConfig;
use crate::error::ConfigError;

// ============================================================================
// Types
// ============================================================================

/// A built-in sequence embedded in the binary.
pub struct BuiltinTheme {
    /// Unique identifier (e.g., "cinematic").
    pub name: &'static str,

    /// Short human-readable description.
    pub description: &'static str,

    /// Which screen the theme is meant for.
    pub kind: ThemeKind,

    /// Raw YAML content (embedded at compile time).
    pub yaml: &'static str,
}

/// Screen a theme is designed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ThemeKind {
    /// First-visit narrative.
    Narrative,
    /// Boot animation.
    Boot,
}

impl ThemeKind {
    /// Returns the human-readable title-case label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Narrative => "Narrative",
            Self::Boot => "Boot",
        }
    }

    /// Returns all kinds in display order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Narrative, Self::Boot]
    }
}

impl fmt::Display for ThemeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Narrative => write!(f, "narrative"),
            Self::Boot => write!(f, "boot"),
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

static BUILTIN_THEMES: LazyLock<Vec<BuiltinTheme>> = LazyLock::new(|| {
    vec![
        BuiltinTheme {
            name: "cinematic",
            description: "Letterboxed reel of four remote facts, then a welcome card",
            kind: ThemeKind::Narrative,
            yaml: include_str!("../../themes/cinematic.yaml"),
        },
        BuiltinTheme {
            name: "greeting",
            description: "Asks the visitor's name and greets them with rotating quotes",
            kind: ThemeKind::Narrative,
            yaml: include_str!("../../themes/greeting.yaml"),
        },
        BuiltinTheme {
            name: "console",
            description: "Six quick boot checks, then \"Ready!\"",
            kind: ThemeKind::Boot,
            yaml: include_str!("../../themes/console.yaml"),
        },
    ]
});

// ============================================================================
// Public API
// ============================================================================

/// Look up a theme by exact name.
#[must_use]
pub fn find_theme(name: &str) -> Option<&'static BuiltinTheme> {
    BUILTIN_THEMES.iter().find(|t| t.name == name)
}

/// List all themes, optionally filtered by kind.
#[must_use]
pub fn list_themes(kind: Option<ThemeKind>) -> Vec<&'static BuiltinTheme> {
    BUILTIN_THEMES
        .iter()
        .filter(|t| kind.is_none_or(|k| t.kind == k))
        .collect()
}

/// Suggest a similar theme name for typo correction.
///
/// Returns the closest match if its Damerau-Levenshtein distance is ≤ 3.
#[must_use]
pub fn suggest_theme(input: &str) -> Option<String> {
    BUILTIN_THEMES
        .iter()
        .map(|t| (t.name, strsim::damerau_levenshtein(input, t.name)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(name, _)| name.to_string())
}

/// Parses a built-in theme into a sequence.
///
/// Theme YAML is not run through environment substitution.
///
/// # Errors
///
/// Returns `ConfigError::UnknownTheme` (with a suggestion when one is
/// close) if `name` is not registered, or `ConfigError::ParseError` if the
/// embedded YAML is malformed.
pub fn load_theme(name: &str) -> Result<SequenceConfig, ConfigError> {
    let theme = find_theme(name).ok_or_else(|| ConfigError::UnknownTheme {
        name: name.to_string(),
        suggestion: suggest_theme(name),
    })?;

    serde_yaml::from_str(theme.yaml).map_err(|e| ConfigError::ParseError {
        path: format!("<theme:{name}>").into(),
        line: e.location().map(|l| l.line()),
        message: e.to_string(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use crate::config::loader::ConfigLimits;
    use crate::config::validation::Validator;
    use crate::facts::FALLBACK_FACTS;

    #[test]
    fn all_builtin_themes_parse_and_validate() {
        for theme in list_themes(None) {
            let config = load_theme(theme.name)
                .unwrap_or_else(|e| panic!("theme '{}' failed to parse: {e}", theme.name));
            assert_eq!(config.name, theme.name);
            let result = Validator::new().validate_sequence(
                &config,
                theme.name,
                FALLBACK_FACTS.len(),
                &ConfigLimits::default(),
            );
            assert!(
                result.is_valid(),
                "theme '{}' failed validation: {:?}",
                theme.name,
                result.errors
            );
            assert!(
                result.warnings.is_empty(),
                "theme '{}' has warnings: {:?}",
                theme.name,
                result.warnings
            );
        }
    }

    #[test]
    fn no_duplicate_theme_names() {
        let names: Vec<&str> = list_themes(None).iter().map(|t| t.name).collect();
        let unique: HashSet<&str> = names.iter().copied().collect();
        assert_eq!(names.len(), unique.len());
    }

    #[test]
    fn cinematic_matches_reel_timing() {
        let config = load_theme("cinematic").unwrap();
        let (_, _, terminal) = config.terminal().unwrap();
        assert_eq!(terminal.duration_ms, 1500);
        assert_eq!(terminal.transition_ms, 1000);
        assert_eq!(config.skip_exit_ms, 800);
        assert_eq!(config.total_units(), 5);
    }

    #[test]
    fn console_has_six_checks() {
        let config = load_theme("console").unwrap();
        assert_eq!(config.phases[0].steps.len(), 6);
        assert_eq!(config.total_units(), 7);
        assert_eq!(config.natural_budget_ms(), 6 * 150 + 500 + 300);
    }

    #[test]
    fn unknown_theme_has_suggestion() {
        match load_theme("consol") {
            Err(ConfigError::UnknownTheme { suggestion, .. }) => {
                assert_eq!(suggestion.as_deref(), Some("console"));
            }
            other => panic!("expected UnknownTheme, got {other:?}"),
        }
    }

    #[test]
    fn suggest_theme_far() {
        assert!(suggest_theme("xyzabc123").is_none());
    }

    #[test]
    fn list_filter_by_kind() {
        let boot = list_themes(Some(ThemeKind::Boot));
        assert_eq!(boot.len(), 1);
        assert_eq!(boot[0].name, "console");
        for theme in list_themes(Some(ThemeKind::Narrative)) {
            assert_eq!(theme.kind, ThemeKind::Narrative);
        }
    }

    #[test]
    fn kind_display_and_label() {
        assert_eq!(ThemeKind::Narrative.to_string(), "narrative");
        assert_eq!(ThemeKind::Boot.label(), "Boot");
        assert_eq!(ThemeKind::all().len(), 2);
    }
}
