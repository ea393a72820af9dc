//! Configuration loader
//!
//! This module implements the configuration loading pipeline:
//! 1. Size check and UTF-8 BOM strip
//! 2. Environment variable expansion (pre-parse, on raw text)
//! 3. YAML parsing
//! 4. Deserialization to typed config
//! 5. Theme resolution
//! 6. Validation
//! 7. Freeze with `Arc`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_yaml::Value;

use crate::config::schema::{
    FactSourceConfig, LedgerConfig, MainConfig, SequenceConfig, SequenceSource, SiteConfig,
};
use crate::config::validation::Validator;
use crate::error::ConfigError;
use crate::themes;

/// Path label used for configurations loaded from memory.
const INLINE_SOURCE: &str = "<inline>";

// ============================================================================
// Public API
// ============================================================================

/// Options for the configuration loader.
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    /// Limits for configuration size.
    pub config_limits: ConfigLimits,
}

/// Limits for configuration size to prevent resource exhaustion.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum number of phases per sequence.
    pub max_phases: usize,

    /// Maximum configuration file size in bytes.
    pub max_config_size: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_phases: env_or("STAGEHAND_MAX_PHASES", 32),
            max_config_size: env_or("STAGEHAND_MAX_CONFIG_SIZE", 1024 * 1024),
        }
    }
}

/// A site configuration with every theme reference resolved.
#[derive(Debug, Clone)]
pub struct LoadedSite {
    /// First-visit narrative sequence.
    pub narrative: Arc<SequenceConfig>,
    /// Boot sequence.
    pub boot: Arc<SequenceConfig>,
    /// Fact provider settings.
    pub facts: FactSourceConfig,
    /// Visit ledger settings.
    pub ledger: LedgerConfig,
    /// Main-content settings.
    pub main: MainConfig,
}

/// Result of loading a configuration file.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated configuration.
    pub site: LoadedSite,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during configuration loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} ({location})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Configuration loader.
///
/// Handles the full loading pipeline from YAML file to frozen [`LoadedSite`].
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: LoaderOptions,
}

impl ConfigLoader {
    /// Creates a new configuration loader with the given options.
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Creates a new configuration loader with default options.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(LoaderOptions::default())
    }

    /// Loads a configuration file and returns the frozen configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read or exceeds the size limit
    /// - A required environment variable is unset
    /// - YAML parsing or deserialization fails
    /// - A theme name is unknown
    /// - Validation fails
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let max = self.options.config_limits.max_config_size;
        let file_size = usize::try_from(metadata.len()).unwrap_or(max.saturating_add(1));
        if file_size > max {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_string(),
                value: format!("{file_size} bytes"),
                expected: format!("at most {max} bytes"),
            });
        }

        let raw_content = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        self.load_content(&raw_content, path)
    }

    /// Loads a configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load), minus file access.
    pub fn load_from_str(&self, yaml: &str) -> Result<LoadResult, ConfigError> {
        self.load_content(yaml, Path::new(INLINE_SOURCE))
    }

    /// Resolves and validates the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error only if a built-in theme is broken.
    pub fn load_defaults(&self) -> Result<LoadResult, ConfigError> {
        self.finish(SiteConfig::default(), Path::new(INLINE_SOURCE), Vec::new())
    }

    fn load_content(&self, raw: &str, path: &Path) -> Result<LoadResult, ConfigError> {
        let mut warnings = Vec::new();

        // Handle UTF-8 BOM
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        // Stage 1: Environment variable substitution (before YAML parsing)
        let mut env_sub = EnvSubstitution::new();
        let substituted = env_sub.substitute(raw, path)?;
        warnings.extend(env_sub.warnings);

        // Stage 2: YAML parsing
        let root: Value =
            serde_yaml::from_str(&substituted).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;

        if root.is_null() {
            warnings.push(LoadWarning {
                message: "Configuration file is empty; using built-in defaults".to_string(),
                location: Some(path.display().to_string()),
            });
            return self.finish(SiteConfig::default(), path, warnings);
        }

        // `Step` flattens its kind, so serde cannot reject stray keys there.
        reject_unknown_step_keys(&root, path)?;

        // Stage 3: Deserialize to typed config
        let site: SiteConfig =
            serde_yaml::from_value(root).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                line: None,
                message: format!("Failed to deserialize configuration: {e}"),
            })?;

        self.finish(site, path, warnings)
    }

    fn finish(
        &self,
        site: SiteConfig,
        path: &Path,
        mut warnings: Vec<LoadWarning>,
    ) -> Result<LoadResult, ConfigError> {
        // Stage 4: Theme resolution
        let loaded = LoadedSite {
            narrative: Arc::new(resolve_source(site.narrative)?),
            boot: Arc::new(resolve_source(site.boot)?),
            facts: site.facts,
            ledger: site.ledger,
            main: site.main,
        };

        // Stage 5: Validation
        let mut validator = Validator::new();
        let validation_result = validator.validate(&loaded, &self.options.config_limits);

        if validation_result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                errors: validation_result.errors,
            });
        }

        for issue in validation_result.warnings {
            warnings.push(LoadWarning {
                message: issue.message,
                location: Some(issue.path),
            });
        }

        Ok(LoadResult {
            site: loaded,
            warnings,
        })
    }
}

// ============================================================================
// Step Key Check
// ============================================================================

/// Keys accepted on every step.
const COMMON_STEP_KEYS: &[&str] = &["id", "kind", "duration_ms", "transition_ms", "fade_in_ms"];

/// Keys accepted on top of [`COMMON_STEP_KEYS`] for a given kind tag.
/// `None` for unknown tags, which deserialization reports on its own.
fn kind_step_keys(kind: &str) -> Option<&'static [&'static str]> {
    match kind {
        "static_text" => Some(&["text"]),
        "fetched_text" => Some(&["count", "settle_ms"]),
        "input_gather" => Some(&["prompt", "field", "placeholder"]),
        "quote_rotation" => Some(&["quotes", "shuffle"]),
        "terminal" => Some(&["text", "subtitle"]),
        _ => None,
    }
}

/// Fails on the first step key that its kind does not define.
fn reject_unknown_step_keys(root: &Value, path: &Path) -> Result<(), ConfigError> {
    for section in ["narrative", "boot"] {
        let Some(phases) = root
            .get(section)
            .and_then(|s| s.get("phases"))
            .and_then(Value::as_sequence)
        else {
            continue;
        };

        for (pi, phase) in phases.iter().enumerate() {
            let Some(steps) = phase.get("steps").and_then(Value::as_sequence) else {
                continue;
            };

            for (si, step) in steps.iter().enumerate() {
                let Some(mapping) = step.as_mapping() else {
                    continue;
                };
                let Some(allowed) = step
                    .get("kind")
                    .and_then(Value::as_str)
                    .and_then(kind_step_keys)
                else {
                    continue;
                };

                let unknown = mapping.keys().filter_map(Value::as_str).find(|key| {
                    !COMMON_STEP_KEYS.contains(key) && !allowed.contains(key)
                });
                if let Some(key) = unknown {
                    return Err(ConfigError::ParseError {
                        path: path.to_path_buf(),
                        line: None,
                        message: format!(
                            "unknown field `{key}` at {section}.phases[{pi}].steps[{si}]"
                        ),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Replaces a theme reference with the theme's definition.
///
/// # Errors
///
/// Returns `ConfigError::UnknownTheme` for a name not in the registry.
pub fn resolve_source(source: SequenceSource) -> Result<SequenceConfig, ConfigError> {
    match source {
        SequenceSource::Theme { theme } => themes::load_theme(&theme),
        SequenceSource::Inline(config) => Ok(config),
    }
}

// ============================================================================
// Environment Variable Substitution
// ============================================================================

/// Pre-parse environment variable substitution.
///
/// Runs on raw YAML text BEFORE parsing to preserve type inference. Only
/// upper-case names (`[A-Z_][A-Z0-9_]*`) are environment references; any
/// other `${...}` is left intact for step templates such as `${name}`.
struct EnvSubstitution {
    warnings: Vec<LoadWarning>,
}

impl EnvSubstitution {
    const fn new() -> Self {
        Self {
            warnings: Vec::new(),
        }
    }

    /// Substitutes environment variables in raw YAML text.
    ///
    /// Supports:
    /// - `${VAR}` - expand to value (empty string if unset with warning)
    /// - `${VAR:-default}` - expand to default if unset
    /// - `${VAR:?message}` - fail if unset
    /// - `$$` - literal `$`
    fn substitute(&mut self, raw_yaml: &str, source_path: &Path) -> Result<String, ConfigError> {
        let mut result = String::with_capacity(raw_yaml.len());
        let mut rest = raw_yaml;

        while let Some(idx) = rest.find('$') {
            result.push_str(&rest[..idx]);
            let tail = &rest[idx..];

            if let Some(after) = tail.strip_prefix("$$") {
                result.push('$');
                rest = after;
                continue;
            }

            let Some(spec) = tail.strip_prefix("${") else {
                result.push('$');
                rest = &tail[1..];
                continue;
            };

            let name_len = spec
                .find(|c: char| !(c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'))
                .unwrap_or(spec.len());
            let name = &spec[..name_len];
            let after_name = &spec[name_len..];
            let is_env_name = name.starts_with(|c: char| c.is_ascii_uppercase() || c == '_');

            if !is_env_name || !(after_name.starts_with('}') || after_name.starts_with(':')) {
                // Not an environment reference; keep `${` for the template engine.
                result.push_str("${");
                rest = spec;
                continue;
            }

            let (default, error_msg, consumed) = Self::parse_modifier(name, after_name, source_path)?;
            match std::env::var(name) {
                Ok(value) => result.push_str(&value),
                Err(_) => {
                    if let Some(default_val) = default {
                        result.push_str(default_val);
                    } else if let Some(msg) = error_msg {
                        return Err(ConfigError::EnvVarNotSet {
                            var: name.to_string(),
                            location: msg.to_string(),
                        });
                    } else {
                        self.warnings.push(LoadWarning {
                            message: format!(
                                "Environment variable '{name}' is not set, using empty string"
                            ),
                            location: Some(source_path.display().to_string()),
                        });
                    }
                }
            }
            rest = &after_name[consumed..];
        }

        result.push_str(rest);
        Ok(result)
    }

    /// Parses what follows the variable name up to and including the
    /// closing `}`.
    ///
    /// Returns (`default_value`, `error_message`, bytes consumed).
    fn parse_modifier<'a>(
        name: &str,
        after_name: &'a str,
        source_path: &Path,
    ) -> Result<(Option<&'a str>, Option<&'a str>, usize), ConfigError> {
        if after_name.starts_with('}') {
            return Ok((None, None, 1));
        }

        let unclosed = || ConfigError::ParseError {
            path: source_path.to_path_buf(),
            line: None,
            message: format!("Unclosed environment variable reference: ${{{name}"),
        };

        let body_start = 2;
        let close = after_name.find('}').ok_or_else(unclosed)?;
        if close < body_start {
            return Err(unclosed());
        }
        let body = &after_name[body_start..close];

        if after_name.starts_with(":-") {
            Ok((Some(body), None, close + 1))
        } else if after_name.starts_with(":?") {
            Ok((None, Some(body), close + 1))
        } else {
            Err(ConfigError::ParseError {
                path: source_path.to_path_buf(),
                line: None,
                message: format!("Unsupported modifier in environment reference ${{{name}...}}"),
            })
        }
    }
}

/// Reads an environment variable as `T`, falling back to `default`.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Returns the default path of the visit ledger file.
///
/// `$XDG_STATE_HOME/stagehand/state.json`, else
/// `$HOME/.local/state/stagehand/state.json`, else `./.stagehand-state.json`.
#[must_use]
pub fn default_ledger_path() -> PathBuf {
    if let Some(dir) = std::env::var_os("XDG_STATE_HOME").filter(|d| !d.is_empty()) {
        return PathBuf::from(dir).join("stagehand").join("state.json");
    }
    if let Some(home) = std::env::var_os("HOME").filter(|h| !h.is_empty()) {
        return PathBuf::from(home)
            .join(".local")
            .join("state")
            .join("stagehand")
            .join("state.json");
    }
    PathBuf::from(".stagehand-state.json")
}

// ============================================================================
// Tests
// ============================================================================
