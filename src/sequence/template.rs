//! Template interpolation for step text.
//!
//! Single-pass `${name}` substitution from the variables gathered by input
//! steps. Missing variables resolve to an empty string; `$${` is a literal
//! `${`. Substituted values are never re-interpolated.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

/// Regex for matching `${...}` template variables.
static TEMPLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"));

/// Sentinel marker for escaped `$${` sequences.
const ESCAPE_SENTINEL: &str = "\x00ESC_DOLLAR\x00";

/// Resolves all `${...}` variables in `template`.
#[must_use]
pub fn render(template: &str, variables: &BTreeMap<String, String>) -> String {
    if !template.contains('$') {
        return template.to_string();
    }

    let working = template.replace("$${", ESCAPE_SENTINEL);

    let result = TEMPLATE_RE
        .replace_all(&working, |caps: &regex::Captures| {
            variables
                .get(caps[1].trim())
                .cloned()
                .unwrap_or_default()
        })
        .to_string();

    result.replace(ESCAPE_SENTINEL, "${")
}

/// Returns the variable names referenced by `template`.
#[must_use]
pub fn referenced_variables(template: &str) -> Vec<String> {
    let working = template.replace("$${", ESCAPE_SENTINEL);
    TEMPLATE_RE
        .captures_iter(&working)
        .map(|caps| caps[1].trim().to_string())
        .collect()
}
