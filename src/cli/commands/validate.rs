//! `validate` command
//!
//! Loads each configuration file through the full pipeline and reports
//! warnings without playing anything.

use std::path::Path;

use serde_json::json;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::loader::{ConfigLoader, LoadWarning};
use crate::error::{ConfigError, Severity, StagehandError, ValidationIssue};

/// Validate configuration files.
///
/// Every file is checked before returning; the first failure decides
/// the exit code.
///
/// # Errors
///
/// Returns a config error if any file fails to load or validate, or if
/// `--strict` is set and any file has warnings.
pub fn run(args: &ValidateArgs) -> Result<(), StagehandError> {
    let loader = ConfigLoader::with_defaults();
    let mut first_error: Option<StagehandError> = None;

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating configuration");
        let outcome = loader
            .load(path)
            .and_then(|result| check_strict(path, result.warnings, args.strict));

        match outcome {
            Ok(warnings) => {
                report_valid(path, &warnings, args.format);
                tracing::info!(file = %path.display(), "configuration valid");
            }
            Err(error) => {
                report_invalid(path, &error, args.format);
                first_error.get_or_insert(error.into());
            }
        }
    }

    first_error.map_or(Ok(()), Err)
}

fn check_strict(
    path: &Path,
    warnings: Vec<LoadWarning>,
    strict: bool,
) -> Result<Vec<LoadWarning>, ConfigError> {
    if !strict || warnings.is_empty() {
        return Ok(warnings);
    }
    Err(ConfigError::ValidationError {
        path: path.display().to_string(),
        errors: warnings
            .into_iter()
            .map(|w| ValidationIssue {
                path: w.location.unwrap_or_default(),
                message: w.message,
                severity: Severity::Error,
            })
            .collect(),
    })
}

fn report_valid(path: &Path, warnings: &[LoadWarning], format: OutputFormat) {
    match format {
        OutputFormat::Human => {
            println!("ok: {}", path.display());
            for warning in warnings {
                println!("  warning: {warning}");
            }
        }
        OutputFormat::Json => {
            let warnings: Vec<String> = warnings.iter().map(ToString::to_string).collect();
            println!(
                "{}",
                json!({ "file": path.display().to_string(), "valid": true, "warnings": warnings })
            );
        }
    }
}

fn report_invalid(path: &Path, error: &ConfigError, format: OutputFormat) {
    let issues: Vec<String> = match error {
        ConfigError::ValidationError { errors, .. } => {
            errors.iter().map(ToString::to_string).collect()
        }
        other => vec![other.to_string()],
    };

    match format {
        OutputFormat::Human => {
            println!("invalid: {}", path.display());
            for issue in &issues {
                println!("  {issue}");
            }
        }
        OutputFormat::Json => {
            println!(
                "{}",
                json!({ "file": path.display().to_string(), "valid": false, "errors": issues })
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warning(message: &str) -> LoadWarning {
        LoadWarning {
            message: message.to_string(),
            location: Some("boot.phases[0]".to_string()),
        }
    }

    #[test]
    fn lenient_keeps_warnings() {
        let kept = check_strict(Path::new("a.yaml"), vec![warning("slow")], false).unwrap();
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn strict_promotes_warnings() {
        let err = check_strict(Path::new("a.yaml"), vec![warning("slow")], true).unwrap_err();
        match err {
            ConfigError::ValidationError { path, errors } => {
                assert_eq!(path, "a.yaml");
                assert_eq!(errors[0].severity, Severity::Error);
                assert_eq!(errors[0].path, "boot.phases[0]");
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn strict_without_warnings_passes() {
        assert!(check_strict(Path::new("a.yaml"), Vec::new(), true).is_ok());
    }
}
