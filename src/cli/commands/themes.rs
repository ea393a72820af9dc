//! `themes` command
//!
//! Lists the built-in themes with their kind and natural running time.

use std::time::Duration;

use serde_json::json;

use crate::cli::args::{OutputFormat, ThemesArgs};
use crate::error::StagehandError;
use crate::themes::{self, ThemeKind};

/// Print the built-in themes.
///
/// # Errors
///
/// Returns a config error if a built-in theme fails to parse.
pub fn run(args: &ThemesArgs) -> Result<(), StagehandError> {
    match args.format {
        OutputFormat::Human => {
            for kind in ThemeKind::all() {
                if args.kind.is_some_and(|k| k != *kind) {
                    continue;
                }
                println!("{}:", kind.label());
                for theme in themes::list_themes(Some(*kind)) {
                    let budget = natural_budget(theme.name)?;
                    println!(
                        "  {:<12} {:>10}  {}",
                        theme.name,
                        humantime::format_duration(budget).to_string(),
                        theme.description
                    );
                }
            }
        }
        OutputFormat::Json => {
            let mut entries = Vec::new();
            for theme in themes::list_themes(args.kind) {
                let budget = natural_budget(theme.name)?;
                entries.push(json!({
                    "name": theme.name,
                    "kind": theme.kind.to_string(),
                    "description": theme.description,
                    "natural_budget_ms": u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
                }));
            }
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }
    Ok(())
}

fn natural_budget(name: &str) -> Result<Duration, StagehandError> {
    let config = themes::load_theme(name)?;
    Ok(Duration::from_millis(config.natural_budget_ms()))
}
