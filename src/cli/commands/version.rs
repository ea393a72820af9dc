//! Version information display
//!
//! Prints version and build metadata in human or JSON format.

use serde_json::json;

use crate::cli::args::{OutputFormat, VersionArgs};
use crate::themes;

/// Print version and build information.
pub fn run(args: &VersionArgs) {
    let name = env!("CARGO_PKG_NAME");
    let version = env!("CARGO_PKG_VERSION");
    let theme_names: Vec<&str> = themes::list_themes(None).iter().map(|t| t.name).collect();

    match args.format {
        OutputFormat::Human => {
            println!("{name} {version}");
            println!("built-in themes: {}", theme_names.join(", "));
        }
        OutputFormat::Json => {
            let info = json!({
                "name": name,
                "version": version,
                "themes": theme_names,
            });
            println!("{info}");
        }
    }
}
