//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod completions;
pub mod play;
pub mod themes;
pub mod validate;
pub mod version;

use crate::cli::args::{Cli, Commands};
use crate::error::StagehandError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli) -> Result<(), StagehandError> {
    match cli.command {
        Commands::Play(args) => play::run(&args).await,
        Commands::Validate(args) => validate::run(&args),
        Commands::Themes(args) => themes::run(&args),
        Commands::Completions(args) => {
            completions::run(&args);
            Ok(())
        }
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}
