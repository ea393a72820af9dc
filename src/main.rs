//! `stagehand` - staged intro and boot sequencer

use clap::Parser;

use stagehand::cli::args::Cli;
use stagehand::cli::commands;
use stagehand::error::ExitCode;
use stagehand::observability::init_logging;

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            // --help and --version also arrive here, on stdout.
            let code = if error.use_stderr() {
                ExitCode::USAGE_ERROR
            } else {
                ExitCode::SUCCESS
            };
            let _ = error.print();
            std::process::exit(code);
        }
    };

    init_logging(cli.log_format, cli.verbose, cli.quiet, cli.color);

    // Ctrl+C is handled by `play` as a skip; SIGTERM always exits.
    #[cfg(unix)]
    tokio::spawn(async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                std::process::exit(ExitCode::TERMINATED);
            }
            Err(error) => tracing::warn!(%error, "failed to register SIGTERM handler"),
        }
    });

    let result = commands::dispatch(cli).await;

    match result {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
