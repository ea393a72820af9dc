//! `play` command
//!
//! Runs the phase controller in the terminal. Each visible view change is
//! printed as one line on stdout. A stdin line answers an input step;
//! otherwise `s` or `skip` skips the active sequence, as does Ctrl+C.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::cli::args::PlayArgs;
use crate::config::loader::{ConfigLimits, ConfigLoader, LoadedSite, default_ledger_path};
use crate::config::validation::Validator;
use crate::controller::{ActiveSequence, MainContent, PhaseController, Screen};
use crate::error::{ConfigError, ExitCode, StagehandError};
use crate::facts::{FactSource, HttpFactProvider, OfflineFacts};
use crate::ledger::{FileStore, MemoryStore, StateStore, VisitLedger};
use crate::observability::{self, EventEmitter};
use crate::sequence::{RunState, StepView};
use crate::themes;

/// Play the configured screens.
///
/// # Errors
///
/// Returns a config error if the configuration or `--theme` is invalid,
/// or an I/O error if the events file cannot be created.
pub async fn run(args: &PlayArgs) -> Result<(), StagehandError> {
    if let Some(port) = args.metrics_port {
        observability::init_metrics(Some(port))?;
        info!(port, "Prometheus metrics endpoint started");
    }

    let site = load_site(args)?;
    let facts = fact_source(&site, args.offline);
    let ledger = visit_ledger(&site, args);
    let events = match &args.events_file {
        Some(path) if path.as_os_str() == "-" => EventEmitter::stderr(),
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::noop(),
    };

    let main = Arc::new(Banner {
        text: site.main.banner.clone(),
    });
    let controller = Arc::new(
        PhaseController::new(ledger, site.narrative, site.boot, facts, main)
            .with_events(Arc::new(events)),
    );

    let renderer = tokio::spawn(render_screens(Arc::clone(&controller)));
    let reader = tokio::spawn(read_commands(Arc::clone(&controller)));
    let interrupts = tokio::spawn(skip_on_interrupt(Arc::clone(&controller)));

    let started = Instant::now();
    controller.run().await;
    if let Err(error) = renderer.await {
        debug!(%error, "renderer stopped early");
    }
    reader.abort();
    interrupts.abort();

    let elapsed = Duration::from_millis(
        u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    );
    info!(elapsed = %humantime::format_duration(elapsed), "playback finished");
    Ok(())
}

fn load_site(args: &PlayArgs) -> Result<LoadedSite, StagehandError> {
    let loader = ConfigLoader::with_defaults();
    let result = match &args.config {
        Some(path) => {
            info!(config = %path.display(), "loading configuration");
            loader.load(path)?
        }
        None => loader.load_defaults()?,
    };

    for warning in &result.warnings {
        warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }

    let mut site = result.site;
    if let Some(name) = &args.theme {
        let narrative = themes::load_theme(name)?;
        let check = Validator::new().validate_sequence(
            &narrative,
            "narrative",
            site.facts.fallback.len(),
            &ConfigLimits::default(),
        );
        if check.has_errors() {
            return Err(ConfigError::ValidationError {
                path: format!("<theme:{name}>"),
                errors: check.errors,
            }
            .into());
        }
        site.narrative = Arc::new(narrative);
    }
    Ok(site)
}

fn fact_source(site: &LoadedSite, offline: bool) -> Arc<dyn FactSource> {
    let offline_source = || Arc::new(OfflineFacts::new(site.facts.fallback.clone()));
    if offline {
        debug!("offline mode; remote facts disabled");
        return offline_source();
    }
    match HttpFactProvider::new(&site.facts) {
        Ok(provider) => Arc::new(provider),
        Err(error) => {
            warn!(%error, "HTTP client unavailable; using fallback facts");
            offline_source()
        }
    }
}

fn visit_ledger(site: &LoadedSite, args: &PlayArgs) -> VisitLedger {
    let store: Arc<dyn StateStore> = if args.fresh {
        info!("fresh run; visit ledger ignored");
        Arc::new(MemoryStore::new())
    } else {
        let path = args
            .ledger
            .clone()
            .or_else(|| site.ledger.path.clone())
            .unwrap_or_else(default_ledger_path);
        debug!(path = %path.display(), "using ledger file");
        Arc::new(FileStore::new(path))
    };
    VisitLedger::with_key(store, site.ledger.key.clone())
}

/// Main content for the terminal: prints the configured banner.
struct Banner {
    text: String,
}

impl MainContent for Banner {
    fn mount(&self) {
        println!("{}", self.text);
    }
}

// ============================================================================
// Rendering
// ============================================================================

async fn render_screens(controller: Arc<PhaseController>) {
    let mut screens = controller.subscribe_screen();
    loop {
        let screen = *screens.borrow_and_update();
        match screen {
            Screen::Main => break,
            Screen::Idle => {}
            Screen::Narrative | Screen::Boot => {
                if let Some(active) = controller.active().filter(|a| a.screen == screen) {
                    render_sequence(active).await;
                }
            }
        }
        if screens.changed().await.is_err() {
            break;
        }
    }
}

async fn render_sequence(active: ActiveSequence) {
    let ActiveSequence {
        screen, mut frames, ..
    } = active;
    let mut last: Option<String> = None;

    loop {
        let (line, finished) = {
            let state = frames.borrow_and_update();
            (frame_line(&state), state.status.is_finished())
        };
        if let Some(line) = line.filter(|l| last.as_ref() != Some(l)) {
            println!("{screen:>9} {line}");
            last = Some(line);
        }
        if finished || frames.changed().await.is_err() {
            break;
        }
    }
}

/// Formats one printable line for `state`, or `None` while nothing is
/// visible.
#[must_use]
pub fn frame_line(state: &RunState) -> Option<String> {
    let body = match &state.view {
        StepView::Loading => "loading...".to_string(),
        StepView::Text { text, item, of } if state.visible => {
            if *of > 1 {
                format!("{text} ({}/{of})", item + 1)
            } else {
                text.clone()
            }
        }
        StepView::Input {
            prompt,
            placeholder,
            ..
        } => match placeholder {
            Some(placeholder) => format!("{prompt} [{placeholder}]"),
            None => prompt.clone(),
        },
        StepView::Terminal { text, subtitle } if state.visible => match subtitle {
            Some(subtitle) => format!("{text} | {subtitle}"),
            None => text.clone(),
        },
        _ => return None,
    };
    Some(format!("[{:>3.0}%] {body}", state.progress.percent()))
}

// ============================================================================
// Input
// ============================================================================

async fn read_commands(controller: Arc<PhaseController>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        let awaiting = controller
            .active()
            .is_some_and(|active| active.input.is_awaiting());

        if awaiting {
            if !controller.submit(line) {
                info!("a value is required to continue");
            }
        } else if matches!(line, "s" | "skip") && controller.skip() {
            info!("skip requested");
        }
    }
    debug!("stdin closed");
}

async fn skip_on_interrupt(controller: Arc<PhaseController>) {
    while tokio::signal::ctrl_c().await.is_ok() {
        if controller.skip() {
            info!("skip requested");
        } else {
            eprintln!("\ninterrupted");
            std::process::exit(ExitCode::INTERRUPTED);
        }
    }
}
