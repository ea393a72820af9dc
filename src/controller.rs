//! Phase controller
//!
//! Top-level orchestration: `narrative → boot → main`. The narrative runs
//! only when the visit ledger has no record of a previous visit; its
//! completion records the visit. Exactly one screen is mounted at a time
//! and the current one is published through a `watch` channel.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::config::schema::SequenceConfig;
use crate::facts::FactSource;
use crate::ledger::VisitLedger;
use crate::observability::metrics;
use crate::observability::{Event, EventEmitter};
use crate::sequence::{InputGate, RunState, SequenceEngine, SkipChannel};

/// The collaborator that takes over once every sequence has completed.
pub trait MainContent: Send + Sync {
    /// Called once, when the main screen mounts.
    fn mount(&self);
}

/// The mounted screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    /// `run` has not been called.
    Idle,
    /// First-visit narrative sequence.
    Narrative,
    /// Boot sequence.
    Boot,
    /// Main content.
    Main,
}

impl Screen {
    /// Returns the label used in logs, events and metrics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Narrative => "narrative",
            Self::Boot => "boot",
            Self::Main => "main",
        }
    }
}

impl std::fmt::Display for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.name())
    }
}

/// Handles onto the sequence currently mounted.
#[derive(Debug, Clone)]
pub struct ActiveSequence {
    /// Which screen the sequence belongs to.
    pub screen: Screen,
    /// State updates from the engine.
    pub frames: watch::Receiver<RunState>,
    /// Skip handle.
    pub skip: SkipChannel,
    /// Input handle.
    pub input: InputGate,
}

/// Orchestrates the narrative, boot and main screens.
pub struct PhaseController {
    ledger: VisitLedger,
    narrative: Arc<SequenceConfig>,
    boot: Arc<SequenceConfig>,
    facts: Arc<dyn FactSource>,
    main: Arc<dyn MainContent>,
    events: Arc<EventEmitter>,
    screen: watch::Sender<Screen>,
    history: Mutex<Vec<Screen>>,
    active: Mutex<Option<ActiveSequence>>,
}

impl PhaseController {
    /// Creates a controller that discards events.
    #[must_use]
    pub fn new(
        ledger: VisitLedger,
        narrative: Arc<SequenceConfig>,
        boot: Arc<SequenceConfig>,
        facts: Arc<dyn FactSource>,
        main: Arc<dyn MainContent>,
    ) -> Self {
        let (screen, _) = watch::channel(Screen::Idle);
        Self {
            ledger,
            narrative,
            boot,
            facts,
            main,
            events: Arc::new(EventEmitter::noop()),
            screen,
            history: Mutex::new(Vec::new()),
            active: Mutex::new(None),
        }
    }

    /// Reports events to `events`.
    #[must_use]
    pub fn with_events(mut self, events: Arc<EventEmitter>) -> Self {
        self.events = events;
        self
    }

    /// Runs every screen in order and returns once main content is
    /// mounted. Calling `run` a second time does nothing.
    ///
    /// Dropping the returned future unmounts whichever sequence is active.
    pub async fn run(&self) {
        if *self.screen.borrow() != Screen::Idle {
            warn!("controller already ran; ignoring");
            return;
        }

        if self.ledger.has_visited() {
            info!(key = %self.ledger.key(), "returning visitor; narrative skipped");
        } else {
            self.play(Screen::Narrative, Arc::clone(&self.narrative))
                .await;
            if self.ledger.mark_visited() {
                self.events.emit(Event::VisitRecorded {
                    timestamp: Utc::now(),
                    key: self.ledger.key().to_string(),
                });
            }
        }

        self.play(Screen::Boot, Arc::clone(&self.boot)).await;

        self.mount(Screen::Main);
        self.main.mount();
    }

    async fn play(&self, screen: Screen, config: Arc<SequenceConfig>) {
        let (done_tx, done_rx) = oneshot::channel();
        let engine = SequenceEngine::with_events(
            config,
            Arc::clone(&self.facts),
            Arc::clone(&self.events),
            move || {
                let _ = done_tx.send(());
            },
        );

        self.set_active(Some(ActiveSequence {
            screen,
            frames: engine.subscribe(),
            skip: engine.skip_channel(),
            input: engine.input(),
        }));
        self.mount(screen);
        engine.start();

        if done_rx.await.is_err() {
            debug!(%screen, "sequence torn down before completing");
        }
        self.set_active(None);
    }

    fn mount(&self, screen: Screen) {
        self.screen.send_replace(screen);
        if let Ok(mut history) = self.history.lock() {
            history.push(screen);
        }
        info!(%screen, "screen mounted");
        self.events.emit(Event::ScreenMounted {
            timestamp: Utc::now(),
            screen: screen.name().to_string(),
        });
        metrics::record_screen_mount(screen.name());
    }

    fn set_active(&self, active: Option<ActiveSequence>) {
        if let Ok(mut slot) = self.active.lock() {
            *slot = active;
        }
    }

    /// Returns the mounted screen.
    #[must_use]
    pub fn screen(&self) -> Screen {
        *self.screen.borrow()
    }

    /// Subscribes to screen changes.
    #[must_use]
    pub fn subscribe_screen(&self) -> watch::Receiver<Screen> {
        self.screen.subscribe()
    }

    /// Returns every screen mounted so far, in order.
    #[must_use]
    pub fn history(&self) -> Vec<Screen> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    /// Returns handles onto the mounted sequence, if any.
    #[must_use]
    pub fn active(&self) -> Option<ActiveSequence> {
        self.active.lock().ok().and_then(|slot| slot.clone())
    }

    /// Skips the mounted sequence. Returns `false` if nothing was skipped.
    pub fn skip(&self) -> bool {
        self.active().is_some_and(|active| active.skip.skip())
    }

    /// Submits input to the mounted sequence.
    pub fn submit(&self, value: &str) -> bool {
        self.active().is_some_and(|active| active.input.submit(value))
    }
}

impl std::fmt::Debug for PhaseController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseController")
            .field("screen", &*self.screen.borrow())
            .field("narrative", &self.narrative.name)
            .field("boot", &self.boot.name)
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}
