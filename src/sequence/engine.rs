//! Sequence engine
//!
//! The `SequenceEngine` runs one [`SequenceConfig`] as a chain of timed
//! steps on a spawned driver task, publishing every state change through a
//! `watch` channel. A skip or unmount bumps the generation stored inside the
//! run state, cancels the driver, and aborts every tracked timer; any
//! callback that still runs fails its generation check before it can
//! mutate anything.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use chrono::Utc;
use rand::seq::SliceRandom;
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::schema::{SequenceConfig, Step, StepKind};
use crate::facts::FactSource;
use crate::observability::metrics;
use crate::observability::{Event, EventEmitter};

use super::input::InputGate;
use super::skip::SkipChannel;
use super::state::{CompletionCause, RunState, RunStatus, StepView};
use super::template;
use super::timer::TimerSet;

/// Callback invoked once when a sequence completes.
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// The driver lost its generation (skip or unmount) and must stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Interrupted;

type Flow = Result<(), Interrupted>;

/// State shared between the engine handle, its tasks, and the skip and
/// input handles.
pub(crate) struct Shared {
    config: Arc<SequenceConfig>,
    facts: Arc<dyn FactSource>,
    state: watch::Sender<RunState>,
    cancel: CancellationToken,
    timers: TimerSet,
    completion: Mutex<Option<CompletionCallback>>,
    variables: Mutex<BTreeMap<String, String>>,
    pending_input: Mutex<Option<oneshot::Sender<String>>>,
    events: Arc<EventEmitter>,
    run_id: String,
    started_at: OnceLock<Instant>,
}

impl Shared {
    // ------------------------------------------------------------------
    // Generation-checked state access
    // ------------------------------------------------------------------

    fn update(&self, generation: u64, f: impl FnOnce(&mut RunState)) -> Flow {
        let mut applied = false;
        self.state.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            f(state);
            applied = true;
            true
        });
        if applied { Ok(()) } else { Err(Interrupted) }
    }

    fn check(&self, generation: u64) -> Flow {
        if self.state.borrow().generation == generation {
            Ok(())
        } else {
            Err(Interrupted)
        }
    }

    async fn pause(&self, generation: u64, ms: u64) -> Flow {
        if ms > 0 {
            tokio::select! {
                () = self.cancel.cancelled() => return Err(Interrupted),
                () = tokio::time::sleep(Duration::from_millis(ms)) => {}
            }
        }
        self.check(generation)
    }

    pub(crate) fn snapshot(&self) -> RunState {
        self.state.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    fn render(&self, text: &str) -> String {
        self.variables.lock().map_or_else(
            |_| template::render(text, &BTreeMap::new()),
            |vars| template::render(text, &vars),
        )
    }

    fn elapsed(&self) -> Duration {
        self.started_at
            .get()
            .map_or(Duration::ZERO, Instant::elapsed)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    fn start(self: &Arc<Self>) -> bool {
        let mut generation = None;
        self.state.send_if_modified(|state| {
            if state.status != RunStatus::Pending {
                return false;
            }
            state.status = RunStatus::Running;
            generation = Some(state.generation);
            true
        });
        let Some(generation) = generation else {
            debug!(run_id = %self.run_id, "start ignored; engine already started");
            return false;
        };

        let _ = self.started_at.set(Instant::now());
        let total_units = self.state.borrow().progress.total;
        info!(
            run_id = %self.run_id,
            sequence = %self.config.name,
            total_units,
            "sequence started"
        );
        self.events.emit(Event::SequenceStarted {
            timestamp: Utc::now(),
            run_id: self.run_id.clone(),
            sequence_name: self.config.name.clone(),
            total_units,
        });

        let shared = Arc::clone(self);
        self.timers.spawn(async move {
            if shared.run_steps(generation).await.is_err() {
                debug!(run_id = %shared.run_id, "driver interrupted");
            }
        });
        true
    }

    /// Jumps to the terminal view and schedules completion.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub(crate) fn skip(self: &Arc<Self>) -> bool {
        let terminal = self.config.terminal().map(|(pi, si, step)| {
            let phase_id = self.config.phases[pi].id.clone();
            (pi, phase_id, si, step.id.clone(), self.terminal_view(&step.kind))
        });

        let mut accepted = None;
        self.state.send_if_modified(|state| {
            if state.cancelled || !matches!(state.status, RunStatus::Pending | RunStatus::Running)
            {
                return false;
            }
            let from = (state.phase_id.clone(), state.step_id.clone());
            state.generation += 1;
            state.cancelled = true;
            state.status = RunStatus::Exiting;
            if let Some((pi, phase_id, si, step_id, view)) = terminal {
                state.phase_index = pi;
                state.phase_id = phase_id;
                state.step_index = si;
                state.step_id = step_id;
                state.view = view;
            }
            state.item_index = 0;
            state.visible = true;
            state.progress.finish();
            accepted = Some((state.generation, from));
            true
        });

        let Some((generation, (phase_id, step_id))) = accepted else {
            debug!(run_id = %self.run_id, "skip ignored");
            return false;
        };

        self.cancel.cancel();
        self.timers.clear();
        self.drop_pending_input();
        let _ = self.started_at.set(Instant::now());

        info!(
            run_id = %self.run_id,
            sequence = %self.config.name,
            phase = %phase_id,
            step = %step_id,
            "skip requested"
        );
        self.events.emit(Event::SkipRequested {
            timestamp: Utc::now(),
            run_id: self.run_id.clone(),
            sequence_name: self.config.name.clone(),
            phase_id,
            step_id,
        });
        metrics::record_skip(&self.config.name);

        let shared = Arc::clone(self);
        self.timers.schedule(
            Duration::from_millis(self.config.skip_exit_ms),
            async move { shared.complete(generation, CompletionCause::Skipped) },
        );
        true
    }

    pub(crate) fn unmount(&self) {
        let changed = self.state.send_if_modified(|state| {
            if state.status == RunStatus::Unmounted {
                return false;
            }
            state.generation += 1;
            state.status = RunStatus::Unmounted;
            state.visible = false;
            true
        });
        self.cancel.cancel();
        self.timers.clear();
        self.drop_pending_input();
        if changed {
            debug!(run_id = %self.run_id, sequence = %self.config.name, "sequence unmounted");
        }
    }

    fn complete(&self, generation: u64, cause: CompletionCause) {
        let finished = self.state.send_if_modified(|state| {
            if state.generation != generation || state.status.is_finished() {
                return false;
            }
            state.status = RunStatus::Completed;
            state.visible = false;
            true
        });
        if !finished {
            return;
        }

        let callback = self.completion.lock().ok().and_then(|mut slot| slot.take());
        let elapsed = self.elapsed();
        info!(
            run_id = %self.run_id,
            sequence = %self.config.name,
            %cause,
            elapsed = ?elapsed,
            "sequence completed"
        );
        self.events.emit(Event::SequenceCompleted {
            timestamp: Utc::now(),
            run_id: self.run_id.clone(),
            sequence_name: self.config.name.clone(),
            cause,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        });
        metrics::record_sequence_duration(&self.config.name, cause, elapsed);

        if let Some(callback) = callback {
            callback();
        }
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    fn drop_pending_input(&self) {
        if let Ok(mut pending) = self.pending_input.lock() {
            pending.take();
        }
    }

    pub(crate) fn take_pending_input(&self) -> Option<oneshot::Sender<String>> {
        self.pending_input.lock().ok().and_then(|mut p| p.take())
    }

    pub(crate) fn has_pending_input(&self) -> bool {
        self.pending_input
            .lock()
            .is_ok_and(|p| p.as_ref().is_some_and(|tx| !tx.is_closed()))
    }

    pub(crate) fn set_draft(&self, draft: &str, submit_enabled: bool) {
        self.state.send_if_modified(|state| {
            if state.status != RunStatus::Running {
                return false;
            }
            match &mut state.view {
                StepView::Input {
                    draft: current,
                    submit_enabled: enabled,
                    ..
                } => {
                    *current = draft.to_string();
                    *enabled = submit_enabled;
                    true
                }
                _ => false,
            }
        });
    }

    pub(crate) fn variables(&self) -> BTreeMap<String, String> {
        self.variables
            .lock()
            .map(|vars| vars.clone())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Driver
    // ------------------------------------------------------------------

    async fn run_steps(&self, generation: u64) -> Flow {
        let config = Arc::clone(&self.config);
        for (pi, phase) in config.phases.iter().enumerate() {
            for (si, step) in phase.steps.iter().enumerate() {
                self.enter_step(generation, pi, &phase.id, si, step)?;
                match &step.kind {
                    StepKind::StaticText { text } => {
                        let items = vec![self.render(text)];
                        self.show_items(generation, step, items).await?;
                    }
                    StepKind::FetchedText { count, settle_ms } => {
                        self.run_fetched(generation, step, *count, *settle_ms)
                            .await?;
                    }
                    StepKind::InputGather {
                        prompt,
                        field,
                        placeholder,
                    } => {
                        let view = StepView::Input {
                            prompt: self.render(prompt),
                            placeholder: placeholder.clone(),
                            draft: String::new(),
                            submit_enabled: false,
                        };
                        self.gather_input(generation, step, field, view).await?;
                    }
                    StepKind::QuoteRotation { quotes, shuffle } => {
                        let mut items: Vec<String> =
                            quotes.iter().map(|q| self.render(q)).collect();
                        if *shuffle {
                            shuffle_items(&mut items);
                        }
                        self.show_items(generation, step, items).await?;
                    }
                    StepKind::Terminal { .. } => {
                        return self.run_terminal(generation, step).await;
                    }
                }
            }
        }

        // Sequences built without a terminal step still complete.
        self.update(generation, |state| state.progress.finish())?;
        self.complete(generation, CompletionCause::Natural);
        Ok(())
    }

    fn enter_step(
        &self,
        generation: u64,
        phase_index: usize,
        phase_id: &str,
        step_index: usize,
        step: &Step,
    ) -> Flow {
        self.update(generation, |state| {
            state.phase_index = phase_index;
            state.phase_id = phase_id.to_string();
            state.step_index = step_index;
            state.step_id = step.id.clone();
            state.item_index = 0;
            state.visible = false;
        })?;

        let kind = step.kind.name();
        debug!(
            run_id = %self.run_id,
            phase = %phase_id,
            step = %step.id,
            kind,
            "step entered"
        );
        self.events.emit(Event::StepEntered {
            timestamp: Utc::now(),
            run_id: self.run_id.clone(),
            sequence_name: self.config.name.clone(),
            phase_id: phase_id.to_string(),
            step_id: step.id.clone(),
            kind: kind.to_string(),
        });
        metrics::record_step(kind);
        Ok(())
    }

    /// Fade in, hold, fade out, wait for the transition.
    async fn hold(&self, generation: u64, step: &Step) -> Flow {
        let fade_in = step.fade_in_ms.min(step.duration_ms);
        self.pause(generation, fade_in).await?;
        self.update(generation, |state| state.visible = true)?;
        self.pause(generation, step.duration_ms - fade_in).await?;
        self.update(generation, |state| state.visible = false)?;
        self.pause(generation, step.transition_ms).await
    }

    async fn show_items(&self, generation: u64, step: &Step, items: Vec<String>) -> Flow {
        let of = items.len();
        for (item, text) in items.into_iter().enumerate() {
            self.update(generation, |state| {
                state.item_index = item;
                state.view = StepView::Text { text, item, of };
                state.visible = false;
            })?;
            self.hold(generation, step).await?;
            self.update(generation, |state| state.progress.advance(1))?;
        }
        Ok(())
    }

    async fn run_fetched(
        &self,
        generation: u64,
        step: &Step,
        count: usize,
        settle_ms: u64,
    ) -> Flow {
        self.update(generation, |state| {
            state.view = StepView::Loading;
            state.visible = true;
        })?;

        let batch = tokio::select! {
            () = self.cancel.cancelled() => return Err(Interrupted),
            batch = self.facts.fetch_facts(count) => batch,
        };
        self.check(generation)?;

        debug!(
            run_id = %self.run_id,
            requested = count,
            received = batch.len(),
            origin = %batch.origin(),
            "facts resolved"
        );
        self.events.emit(Event::FactsResolved {
            timestamp: Utc::now(),
            run_id: self.run_id.clone(),
            requested: count,
            received: batch.len(),
            origin: batch.origin(),
        });

        self.pause(generation, settle_ms).await?;

        let shortfall = count.saturating_sub(batch.len());
        if shortfall > 0 {
            self.update(generation, |state| state.progress.advance(shortfall))?;
        }
        self.show_items(generation, step, batch.into_facts()).await
    }

    async fn gather_input(
        &self,
        generation: u64,
        step: &Step,
        field: &str,
        view: StepView,
    ) -> Flow {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut pending) = self.pending_input.lock() {
            *pending = Some(tx);
        }
        self.update(generation, |state| {
            state.view = view;
            state.visible = false;
        })?;
        self.pause(generation, step.fade_in_ms).await?;
        self.update(generation, |state| state.visible = true)?;

        let value = tokio::select! {
            () = self.cancel.cancelled() => return Err(Interrupted),
            value = rx => value.map_err(|_| Interrupted)?,
        };
        self.check(generation)?;

        if let Ok(mut vars) = self.variables.lock() {
            vars.insert(field.to_string(), value);
        }
        debug!(run_id = %self.run_id, field, "input accepted");
        self.events.emit(Event::InputAccepted {
            timestamp: Utc::now(),
            run_id: self.run_id.clone(),
            field: field.to_string(),
        });

        self.update(generation, |state| state.visible = false)?;
        self.pause(generation, step.transition_ms).await?;
        self.update(generation, |state| state.progress.advance(1))
    }

    async fn run_terminal(&self, generation: u64, step: &Step) -> Flow {
        let view = self.terminal_view(&step.kind);
        self.update(generation, |state| {
            state.view = view;
            state.visible = false;
            state.progress.finish();
        })?;

        let fade_in = step.fade_in_ms.min(step.duration_ms);
        self.pause(generation, fade_in).await?;
        self.update(generation, |state| state.visible = true)?;
        self.pause(generation, step.duration_ms - fade_in).await?;

        self.update(generation, |state| {
            state.status = RunStatus::Exiting;
            state.visible = false;
        })?;
        self.pause(generation, step.transition_ms).await?;
        self.complete(generation, CompletionCause::Natural);
        Ok(())
    }

    fn terminal_view(&self, kind: &StepKind) -> StepView {
        match kind {
            StepKind::Terminal { text, subtitle } => StepView::Terminal {
                text: self.render(text),
                subtitle: subtitle.as_deref().map(|s| self.render(s)),
            },
            _ => StepView::Pending,
        }
    }
}

fn shuffle_items(items: &mut [String]) {
    items.shuffle(&mut rand::rng());
}

/// Handle to one running sequence.
///
/// Dropping the handle unmounts the sequence: the driver and every pending
/// timer are cancelled and the completion callback will not run.
pub struct SequenceEngine {
    shared: Arc<Shared>,
}

impl SequenceEngine {
    /// Creates an engine that discards events.
    #[must_use]
    pub fn new(
        config: Arc<SequenceConfig>,
        facts: Arc<dyn FactSource>,
        on_complete: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self::with_events(config, facts, Arc::new(EventEmitter::noop()), on_complete)
    }

    /// Creates an engine that reports to `events`.
    #[must_use]
    pub fn with_events(
        config: Arc<SequenceConfig>,
        facts: Arc<dyn FactSource>,
        events: Arc<EventEmitter>,
        on_complete: impl FnOnce() + Send + 'static,
    ) -> Self {
        let (state, _) = watch::channel(RunState::new(config.total_units()));
        let shared = Shared {
            config,
            facts,
            state,
            cancel: CancellationToken::new(),
            timers: TimerSet::new(),
            completion: Mutex::new(Some(Box::new(on_complete))),
            variables: Mutex::new(BTreeMap::new()),
            pending_input: Mutex::new(None),
            events,
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: OnceLock::new(),
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Returns the sequence this engine runs.
    #[must_use]
    pub fn config(&self) -> &SequenceConfig {
        &self.shared.config
    }

    /// Returns this instance's id, as used in events.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.shared.run_id
    }

    /// Starts the timer chain. Returns `false` if already started, skipped,
    /// or unmounted.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self) -> bool {
        self.shared.start()
    }

    /// Skips to the terminal step. See [`SkipChannel::skip`].
    pub fn skip(&self) -> bool {
        self.shared.skip()
    }

    /// Returns a cloneable skip handle.
    #[must_use]
    pub fn skip_channel(&self) -> SkipChannel {
        SkipChannel::new(&self.shared)
    }

    /// Returns a cloneable input handle.
    #[must_use]
    pub fn input(&self) -> InputGate {
        InputGate::new(&self.shared)
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.shared.subscribe()
    }

    /// Returns the current state.
    #[must_use]
    pub fn snapshot(&self) -> RunState {
        self.shared.snapshot()
    }

    /// Returns the template variables gathered so far.
    #[must_use]
    pub fn variables(&self) -> BTreeMap<String, String> {
        self.shared.variables()
    }

    /// Number of driver and timer tasks still outstanding.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.shared.timers.pending()
    }

    /// Tears the sequence down. Idempotent.
    pub fn unmount(&self) {
        self.shared.unmount();
    }

    /// Waits until the sequence has completed or been unmounted.
    pub async fn finished(&self) -> RunStatus {
        let mut rx = self.subscribe();
        rx.wait_for(|state| state.status.is_finished())
            .await
            .map_or(RunStatus::Unmounted, |state| state.status)
    }
}

impl Drop for SequenceEngine {
    fn drop(&mut self) {
        self.shared.unmount();
    }
}

impl std::fmt::Debug for SequenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceEngine")
            .field("run_id", &self.shared.run_id)
            .field("sequence", &self.shared.config.name)
            .field("status", &self.shared.state.borrow().status)
            .finish_non_exhaustive()
    }
}
