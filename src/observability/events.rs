//! Structured event stream.
//!
//! Discrete, typed events emitted while sequences play. Events are
//! serialized as newline-delimited JSON (JSONL) and carry a monotonically
//! increasing sequence number so consumers can order them.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::facts::FactOrigin;
use crate::sequence::CompletionCause;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during playback.
///
/// Each variant is tagged with `"type"` when serialized to JSON so consumers
/// can dispatch on the event kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A sequence engine has started its timer chain.
    SequenceStarted {
        /// When the engine started.
        timestamp: DateTime<Utc>,
        /// Engine instance id.
        run_id: String,
        /// Sequence name.
        sequence_name: String,
        /// Progress units in the sequence.
        total_units: usize,
    },

    /// A step was mounted.
    StepEntered {
        /// When the step mounted.
        timestamp: DateTime<Utc>,
        /// Engine instance id.
        run_id: String,
        /// Sequence name.
        sequence_name: String,
        /// Phase identifier.
        phase_id: String,
        /// Step identifier.
        step_id: String,
        /// Step kind (e.g. `"fetched_text"`).
        kind: String,
    },

    /// A fact batch was resolved for a fetched-text step.
    FactsResolved {
        /// When the batch arrived.
        timestamp: DateTime<Utc>,
        /// Engine instance id.
        run_id: String,
        /// Facts requested.
        requested: usize,
        /// Facts received.
        received: usize,
        /// Where the batch came from.
        origin: FactOrigin,
    },

    /// An input step accepted a value.
    InputAccepted {
        /// When the value was accepted.
        timestamp: DateTime<Utc>,
        /// Engine instance id.
        run_id: String,
        /// Template variable the value was stored under.
        field: String,
    },

    /// A skip took effect.
    SkipRequested {
        /// When the skip was accepted.
        timestamp: DateTime<Utc>,
        /// Engine instance id.
        run_id: String,
        /// Sequence name.
        sequence_name: String,
        /// Phase that was showing.
        phase_id: String,
        /// Step that was showing.
        step_id: String,
    },

    /// A sequence invoked its completion callback.
    SequenceCompleted {
        /// When the callback ran.
        timestamp: DateTime<Utc>,
        /// Engine instance id.
        run_id: String,
        /// Sequence name.
        sequence_name: String,
        /// Natural or skipped.
        cause: CompletionCause,
        /// Time from start to completion in milliseconds.
        elapsed_ms: u64,
    },

    /// The phase controller mounted a screen.
    ScreenMounted {
        /// When the screen mounted.
        timestamp: DateTime<Utc>,
        /// Screen name (e.g. `"boot"`).
        screen: String,
    },

    /// The visit ledger recorded a first visit.
    VisitRecorded {
        /// When the flag was written.
        timestamp: DateTime<Utc>,
        /// Ledger key.
        key: String,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

/// Wraps an [`Event`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    /// Zero-based, monotonically increasing sequence counter.
    sequence: u64,
    /// The wrapped event (flattened into the same JSON object).
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each call to [`emit`](Self::emit) atomically increments the sequence
/// counter, serializes the event as a single JSON line, and flushes the
/// underlying writer. Serialization or I/O failures are dropped so that a
/// broken event sink never interrupts playback.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

// Box<dyn Write> is not Debug.
impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stderr.
    ///
    /// Stdout is reserved for the rendered frames.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates an emitter that discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or opened.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    ///
    /// The sequence number is taken under the writer lock, so lines always
    /// appear in sequence order.
    pub fn emit(&self, event: Event) {
        let Ok(mut w) = self.writer.lock() else {
            return;
        };
        let envelope = EventEnvelope {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            event,
        };

        if let Ok(line) = serde_json::to_string(&envelope) {
            let _ = writeln!(w, "{line}");
            let _ = w.flush();
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}
