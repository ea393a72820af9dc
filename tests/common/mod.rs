//! Shared integration-test helpers: sequence builders, a stub fact source,
//! a counting main-content collaborator and a CLI runner.

#![allow(dead_code)]

use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use stagehand::config::schema::{Phase, SequenceConfig, Step, StepKind};
use stagehand::controller::MainContent;
use stagehand::facts::{FactBatch, FactSource};

// ============================================================================
// Fact source
// ============================================================================

/// Remote-looking fact source that returns `fact 1..=count` after `delay`.
#[derive(Debug, Default)]
pub struct StubFacts {
    delay: Duration,
    calls: AtomicUsize,
}

impl StubFacts {
    pub fn instant() -> Self {
        Self::default()
    }

    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FactSource for StubFacts {
    async fn fetch_facts(&self, count: usize) -> FactBatch {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        FactBatch::remote((1..=count).map(|i| format!("fact {i}")).collect())
    }
}

// ============================================================================
// Main content
// ============================================================================

#[derive(Debug, Default)]
pub struct CountingMain {
    mounts: AtomicUsize,
}

impl CountingMain {
    pub fn mounts(&self) -> usize {
        self.mounts.load(Ordering::SeqCst)
    }
}

impl MainContent for CountingMain {
    fn mount(&self) {
        self.mounts.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Sequences
// ============================================================================

pub fn step(id: &str, kind: StepKind, duration_ms: u64, transition_ms: u64) -> Step {
    Step {
        id: id.to_string(),
        kind,
        duration_ms,
        transition_ms,
        fade_in_ms: 0,
    }
}

pub fn terminal(text: &str, duration_ms: u64, transition_ms: u64) -> Step {
    step(
        "terminal",
        StepKind::Terminal {
            text: text.to_string(),
            subtitle: None,
        },
        duration_ms,
        transition_ms,
    )
}

/// Four fetched facts at 3500 + 500 ms, then a 1500 + 1000 ms terminal.
///
/// Natural run: 16000 ms of rotation, completion at 18500 ms.
pub fn fact_reel() -> Arc<SequenceConfig> {
    Arc::new(SequenceConfig {
        name: "reel".to_string(),
        skip_exit_ms: 800,
        phases: vec![
            Phase {
                id: "facts".to_string(),
                steps: vec![step(
                    "reel",
                    StepKind::FetchedText {
                        count: 4,
                        settle_ms: 0,
                    },
                    3500,
                    500,
                )],
            },
            Phase {
                id: "ending".to_string(),
                steps: vec![terminal("Welcome to my portfolio", 1500, 1000)],
            },
        ],
    })
}

/// One 100 ms static line, then a 50 + 50 ms terminal.
pub fn short_boot() -> Arc<SequenceConfig> {
    Arc::new(SequenceConfig {
        name: "boot".to_string(),
        skip_exit_ms: 20,
        phases: vec![Phase {
            id: "checks".to_string(),
            steps: vec![
                step(
                    "init",
                    StepKind::StaticText {
                        text: "System Init".to_string(),
                    },
                    100,
                    0,
                ),
                terminal("Ready!", 50, 50),
            ],
        }],
    })
}

// ============================================================================
// CLI
// ============================================================================

/// Runs the built binary with `args` and no stdin.
pub fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_stagehand"))
        .args(args)
        .env_remove("STAGEHAND_CONFIG")
        .env_remove("STAGEHAND_LEDGER")
        .env_remove("STAGEHAND_EVENTS_FILE")
        .stdin(Stdio::null())
        .output()
        .expect("failed to run stagehand")
}

/// Writes `contents` to `name` inside `dir` and returns the path as a string.
pub fn write_file(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("failed to write fixture");
    path.to_str().expect("non-UTF-8 temp path").to_string()
}
