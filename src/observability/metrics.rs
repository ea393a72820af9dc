//! Metrics collection.
//!
//! Prometheus-compatible metrics with label cardinality protection and
//! typed convenience functions for recording measurements.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::StagehandError;
use crate::facts::FactOrigin;
use crate::sequence::CompletionCause;
use crate::themes;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Label used for sequences that are not built-in themes.
const CUSTOM_LABEL: &str = "custom";

/// Step kinds accepted as labels.
const KNOWN_STEP_KINDS: [&str; 5] = [
    "static_text",
    "fetched_text",
    "input_gather",
    "quote_rotation",
    "terminal",
];

/// Sanitizes a sequence name for use as a metrics label.
///
/// Sequence names come from user configuration. Built-in theme names are
/// kept; anything else is bucketed as `"custom"`.
#[must_use]
pub fn sanitize_sequence_label(name: &str) -> &str {
    if themes::find_theme(name).is_some() {
        name
    } else {
        CUSTOM_LABEL
    }
}

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without
/// an HTTP endpoint.
///
/// # Errors
///
/// Returns `StagehandError::Io` if the recorder or HTTP listener
/// cannot be installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), StagehandError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| StagehandError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!("stagehand_steps_total", "Steps mounted, by kind");
    describe_counter!(
        "stagehand_fact_fetch_total",
        "Fact batches resolved, by origin"
    );
    describe_counter!("stagehand_skips_total", "Skips accepted, by sequence");
    describe_histogram!(
        "stagehand_sequence_duration_ms",
        "Time from start to completion in milliseconds"
    );
    describe_counter!("stagehand_screen_mounts_total", "Screens mounted, by screen");
}

/// Records a mounted step.
pub fn record_step(kind: &str) {
    let label = if KNOWN_STEP_KINDS.contains(&kind) {
        kind
    } else {
        "__unknown__"
    };
    counter!("stagehand_steps_total", "kind" => label.to_owned()).increment(1);
}

/// Records a resolved fact batch.
pub fn record_fact_batch(origin: FactOrigin) {
    counter!("stagehand_fact_fetch_total", "origin" => origin.label()).increment(1);
}

/// Records an accepted skip.
pub fn record_skip(sequence: &str) {
    let label = sanitize_sequence_label(sequence);
    counter!("stagehand_skips_total", "sequence" => label.to_owned()).increment(1);
}

/// Records how long a sequence ran before completing.
pub fn record_sequence_duration(sequence: &str, cause: CompletionCause, duration: Duration) {
    let label = sanitize_sequence_label(sequence);
    histogram!(
        "stagehand_sequence_duration_ms",
        "sequence" => label.to_owned(),
        "cause" => cause.to_string(),
    )
    .record(duration.as_secs_f64() * 1000.0);
}

/// Records a screen mount.
pub fn record_screen_mount(screen: &'static str) {
    counter!("stagehand_screen_mounts_total", "screen" => screen).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_theme_names_are_kept() {
        assert_eq!(sanitize_sequence_label("cinematic"), "cinematic");
        assert_eq!(sanitize_sequence_label("console"), "console");
    }

    #[test]
    fn user_names_are_bucketed() {
        assert_eq!(sanitize_sequence_label("my-intro"), CUSTOM_LABEL);
        assert_eq!(sanitize_sequence_label(&"x".repeat(10_000)), CUSTOM_LABEL);
    }

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_step("terminal");
        record_step("bogus");
        record_fact_batch(FactOrigin::Remote);
        record_skip("cinematic");
        record_sequence_duration("custom-seq", CompletionCause::Natural, Duration::from_secs(3));
        record_screen_mount("main");
    }
}
