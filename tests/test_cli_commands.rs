mod common;

use tempfile::TempDir;

use common::{run_cli, write_file};

const TINY_SITE: &str = r"
narrative:
  name: tiny-intro
  skip_exit_ms: 10
  phases:
    - id: facts
      steps:
        - id: reel
          kind: fetched_text
          count: 2
          duration_ms: 100
          transition_ms: 10
        - id: hello
          kind: terminal
          text: Hello there
          duration_ms: 100
          transition_ms: 50
boot:
  name: tiny-boot
  skip_exit_ms: 5
  phases:
    - id: checks
      steps:
        - id: init
          kind: static_text
          text: System Init
          duration_ms: 100
        - id: ready
          kind: terminal
          text: Ready!
          duration_ms: 100
          transition_ms: 20
main:
  banner: MAIN CONTENT
";

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ============================================================================
// play
// ============================================================================

#[test]
fn play_first_run_records_visit_and_second_run_skips_narrative() {
    let dir = TempDir::new().unwrap();
    let config = write_file(dir.path(), "site.yaml", TINY_SITE);
    let ledger = dir.path().join("state").join("ledger.json");
    let ledger_arg = ledger.to_str().unwrap();

    let first = run_cli(&["play", "--config", &config, "--ledger", ledger_arg, "--offline"]);
    assert!(first.status.success(), "first run failed: {}", stderr(&first));
    let out = stdout(&first);
    assert!(out.contains("narrative"), "narrative should play: {out}");
    assert!(out.contains("Hello there"), "terminal should render: {out}");
    assert!(out.contains("MAIN CONTENT"), "main should mount: {out}");

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&ledger).unwrap()).unwrap();
    assert_eq!(saved["stagehand.intro_seen"], "true");

    let second = run_cli(&["play", "--config", &config, "--ledger", ledger_arg, "--offline"]);
    assert!(second.status.success(), "second run failed: {}", stderr(&second));
    let out = stdout(&second);
    assert!(!out.contains("narrative"), "narrative must not replay: {out}");
    assert!(out.contains("boot"), "boot should play: {out}");
    assert!(out.contains("MAIN CONTENT"));
}

#[test]
fn play_fresh_leaves_ledger_untouched() {
    let dir = TempDir::new().unwrap();
    let config = write_file(dir.path(), "site.yaml", TINY_SITE);
    let ledger = dir.path().join("ledger.json");

    let output = run_cli(&[
        "play",
        "--config",
        &config,
        "--ledger",
        ledger.to_str().unwrap(),
        "--offline",
        "--fresh",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("narrative"));
    assert!(!ledger.exists(), "--fresh must not write the ledger");
}

#[test]
fn play_writes_event_stream() {
    let dir = TempDir::new().unwrap();
    let config = write_file(dir.path(), "site.yaml", TINY_SITE);
    let events = dir.path().join("events.jsonl");

    let output = run_cli(&[
        "play",
        "--config",
        &config,
        "--offline",
        "--fresh",
        "--events-file",
        events.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", stderr(&output));

    let raw = std::fs::read_to_string(&events).unwrap();
    let types: Vec<String> = raw
        .lines()
        .map(|l| {
            let event: serde_json::Value = serde_json::from_str(l).unwrap();
            event["type"].as_str().unwrap().to_string()
        })
        .collect();
    assert!(types.iter().any(|t| t == "FactsResolved"));
    assert!(types.iter().any(|t| t == "VisitRecorded"));
    assert_eq!(types.iter().filter(|t| *t == "ScreenMounted").count(), 3);
}

#[test]
fn play_unknown_theme_exits_with_config_error() {
    let output = run_cli(&["play", "--theme", "cinematc", "--offline", "--fresh"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(
        stderr(&output).contains("did you mean 'cinematic'"),
        "{}",
        stderr(&output)
    );
}

#[test]
fn play_missing_config_exits_with_config_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.yaml");
    let output = run_cli(&["play", "--config", missing.to_str().unwrap(), "--fresh"]);
    assert_eq!(output.status.code(), Some(2));
}

// ============================================================================
// validate
// ============================================================================

#[test]
fn validate_accepts_good_config() {
    let dir = TempDir::new().unwrap();
    let config = write_file(dir.path(), "site.yaml", TINY_SITE);
    let output = run_cli(&["validate", &config]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("ok:"));
}

#[test]
fn validate_rejects_bad_config_and_checks_every_file() {
    let dir = TempDir::new().unwrap();
    let bad = write_file(dir.path(), "bad.yaml", "boot:\n  theme: nope-nope-nope\n");
    let good = write_file(dir.path(), "good.yaml", TINY_SITE);

    let output = run_cli(&["validate", &bad, &good]);
    assert_eq!(output.status.code(), Some(2));
    let out = stdout(&output);
    assert!(out.contains("invalid:"), "{out}");
    assert!(out.contains("ok:"), "good file should still be checked: {out}");
}

#[test]
fn validate_strict_promotes_warnings() {
    let dir = TempDir::new().unwrap();
    let slow = TINY_SITE.replace("duration_ms: 100\n        - id: ready", "duration_ms: 61000\n        - id: ready");
    let config = write_file(dir.path(), "slow.yaml", &slow);

    let lenient = run_cli(&["validate", &config]);
    assert!(lenient.status.success(), "{}", stderr(&lenient));
    assert!(stdout(&lenient).contains("warning"));

    let strict = run_cli(&["validate", "--strict", &config]);
    assert_eq!(strict.status.code(), Some(2));
}

#[test]
fn validate_json_output() {
    let dir = TempDir::new().unwrap();
    let config = write_file(dir.path(), "site.yaml", TINY_SITE);
    let output = run_cli(&["validate", "--format", "json", &config]);
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(parsed["valid"], true);
    assert!(parsed["warnings"].as_array().unwrap().is_empty());
}

// ============================================================================
// themes / version / completions
// ============================================================================

#[test]
fn themes_lists_every_builtin() {
    let output = run_cli(&["themes"]);
    assert!(output.status.success());
    let out = stdout(&output);
    for name in ["cinematic", "greeting", "console"] {
        assert!(out.contains(name), "missing {name}: {out}");
    }
}

#[test]
fn themes_json_filtered_by_kind() {
    let output = run_cli(&["themes", "--kind", "boot", "--format", "json"]);
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let entries = parsed.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"], "console");
    assert_eq!(entries[0]["natural_budget_ms"], 1700);
}

#[test]
fn version_json() {
    let output = run_cli(&["version", "--format", "json"]);
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(parsed["name"], "stagehand");
    assert!(parsed["version"].as_str().unwrap().contains('.'));
}

#[test]
fn completions_bash_references_binary() {
    let output = run_cli(&["completions", "bash"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("stagehand"));
}

// ============================================================================
// usage
// ============================================================================

#[test]
fn unknown_flag_exits_with_usage_error() {
    let output = run_cli(&["play", "--no-such-flag"]);
    assert_eq!(output.status.code(), Some(64));
    assert!(stderr(&output).contains("--no-such-flag"), "{}", stderr(&output));
}

#[test]
fn help_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("play"));
}
