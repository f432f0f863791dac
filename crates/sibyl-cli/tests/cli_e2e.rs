//! End-to-end CLI tests using `assert_cmd`
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::tests_outside_test_module,
        reason = "Test allows"
    )
)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, from_str, json};
use sibyl_cache::{CacheEntry, CacheKey, ResponseCache};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Helper to get cargo binary or fail test
fn cargo_bin() -> Command {
    let mut command =
        Command::cargo_bin("sibyl").unwrap_or_else(|err| panic!("Binary not found: {err}"));
    command.env_remove("OPENAI_API_KEY").env("RUST_LOG", "off");
    command
}

/// Helper to create temp dir or fail test
fn temp_dir() -> TempDir {
    TempDir::new().unwrap_or_else(|err| panic!("Failed to create temp dir: {err}"))
}

/// Writes a config file carrying a dummy key so no command reaches for `~/.sibyl`.
fn write_config(dir: &Path) -> PathBuf {
    let path = dir.join("config.toml");
    fs::write(&path, "[api]\napi_key = \"test-key\"\n").expect("write config");
    path
}

fn write_prompts(dir: &Path) -> PathBuf {
    let path = dir.join("prompts.json");
    fs::write(
        &path,
        r#"{"u1": {"prompt": "A", "raw_text": "a\n"}, "u2": {"prompt": "B", "raw_text": "b\n"}}"#,
    )
    .expect("write prompts");
    path
}

#[test]
fn test_cli_help() {
    cargo_bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("prepare"));
}

#[test]
fn test_cli_invalid_command() {
    cargo_bin().arg("invalid-command-xyz").assert().failure();
}

#[test]
fn test_run_requires_paths() {
    cargo_bin()
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--data-path"));
}

#[test]
fn test_run_with_missing_prompt_file() {
    let temp = temp_dir();
    let config = write_config(temp.path());

    cargo_bin()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg("--data-path")
        .arg(temp.path().join("absent.json"))
        .arg("--save-path")
        .arg(temp.path().join("out.csv"))
        .arg("--cache-path")
        .arg(temp.path().join("cache.json"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to load prompts"));
}

#[test]
fn test_corrupt_cache_exit_code() {
    let temp = temp_dir();
    let config = write_config(temp.path());
    let prompts = write_prompts(temp.path());
    let cache = temp.path().join("cache.json");
    fs::write(&cache, "{\"truncated\": ").expect("write cache");

    cargo_bin()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg("--data-path")
        .arg(&prompts)
        .arg("--save-path")
        .arg(temp.path().join("out.csv"))
        .arg("--cache-path")
        .arg(&cache)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("cache.json"));

    // The damaged file is left untouched for inspection.
    assert_eq!(
        fs::read_to_string(&cache).expect("read cache"),
        "{\"truncated\": "
    );
}

#[test]
fn test_missing_api_key() {
    let temp = temp_dir();
    let config = temp.path().join("config.toml");
    fs::write(&config, "[generation]\nmax_tokens = 1\n").expect("write config");
    let prompts = write_prompts(temp.path());

    cargo_bin()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg("--data-path")
        .arg(&prompts)
        .arg("--save-path")
        .arg(temp.path().join("out.csv"))
        .arg("--cache-path")
        .arg(temp.path().join("cache.json"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
}

#[test]
fn test_run_fully_cached_needs_no_network() {
    let temp = temp_dir();
    let config = write_config(temp.path());
    let prompts = write_prompts(temp.path());
    let cache_path = temp.path().join("cache").join("cache.json");

    let mut cache = ResponseCache::open(&cache_path).expect("open cache");
    for (prompt, text) in [("A", "yes"), ("B", "no")] {
        cache
            .insert(
                CacheKey::from_prompt(prompt),
                CacheEntry::new(text, json!({ "choices": [{ "text": text }] })),
            )
            .expect("seed cache");
    }

    let output = temp.path().join("results").join("predictions.csv");
    cargo_bin()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg("--data-path")
        .arg(&prompts)
        .arg("--save-path")
        .arg(&output)
        .arg("--cache-path")
        .arg(&cache_path)
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(&output).expect("read predictions"),
        "\"user_id\",\"prompt\",\"prediction\"\n\"u1\",\"A\",\"yes\"\n\"u2\",\"B\",\"no\"\n"
    );
}

#[test]
fn test_prepare_end_to_end() {
    let temp = temp_dir();
    let history = temp.path().join("history.json");
    fs::write(
        &history,
        r#"{
            "u1": {"msg_data": [{"message": "third"}, {"message": "second"}, {"message": "first"}]},
            "u2": {"msg_data": [{"message": "only"}]}
        }"#,
    )
    .expect("write history");
    let templates = temp.path().join("templates.toml");
    fs::write(&templates, "[templates]\nstance = \"Messages:\\n{}Stance:\"\n")
        .expect("write templates");
    let output = temp.path().join("prepared").join("prompts.json");

    cargo_bin()
        .arg("prepare")
        .arg("--data-path")
        .arg(&history)
        .arg("--templates")
        .arg(&templates)
        .arg("--template")
        .arg("stance")
        .arg("--save-path")
        .arg(&output)
        .arg("--num-msg")
        .arg("2")
        .assert()
        .success();

    let prepared: Value = from_str(&fs::read_to_string(&output).expect("read prompts"))
        .expect("valid prompt json");
    assert_eq!(
        prepared,
        json!({
            "u1": {"raw_text": "second\nthird\n", "prompt": "Messages:\nsecond\nthird\nStance:"},
            "u2": {"raw_text": "only\n", "prompt": "Messages:\nonly\nStance:"}
        })
    );
}

#[test]
fn test_prepare_unknown_template() {
    let temp = temp_dir();
    let history = temp.path().join("history.json");
    fs::write(&history, r#"{"u1": {"msg_data": [{"message": "hi"}]}}"#).expect("write history");
    let templates = temp.path().join("templates.toml");
    fs::write(&templates, "[templates]\nstance = \"{}\"\n").expect("write templates");

    cargo_bin()
        .arg("prepare")
        .arg("--data-path")
        .arg(&history)
        .arg("--templates")
        .arg(&templates)
        .arg("--template")
        .arg("missing")
        .arg("--save-path")
        .arg(temp.path().join("prompts.json"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown template"));
}
