//! Reopening, round-trip and corruption tests for `ResponseCache`.

#![cfg_attr(
    test,
    allow(
        clippy::tests_outside_test_module,
        clippy::expect_used,
        clippy::missing_panics_doc,
        reason = "Test file allows"
    )
)]

use serde_json::json;
use sibyl_cache::{CacheEntry, CacheKey, ResponseCache};
use sibyl_core::Error;
use std::fs;
use tempfile::TempDir;

fn temp_dir() -> TempDir {
    TempDir::new().unwrap_or_else(|err| panic!("Failed to create temp dir: {err}"))
}

#[test]
fn test_reopen_reconstructs_entries() {
    let temp = temp_dir();
    let path = temp.path().join("cache").join("cache.json");

    let prompts = ["A", "B", "a prompt with\nnewlines and \"quotes\"", "ünïcödé"];
    {
        let mut cache = ResponseCache::open(&path).expect("open empty cache");
        for (index, prompt) in prompts.iter().enumerate() {
            let raw = json!({
                "id": format!("cmpl-{index}"),
                "choices": [{ "text": format!("  answer {index} "), "index": 0 }],
                "usage": { "prompt_tokens": index, "completion_tokens": 1 }
            });
            cache
                .insert(
                    CacheKey::from_prompt(prompt),
                    CacheEntry::new(format!("answer {index}"), raw),
                )
                .expect("insert entry");
        }
    }

    let reopened = ResponseCache::open(&path).expect("reopen cache");
    assert_eq!(reopened.len(), prompts.len());
    for (index, prompt) in prompts.iter().enumerate() {
        let entry = reopened
            .lookup(&CacheKey::from_prompt(prompt))
            .expect("entry survives reopen");
        assert_eq!(entry.text, format!("answer {index}"));
        assert_eq!(entry.raw["id"], json!(format!("cmpl-{index}")));
        assert_eq!(entry.raw["usage"]["prompt_tokens"], json!(index));
    }
}

#[test]
fn test_truncated_file_is_reported_as_corrupt() {
    let temp = temp_dir();
    let path = temp.path().join("cache.json");

    {
        let mut cache = ResponseCache::open(&path).expect("open empty cache");
        cache
            .insert(
                CacheKey::from_prompt("A"),
                CacheEntry::new("yes", json!({ "choices": [{ "text": "yes" }] })),
            )
            .expect("insert entry");
    }

    let contents = fs::read(&path).expect("read cache file");
    fs::write(&path, &contents[..contents.len() / 2]).expect("truncate cache file");

    let result = ResponseCache::open(&path);
    match result {
        Err(Error::CorruptCache { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected CorruptCache, got {other:?}"),
    }
}

#[test]
fn test_empty_file_is_not_treated_as_empty_cache() {
    let temp = temp_dir();
    let path = temp.path().join("cache.json");
    fs::write(&path, b"").expect("write empty file");

    let result = ResponseCache::open(&path);
    assert!(matches!(result, Err(Error::CorruptCache { .. })));
}

#[test]
fn test_no_temporary_files_left_behind() {
    let temp = temp_dir();
    let path = temp.path().join("cache.json");

    let mut cache = ResponseCache::open(&path).expect("open empty cache");
    for prompt in ["A", "B", "C"] {
        cache
            .insert(
                CacheKey::from_prompt(prompt),
                CacheEntry::new(prompt, json!({})),
            )
            .expect("insert entry");
    }

    let files: Vec<_> = fs::read_dir(temp.path())
        .expect("list cache dir")
        .filter_map(|entry| entry.ok().map(|dir_entry| dir_entry.file_name()))
        .collect();
    assert_eq!(files, vec![path.file_name().expect("file name").to_owned()]);
}

#[test]
fn test_same_prompt_shares_entry_across_users() {
    let temp = temp_dir();
    let mut cache = ResponseCache::open(temp.path().join("cache.json")).expect("open cache");

    cache
        .insert(
            CacheKey::from_prompt("shared prompt"),
            CacheEntry::new("yes", json!({})),
        )
        .expect("insert entry");

    // A second user with the same prompt text resolves to the same key.
    let entry = cache.lookup(&CacheKey::from_prompt("shared prompt"));
    assert_eq!(entry.map(|found| found.text.as_str()), Some("yes"));
}
