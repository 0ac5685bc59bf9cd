//! End-to-end tests driving the `plq` binary against a temp index.
//!
//! Uses the deterministic hash embedder so no network or API keys are
//! needed.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn plq_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("plq");
    path
}

const FEED_JSON: &str = r#"[
  {
    "ref": "2458/24",
    "location": "12 Griffith Avenue, Dublin 9",
    "proposal": "Construction of a two storey four bedroom dwelling with vehicular entrance and landscaping",
    "app_type": "Permission",
    "app_status": "APPLICATION FINALISED",
    "decision": "GRANT PERMISSION",
    "reg_date": "2024-06-02",
    "dec_date": "2025-01-10"
  },
  {
    "ref": "3001/24",
    "location": "45 Rathmines Road Lower, Dublin 6",
    "proposal": "Demolition of existing warehouse structures and construction of 24 no. apartments in two blocks",
    "app_type": "Permission",
    "app_status": "APPEALED",
    "decision": "REFUSE PERMISSION",
    "reg_date": "2024-03-15",
    "appeal_ref": "ABP-318822",
    "appeal_status": "Appeal Decided",
    "appeal_decision": "Refused",
    "appeal_decision_date": "2025-02-20",
    "num_units": "24"
  },
  {
    "ref": "3120/24",
    "location": "Unit 7, Ballymount Industrial Estate, Dublin 12",
    "proposal": "Extension to existing warehouse and factory premises including new loading bay",
    "app_type": "Permission",
    "app_status": "DECISION MADE",
    "decision": "GRANT PERMISSION",
    "reg_date": "2024-09-01"
  },
  {
    "ref": "3200/24",
    "location": "",
    "proposal": "short",
    "app_status": "NEW APPLICATION"
  }
]"#;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    fs::write(root.join("feed.json"), FEED_JSON).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/planquery.sqlite"

[retrieval]
top_k = 5

[embedding]
provider = "hash"
dims = 128
"#,
        root.display()
    );

    let config_path = config_dir.join("planquery.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_plq(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = plq_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run plq binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn feed_path(config_path: &Path) -> String {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("feed.json")
        .display()
        .to_string()
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_plq(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_plq(&config_path, &["init"]);
    let (_, _, success2) = run_plq(&config_path, &["init"]);
    assert!(success1);
    assert!(success2);
}

#[test]
fn test_search_before_build_fails_cleanly() {
    let (_tmp, config_path) = setup_test_env();
    run_plq(&config_path, &["init"]);

    let (stdout, stderr, success) = run_plq(&config_path, &["search", "dwelling"]);
    assert!(!success, "expected failure, got stdout={}", stdout);
    assert!(stderr.contains("empty"), "stderr was: {}", stderr);
}

#[test]
fn test_build_indexes_feed_and_skips_bad_records() {
    let (_tmp, config_path) = setup_test_env();
    run_plq(&config_path, &["init"]);

    let feed = feed_path(&config_path);
    let (stdout, stderr, success) = run_plq(&config_path, &["build", &feed]);
    assert!(success, "build failed: stdout={}, stderr={}", stdout, stderr);
    // 3 usable records; the short/ref-less one is skipped
    assert!(stdout.contains("Skipped 1"), "stdout was: {}", stdout);
    assert!(stdout.contains("Index built"), "stdout was: {}", stdout);
}

#[test]
fn test_search_finds_relevant_record() {
    let (_tmp, config_path) = setup_test_env();
    run_plq(&config_path, &["init"]);
    let feed = feed_path(&config_path);
    run_plq(&config_path, &["build", &feed]);

    let (stdout, _, success) = run_plq(
        &config_path,
        &["search", "two storey dwelling Griffith Avenue"],
    );
    assert!(success);
    // The Griffith Avenue application should be the top result
    let first_hit = stdout.find("2458/24").unwrap_or(usize::MAX);
    let other_hit = stdout.find("3120/24").unwrap_or(usize::MAX);
    assert!(first_hit < other_hit, "stdout was: {}", stdout);
}

#[test]
fn test_search_category_filter_never_leaks() {
    let (_tmp, config_path) = setup_test_env();
    run_plq(&config_path, &["init"]);
    let feed = feed_path(&config_path);
    run_plq(&config_path, &["build", &feed]);

    let (stdout, _, success) = run_plq(
        &config_path,
        &["search", "construction", "--category", "demolition"],
    );
    assert!(success);
    assert!(stdout.contains("3001/24"), "stdout was: {}", stdout);
    assert!(!stdout.contains("2458/24"), "stdout was: {}", stdout);
    assert!(!stdout.contains("3120/24"), "stdout was: {}", stdout);
}

#[test]
fn test_search_filter_matching_nothing_prints_no_results() {
    let (_tmp, config_path) = setup_test_env();
    run_plq(&config_path, &["init"]);
    let feed = feed_path(&config_path);
    run_plq(&config_path, &["build", &feed]);

    let (stdout, _, success) = run_plq(
        &config_path,
        &["search", "anything", "--category", "education"],
    );
    assert!(success);
    assert!(stdout.contains("No results."), "stdout was: {}", stdout);
}

#[test]
fn test_search_appeals_only() {
    let (_tmp, config_path) = setup_test_env();
    run_plq(&config_path, &["init"]);
    let feed = feed_path(&config_path);
    run_plq(&config_path, &["build", &feed]);

    let (stdout, _, success) = run_plq(&config_path, &["search", "apartments", "--appeals-only"]);
    assert!(success);
    assert!(stdout.contains("3001/24"), "stdout was: {}", stdout);
    assert!(!stdout.contains("2458/24"), "stdout was: {}", stdout);
}

#[test]
fn test_search_rejects_unknown_role() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_plq(&config_path, &["search", "x", "--role", "wizard"]);
    assert!(!success);
    assert!(stderr.contains("role") || stderr.contains("wizard"), "stderr was: {}", stderr);
}

#[test]
fn test_ask_with_generation_disabled_prints_context() {
    let (_tmp, config_path) = setup_test_env();
    run_plq(&config_path, &["init"]);
    let feed = feed_path(&config_path);
    run_plq(&config_path, &["build", &feed]);

    let (stdout, _, success) = run_plq(
        &config_path,
        &["ask", "What happened at Rathmines Road?", "--role", "solicitor"],
    );
    assert!(success, "ask failed: stdout={}", stdout);
    assert!(stdout.contains("Generation is disabled"), "stdout was: {}", stdout);
    assert!(stdout.contains("3001/24"), "stdout was: {}", stdout);
}

#[test]
fn test_build_is_repeatable_with_stable_chunk_ids() {
    let (_tmp, config_path) = setup_test_env();
    run_plq(&config_path, &["init"]);
    let feed = feed_path(&config_path);

    let (_, _, success1) = run_plq(&config_path, &["build", &feed]);
    let (_, _, success2) = run_plq(&config_path, &["build", &feed]);
    assert!(success1);
    assert!(success2);

    // Chunk ids are {ref}-{index}, so the rebuilt index exposes the
    // same ids and the same counts.
    let (stdout, _, success) = run_plq(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Records:     3"), "stdout was: {}", stdout);
}

#[test]
fn test_stats_reports_breakdowns() {
    let (_tmp, config_path) = setup_test_env();
    run_plq(&config_path, &["init"]);
    let feed = feed_path(&config_path);
    run_plq(&config_path, &["build", &feed]);

    let (stdout, _, success) = run_plq(&config_path, &["stats"]);
    assert!(success, "stats failed: stdout={}", stdout);
    assert!(stdout.contains("hash-v2"), "stdout was: {}", stdout);
    assert!(stdout.contains("By category:"), "stdout was: {}", stdout);
    assert!(stdout.contains("demolition"), "stdout was: {}", stdout);
    assert!(stdout.contains("residential"), "stdout was: {}", stdout);
    assert!(stdout.contains("By decision:"), "stdout was: {}", stdout);
}

#[test]
fn test_stats_on_empty_index() {
    let (_tmp, config_path) = setup_test_env();
    run_plq(&config_path, &["init"]);

    let (stdout, _, success) = run_plq(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("empty"), "stdout was: {}", stdout);
}

#[test]
fn test_build_with_limit() {
    let (_tmp, config_path) = setup_test_env();
    run_plq(&config_path, &["init"]);
    let feed = feed_path(&config_path);

    let (stdout, _, success) = run_plq(&config_path, &["build", &feed, "--limit", "1"]);
    assert!(success, "build failed: stdout={}", stdout);

    let (stdout, _, _) = run_plq(&config_path, &["stats"]);
    assert!(stdout.contains("Records:     1"), "stdout was: {}", stdout);
}

#[test]
fn test_missing_config_fails() {
    let (tmp, _) = setup_test_env();
    let bogus = tmp.path().join("nope.toml");

    let output = Command::new(plq_binary())
        .arg("--config")
        .arg(&bogus)
        .arg("init")
        .output()
        .unwrap();
    assert!(!output.status.success());
}
