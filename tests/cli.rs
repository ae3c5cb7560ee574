use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn counsel_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("counsel");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let docs_dir = root.join("docs");
    fs::create_dir_all(&docs_dir).unwrap();
    fs::write(
        docs_dir.join("deposits.md"),
        "# Security Deposits\n\nA landlord must return the security deposit within 15 days after the tenancy ends.",
    )
    .unwrap();
    fs::write(
        docs_dir.join("repairs.txt"),
        "Repairs and maintenance.\n\nThe landlord must keep the rental unit in a reasonable state of repair.",
    )
    .unwrap();
    fs::write(docs_dir.join("notes.csv"), "ignored,file").unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/counsel.sqlite"

[chunking]
max_chars = 1000

[retrieval]
top_n = 5
include_builtin_legislation = false

[completion]
endpoint = "http://127.0.0.1:9/v1/chat/completions"
api_key_env = "COUNSEL_TEST_UNSET_KEY"
"#,
        root.display()
    );

    let config_path = config_dir.join("counsel.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_counsel(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = counsel_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run counsel binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn docs_dir(config_path: &Path) -> String {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("docs")
        .display()
        .to_string()
}

fn init_and_ingest(config_path: &Path) {
    let (_, stderr, success) = run_counsel(config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    let docs = docs_dir(config_path);
    let (_, stderr, success) = run_counsel(config_path, &["ingest", &docs, "--kind", "web"]);
    assert!(success, "ingest failed: {}", stderr);
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_counsel(&config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized successfully"));
    assert!(tmp.path().join("data/counsel.sqlite").exists());
}

#[test]
fn test_init_is_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success) = run_counsel(&config_path, &["init"]);
    assert!(success);
    let (_, stderr, success) = run_counsel(&config_path, &["init"]);
    assert!(success, "second init failed: {}", stderr);
}

#[test]
fn test_ingest_directory() {
    let (_tmp, config_path) = setup_test_env();
    run_counsel(&config_path, &["init"]);

    let docs = docs_dir(&config_path);
    let (stdout, stderr, success) =
        run_counsel(&config_path, &["ingest", &docs, "--kind", "web"]);
    assert!(success, "ingest failed: {}", stderr);
    assert!(stdout.contains("ingest web"));
    assert!(stdout.contains("sources: 2"));
    assert!(stdout.contains("deposits.md"));
    assert!(!stdout.contains("notes.csv"));
}

#[test]
fn test_ingest_forum_requires_community() {
    let (_tmp, config_path) = setup_test_env();
    run_counsel(&config_path, &["init"]);

    let docs = docs_dir(&config_path);
    let (_, stderr, success) = run_counsel(&config_path, &["ingest", &docs, "--kind", "forum"]);
    assert!(!success);
    assert!(stderr.contains("--community is required"));
}

#[test]
fn test_retrieve_ranks_matching_document() {
    let (_tmp, config_path) = setup_test_env();
    init_and_ingest(&config_path);

    let (stdout, stderr, success) =
        run_counsel(&config_path, &["retrieve", "security deposit", "--explain"]);
    assert!(success, "retrieve failed: {}", stderr);
    assert!(stdout.starts_with("1. web / deposits.md"), "stdout: {}", stdout);
    assert!(stdout.contains("score:"));
}

#[test]
fn test_retrieve_json() {
    let (_tmp, config_path) = setup_test_env();
    init_and_ingest(&config_path);

    let (stdout, stderr, success) =
        run_counsel(&config_path, &["retrieve", "rental unit repair", "--json"]);
    assert!(success, "retrieve failed: {}", stderr);

    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(parsed["context"].as_str().unwrap().starts_with("[1] "));
    assert_eq!(parsed["citations"][0]["sourceName"], "repairs.txt");
}

#[test]
fn test_retrieve_no_results() {
    let (_tmp, config_path) = setup_test_env();
    init_and_ingest(&config_path);

    let (stdout, _, success) = run_counsel(&config_path, &["retrieve", "zzzqqqxxx"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_deactivate_hides_source() {
    let (_tmp, config_path) = setup_test_env();
    init_and_ingest(&config_path);

    let (stdout, _, _) = run_counsel(&config_path, &["retrieve", "security deposit", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let source_id = parsed["citations"][0]["sourceId"].as_str().unwrap().to_string();

    let (stdout, stderr, success) = run_counsel(&config_path, &["deactivate", &source_id]);
    assert!(success, "deactivate failed: {}", stderr);
    assert!(stdout.contains("Deactivated"));

    let (stdout, _, _) = run_counsel(&config_path, &["retrieve", "security deposit", "--json"]);
    assert!(!stdout.contains(&source_id));

    let (_, stderr, success) = run_counsel(&config_path, &["deactivate", "no-such-source"]);
    assert!(!success);
    assert!(stderr.contains("No source with id"));
}

#[test]
fn test_credits_grant_and_show() {
    let (_tmp, config_path) = setup_test_env();
    run_counsel(&config_path, &["init"]);

    let (stdout, _, success) = run_counsel(&config_path, &["credits", "show", "alice"]);
    assert!(success);
    assert!(stdout.contains("No credit record for alice."));

    let (stdout, stderr, success) = run_counsel(
        &config_path,
        &["credits", "grant", "alice", "3", "--expires", "2099-12-31"],
    );
    assert!(success, "grant failed: {}", stderr);
    assert!(stdout.contains("Granted 3 questions."));
    assert!(stdout.contains("expires:   2099-12-31"));

    run_counsel(&config_path, &["credits", "grant", "alice", "2"]);
    let (stdout, _, _) = run_counsel(&config_path, &["credits", "show", "alice"]);
    assert!(stdout.contains("remaining: 5"));
    assert!(stdout.contains("expires:   2099-12-31"));

    let (_, _, success) = run_counsel(&config_path, &["credits", "grant", "alice", "0"]);
    assert!(!success);
}

#[test]
fn test_chat_without_credits_is_refused() {
    let (_tmp, config_path) = setup_test_env();
    init_and_ingest(&config_path);

    let (_, stderr, success) = run_counsel(
        &config_path,
        &["chat", "Can my landlord keep my deposit?", "--user", "bob"],
    );
    assert!(!success);
    assert!(stderr.contains("No questions available"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_role_rejected() {
    let (_tmp, config_path) = setup_test_env();
    run_counsel(&config_path, &["init"]);

    let (_, _, success) = run_counsel(
        &config_path,
        &["chat", "question", "--user", "bob", "--role", "agent"],
    );
    assert!(!success);
}
