use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn fti_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("fti");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    fs::write(
        root.join("reference.json"),
        r#"{
            "stop_words": ["the", "and", "for", "this", "should", "must"],
            "lemmas": {
                "patients": "patient",
                "patient": "patient",
                "identifiers": "identifier",
                "values": "value",
                "resources": "resource"
            },
            "element_paths": ["Patient", "Patient.name", "Patient.identifier", "Observation.value"],
            "operation_names": ["everything", "validate"]
        }"#,
    )
    .unwrap();

    fs::write(
        root.join("issues.json"),
        r#"[
            {
                "id": 101,
                "title": "Patient.name cardinality is wrong",
                "description": "The Patient.name element cardinality should allow repeating values.",
                "summary": "Cardinality fix",
                "comments": ["Agreed, the Patient resource needs repeating names."]
            },
            {
                "id": 102,
                "title": "Add $everything support for Patient",
                "description": "<p>The <b>$everything</b> operation should include linked resources.</p>",
                "comments": []
            },
            {
                "id": 103,
                "title": "Clarify identifier uniqueness",
                "description": "Identifiers assigned to patients must stay unique across systems.",
                "resolution_description": "Documented identifier uniqueness rules.",
                "comments": ["Uniqueness applies per assigning system."]
            },
            {
                "id": 104,
                "title": "Search parameter cardinality mismatch",
                "description": "Cardinality of composite search parameters needs clarification.",
                "comments": []
            },
            {
                "id": 105,
                "title": "Validate operation fails on bundles",
                "description": "The $validate operation reports wrong outcomes on collection bundles.",
                "comments": []
            },
            {
                "id": 106,
                "title": "Terminology binding strength unclear",
                "description": "Binding strength wording confuses implementers of coded elements.",
                "comments": ["Also affects identifier display wording."]
            }
        ]"#,
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/fti.sqlite"

[bm25]
k1 = 1.2
b = 0.75

[scoring]
idf_batch_size = 4
bm25_flush_size = 3

[retrieval]
final_limit = 12
"#,
        root.display()
    );

    let config_path = config_dir.join("fti.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_fti(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = fti_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run fti binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

/// Init, import both fixture files, and run a full extraction.
fn build_index(config_path: &Path, root: &Path) {
    let (stdout, stderr, success) = run_fti(config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);

    let reference = root.join("reference.json");
    let (stdout, stderr, success) = run_fti(
        config_path,
        &["import", "reference", reference.to_str().unwrap()],
    );
    assert!(
        success,
        "import reference failed: stdout={}, stderr={}",
        stdout, stderr
    );

    let issues = root.join("issues.json");
    let (stdout, stderr, success) =
        run_fti(config_path, &["import", "issues", issues.to_str().unwrap()]);
    assert!(
        success,
        "import issues failed: stdout={}, stderr={}",
        stdout, stderr
    );

    let (stdout, stderr, success) = run_fti(config_path, &["extract", "--progress", "off"]);
    assert!(
        success,
        "extract failed: stdout={}, stderr={}",
        stdout, stderr
    );
    assert!(stdout.contains("issues processed: 6"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_fti(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_fti(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_fti(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_extract_and_search() {
    let (tmp, config_path) = setup_test_env();
    build_index(&config_path, tmp.path());

    let (stdout, stderr, success) =
        run_fti(&config_path, &["search", "cardinality"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert!(
        stdout.contains("#101"),
        "expected issue 101 in results, got: {}",
        stdout
    );
}

#[test]
fn test_search_operation_marker() {
    let (tmp, config_path) = setup_test_env();
    build_index(&config_path, tmp.path());

    // "$everything" resolves through the operation vocabulary; the
    // keyword lookup still finds the indexed rows.
    let (stdout, _, success) = run_fti(&config_path, &["search", "$everything"]);
    assert!(success);
    assert!(
        stdout.contains("#102"),
        "expected issue 102 in results, got: {}",
        stdout
    );
}

#[test]
fn test_search_sums_matched_terms() {
    let (tmp, config_path) = setup_test_env();
    build_index(&config_path, tmp.path());

    // Issue 103 matches both "identifier" and "unique"; it must outrank
    // issues matching only one of the terms.
    let (stdout, _, success) = run_fti(&config_path, &["search", "identifier unique"]);
    assert!(success);
    let first = stdout.lines().next().unwrap_or("");
    assert!(
        first.contains("#103"),
        "expected issue 103 ranked first, got: {}",
        stdout
    );
}

#[test]
fn test_search_empty_query_no_results() {
    let (tmp, config_path) = setup_test_env();
    build_index(&config_path, tmp.path());

    let (stdout, _, success) = run_fti(&config_path, &["search", "   "]);
    assert!(success, "empty query must not error");
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_stop_words_only_no_results() {
    let (tmp, config_path) = setup_test_env();
    build_index(&config_path, tmp.path());

    let (stdout, _, success) = run_fti(&config_path, &["search", "the and for"]);
    assert!(success, "stop-word query must not error");
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_unknown_term_no_results() {
    let (tmp, config_path) = setup_test_env();
    build_index(&config_path, tmp.path());

    let (stdout, _, success) = run_fti(&config_path, &["search", "zzzunknownzzz"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_limit_truncates() {
    let (tmp, config_path) = setup_test_env();
    build_index(&config_path, tmp.path());

    let (stdout, _, success) = run_fti(&config_path, &["search", "cardinality", "--limit", "1"]);
    assert!(success);
    let result_lines = stdout
        .lines()
        .filter(|l| l.starts_with(|c: char| c.is_ascii_digit()))
        .count();
    assert_eq!(result_lines, 1, "expected 1 result line, got: {}", stdout);
}

#[test]
fn test_search_kind_operation() {
    let (tmp, config_path) = setup_test_env();
    build_index(&config_path, tmp.path());

    let (stdout, _, success) = run_fti(&config_path, &["search-kind", "operation"]);
    assert!(success);
    assert!(stdout.contains("#102"), "got: {}", stdout);
    assert!(!stdout.contains("#103"), "got: {}", stdout);
}

#[test]
fn test_search_kind_rejects_unknown() {
    let (tmp, config_path) = setup_test_env();
    build_index(&config_path, tmp.path());

    let (_, stderr, success) = run_fti(&config_path, &["search-kind", "banana"]);
    assert!(!success);
    assert!(stderr.contains("Unknown keyword kind"));
}

#[test]
fn test_top_keywords() {
    let (tmp, config_path) = setup_test_env();
    build_index(&config_path, tmp.path());

    let (stdout, _, success) = run_fti(&config_path, &["top-keywords", "--limit", "5"]);
    assert!(success);
    assert!(stdout.contains("KEYWORD"));
    // Header plus at most 5 keyword rows.
    assert!(stdout.lines().count() <= 6, "got: {}", stdout);

    let (stdout, _, success) = run_fti(
        &config_path,
        &["top-keywords", "--kind", "operation", "--limit", "5"],
    );
    assert!(success);
    assert!(stdout.contains("everything"), "got: {}", stdout);
}

#[test]
fn test_extract_idempotent() {
    let (tmp, config_path) = setup_test_env();
    build_index(&config_path, tmp.path());

    let (stdout1, _, _) = run_fti(&config_path, &["extract", "--progress", "off"]);
    let (stdout2, _, _) = run_fti(&config_path, &["extract", "--progress", "off"]);

    let rows1 = stdout1
        .lines()
        .find(|l| l.contains("issue keyword rows:"))
        .unwrap()
        .to_string();
    let rows2 = stdout2
        .lines()
        .find(|l| l.contains("issue keyword rows:"))
        .unwrap()
        .to_string();
    assert_eq!(rows1, rows2, "repeated extraction changed the index");
}

#[test]
fn test_fix_scores_requires_extraction() {
    let (_tmp, config_path) = setup_test_env();

    run_fti(&config_path, &["init"]);
    let (_, stderr, success) = run_fti(&config_path, &["fix-scores", "--progress", "off"]);
    assert!(!success, "fix-scores must fail before extraction");
    assert!(
        stderr.contains("run extraction first"),
        "got stderr: {}",
        stderr
    );
}

#[test]
fn test_fix_scores_matches_full_recompute() {
    let (tmp, config_path) = setup_test_env();
    build_index(&config_path, tmp.path());

    // Scores printed to 4 decimals must be identical when the incremental
    // pass re-runs with the same parameters.
    let (before, _, _) = run_fti(&config_path, &["search", "cardinality"]);

    let (stdout, stderr, success) = run_fti(&config_path, &["fix-scores", "--progress", "off"]);
    assert!(
        success,
        "fix-scores failed: stdout={}, stderr={}",
        stdout, stderr
    );
    assert!(stdout.contains("ok"));

    let (after, _, _) = run_fti(&config_path, &["search", "cardinality"]);
    assert_eq!(before, after, "incremental rescore diverged from full recompute");
}

#[test]
fn test_fix_scores_new_parameters() {
    let (tmp, config_path) = setup_test_env();
    build_index(&config_path, tmp.path());

    let (stdout, stderr, success) = run_fti(
        &config_path,
        &["fix-scores", "--k1", "1.6", "--b", "0.5", "--progress", "off"],
    );
    assert!(
        success,
        "fix-scores failed: stdout={}, stderr={}",
        stdout, stderr
    );
    assert!(stdout.contains("k1: 1.6"));
    assert!(stdout.contains("b: 0.5"));

    // New parameters are recorded for downstream tools.
    let (stats, _, _) = run_fti(&config_path, &["stats"]);
    assert!(stats.contains("k1=1.6"), "got: {}", stats);
}

#[test]
fn test_stats_reports_counts() {
    let (tmp, config_path) = setup_test_env();
    build_index(&config_path, tmp.path());

    let (stdout, _, success) = run_fti(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Issues:          6"), "got: {}", stdout);
    assert!(stdout.contains("Avg doc length:"), "got: {}", stdout);
}

#[test]
fn test_import_issues_idempotent() {
    let (tmp, config_path) = setup_test_env();

    run_fti(&config_path, &["init"]);
    let issues = tmp.path().join("issues.json");
    let (stdout1, _, _) =
        run_fti(&config_path, &["import", "issues", issues.to_str().unwrap()]);
    assert!(stdout1.contains("issues upserted: 6"));

    let (stdout2, _, success) =
        run_fti(&config_path, &["import", "issues", issues.to_str().unwrap()]);
    assert!(success);
    assert!(stdout2.contains("issues upserted: 6"));
}
