use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn hsearch_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("hsearch");
    path
}

const CATALOG: &str = r#"{
  "entities": [
    {"entity_id": "c-empty", "kind": "collection"}
  ],
  "relationships": [
    {"from_entity_id": "c-amulet", "from_kind": "collection", "to_entity_id": "p-egypt", "to_kind": "place"},
    {"from_entity_id": "c-vessel", "from_kind": "collection", "to_entity_id": "p-egypt", "to_kind": "place"},
    {"from_entity_id": "c-vessel", "from_kind": "collection", "to_entity_id": "m-quartz", "to_kind": "material"},
    {"from_entity_id": "c-knife", "from_kind": "collection", "to_entity_id": "m-quartz", "to_kind": "material"},
    {"from_entity_id": "p-egypt", "from_kind": "place", "to_entity_id": "p-africa", "to_kind": "place"}
  ],
  "labels": [
    {"id": "c-vessel", "language": "en", "label": "Canopic Vessel"},
    {"id": "v-obsidian", "language": "en", "label": "Obsidian"}
  ],
  "records": [
    {"record_id": "t-egypt", "owner_entity_id": "p-egypt",
     "fields": [{"field_id": "name", "kind": "plainText", "value": {"en": {"value": "Egypt"}}}]},
    {"record_id": "t-africa", "owner_entity_id": "p-africa",
     "fields": [{"field_id": "name", "kind": "string", "value": {"en": {"value": "Africa", "direction": "ltr"}}}]},
    {"record_id": "t-quartz", "owner_entity_id": "m-quartz",
     "fields": [{"field_id": "name", "kind": "plainText", "value": "Quartz"}]},
    {"record_id": "t-knife", "owner_entity_id": "c-knife",
     "fields": [{"field_id": "material", "kind": "referenceList", "value": ["v-obsidian"]}]}
  ]
}"#;

fn setup_test_env() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/hsearch.sqlite"

[search]
target_kind = "collection"
max_depth = 2
page_size = 2

[cache]
ttl_secs = 60
"#,
        root.display()
    );
    let config_path = config_dir.join("hsearch.toml");
    fs::write(&config_path, config_content).unwrap();

    let catalog_path = root.join("catalog.json");
    fs::write(&catalog_path, CATALOG).unwrap();

    (tmp, config_path, catalog_path)
}

fn run_hsearch(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = hsearch_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run hsearch binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn loaded_env() -> (TempDir, PathBuf) {
    let (tmp, config_path, catalog_path) = setup_test_env();
    let (stdout, stderr, success) = run_hsearch(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    let (stdout, stderr, success) =
        run_hsearch(&config_path, &["load", catalog_path.to_str().unwrap()]);
    assert!(success, "load failed: stdout={}, stderr={}", stdout, stderr);
    (tmp, config_path)
}

fn search_json(config_path: &Path, args: &[&str]) -> serde_json::Value {
    let mut full = vec!["search", "--json"];
    full.extend_from_slice(args);
    let (stdout, stderr, success) = run_hsearch(config_path, &full);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    serde_json::from_str(&stdout).unwrap()
}

fn ids(page: &serde_json::Value) -> Vec<String> {
    page["ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path, _) = setup_test_env();

    let (stdout, stderr, success) = run_hsearch(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path, _) = setup_test_env();

    let (_, _, success1) = run_hsearch(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_hsearch(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_load_reports_counts() {
    let (_tmp, config_path, catalog_path) = setup_test_env();
    run_hsearch(&config_path, &["init"]);

    let (stdout, stderr, success) =
        run_hsearch(&config_path, &["load", catalog_path.to_str().unwrap()]);
    assert!(success, "load failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("records: 4"));
    assert!(stdout.contains("searchable values: 4"));
}

#[test]
fn test_load_twice_does_not_duplicate_values() {
    let (_tmp, config_path, catalog_path) = setup_test_env();
    run_hsearch(&config_path, &["init"]);
    run_hsearch(&config_path, &["load", catalog_path.to_str().unwrap()]);
    run_hsearch(&config_path, &["load", catalog_path.to_str().unwrap()]);

    let (stdout, _, success) = run_hsearch(&config_path, &["reindex"]);
    assert!(success);
    assert!(stdout.contains("searchable values: 4"));
}

#[test]
fn test_search_through_relationships() {
    let (_tmp, config_path) = loaded_env();

    let page = search_json(&config_path, &["egypt"]);
    assert_eq!(ids(&page), vec!["c-amulet", "c-vessel"]);
    assert_eq!(page["filtered"], true);
}

#[test]
fn test_search_is_case_insensitive() {
    let (_tmp, config_path) = loaded_env();

    let page = search_json(&config_path, &["QUARTZ"]);
    assert_eq!(ids(&page), vec!["c-knife", "c-vessel"]);
}

#[test]
fn test_search_multi_term_intersects() {
    let (_tmp, config_path) = loaded_env();

    let page = search_json(&config_path, &["egypt", "quartz"]);
    assert_eq!(ids(&page), vec!["c-vessel"]);
    assert_eq!(page["total"], 1);
}

#[test]
fn test_search_resolves_reference_labels() {
    let (_tmp, config_path) = loaded_env();

    let page = search_json(&config_path, &["obsidian"]);
    assert_eq!(ids(&page), vec!["c-knife"]);
}

#[test]
fn test_search_depth_bound() {
    let (_tmp, config_path) = loaded_env();

    // africa -> egypt -> items is two hops.
    let page = search_json(&config_path, &["africa", "--depth", "1"]);
    assert_eq!(page["total"], 0);

    let page = search_json(&config_path, &["africa", "--depth", "2"]);
    assert_eq!(ids(&page), vec!["c-amulet", "c-vessel"]);
}

#[test]
fn test_search_no_match() {
    let (_tmp, config_path) = loaded_env();

    let (stdout, _, success) = run_hsearch(&config_path, &["search", "granite"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_unfiltered_lists_target_kind_with_paging() {
    let (_tmp, config_path) = loaded_env();

    let first = search_json(&config_path, &[]);
    assert_eq!(first["filtered"], false);
    assert_eq!(first["total"], 4);
    assert_eq!(ids(&first), vec!["c-amulet", "c-empty"]);

    let second = search_json(&config_path, &["--page", "2"]);
    assert_eq!(ids(&second), vec!["c-knife", "c-vessel"]);
}

#[test]
fn test_search_text_output_uses_labels() {
    let (_tmp, config_path) = loaded_env();

    let (stdout, stderr, success) =
        run_hsearch(&config_path, &["search", "quartz", "--session", "abc"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("2 results (filtered), page 1 of 1"));
    assert!(stdout.contains("c-vessel / Canopic Vessel"));
    assert!(stdout.contains("session: abc"));
}

#[test]
fn test_session_command_reads_persisted_results() {
    let (_tmp, config_path) = loaded_env();

    run_hsearch(&config_path, &["search", "quartz", "--session", "abc"]);
    let (stdout, _, success) = run_hsearch(&config_path, &["session", "abc"]);
    assert!(success);
    assert!(stdout.contains("Session abc: 2 cached results"));
    assert!(stdout.contains("  c-knife"));
    assert!(stdout.contains("  c-vessel"));

    // A search with no hits still records an empty restriction.
    run_hsearch(&config_path, &["search", "granite", "--session", "abc"]);
    let (stdout, _, _) = run_hsearch(&config_path, &["session", "abc"]);
    assert!(stdout.contains("Session abc: 0 cached results"));

    // The unfiltered listing clears it.
    run_hsearch(&config_path, &["search", "--session", "abc"]);
    let (stdout, _, _) = run_hsearch(&config_path, &["session", "abc"]);
    assert!(stdout.contains("No cached results for session abc."));
}

#[test]
fn test_session_clear() {
    let (_tmp, config_path) = loaded_env();

    run_hsearch(&config_path, &["search", "egypt", "--session", "s9"]);
    let (stdout, _, success) = run_hsearch(&config_path, &["session", "s9", "--json"]);
    assert!(success);
    let cached: Vec<String> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(cached, vec!["c-amulet", "c-vessel"]);

    let (stdout, _, success) = run_hsearch(&config_path, &["session", "s9", "--clear"]);
    assert!(success);
    assert!(stdout.contains("Cleared session s9."));
    let (stdout, _, _) = run_hsearch(&config_path, &["session", "s9", "--json"]);
    assert_eq!(stdout.trim(), "null");
}

#[test]
fn test_search_huge_page_reports_past_end() {
    let (_tmp, config_path) = loaded_env();

    let (stdout, stderr, success) = run_hsearch(
        &config_path,
        &["search", "egypt", "--page", "18446744073709551615"],
    );
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("2 results (filtered); page 18446744073709551615 is past the last page (1)."));

    let page = search_json(&config_path, &["egypt", "--page", "5"]);
    assert!(ids(&page).is_empty());
    assert_eq!(page["offset"], 2);
}

#[test]
fn test_search_where_filters_on_record_fields() {
    let (_tmp, config_path) = loaded_env();

    // Record fields match exactly; the list field matches by member.
    let page = search_json(&config_path, &["--where", "material=v-obsidian"]);
    assert_eq!(page["filtered"], true);
    assert_eq!(ids(&page), vec!["c-knife"]);

    let page = search_json(&config_path, &["quartz", "--where", "material=v-obsidian"]);
    assert_eq!(ids(&page), vec!["c-knife"]);

    let page = search_json(&config_path, &["egypt", "--where", "material=v-obsidian"]);
    assert_eq!(page["total"], 0);
}

#[test]
fn test_search_any_widens_where() {
    let (_tmp, config_path) = loaded_env();

    let page = search_json(
        &config_path,
        &["--where", "material=v-granite", "--any", "material=v-obsidian"],
    );
    assert_eq!(ids(&page), vec!["c-knife"]);
}

#[test]
fn test_search_where_rejects_malformed_condition() {
    let (_tmp, config_path) = loaded_env();

    let (_, stderr, success) = run_hsearch(&config_path, &["search", "--where", "material"]);
    assert!(!success);
    assert!(stderr.contains("FIELD=VALUE"));
}

#[test]
fn test_drop_record_removes_matches() {
    let (_tmp, config_path) = loaded_env();

    let (stdout, _, success) = run_hsearch(&config_path, &["drop-record", "t-quartz"]);
    assert!(success);
    assert!(stdout.contains("Dropped record t-quartz (1 searchable values removed)."));

    let page = search_json(&config_path, &["quartz"]);
    assert_eq!(page["total"], 0);

    let (stdout, _, success) = run_hsearch(&config_path, &["drop-record", "t-quartz"]);
    assert!(success);
    assert!(stdout.contains("not found"));

    // Rebuild must not resurrect the dropped record.
    run_hsearch(&config_path, &["reindex"]);
    let page = search_json(&config_path, &["quartz"]);
    assert_eq!(page["total"], 0);
}

#[test]
fn test_invalid_config_fails() {
    let (tmp, _, _) = setup_test_env();
    let bad = tmp.path().join("config").join("bad.toml");
    fs::write(
        &bad,
        format!(
            "[db]\npath = \"{}/x.sqlite\"\n\n[search]\ntarget_kind = \"\"\n",
            tmp.path().display()
        ),
    )
    .unwrap();

    let (_, stderr, success) = run_hsearch(&bad, &["init"]);
    assert!(!success);
    assert!(!stderr.is_empty());
}

#[test]
fn test_search_before_init_fails() {
    let (_tmp, config_path, _) = setup_test_env();

    let (_, stderr, success) = run_hsearch(&config_path, &["search", "egypt"]);
    assert!(!success);
    assert!(stderr.contains("hsearch init"));
}
