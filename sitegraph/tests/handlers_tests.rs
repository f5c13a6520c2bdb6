use sitegraph::extract_url_path;
use sitegraph::handlers::*;
use sitegraph_core::config::AnalysisConfig;
use sitegraph_core::export::{ExportConfig, ExportFilter, ExportFormat, MermaidOptions};
use sitegraph_core::snapshot::Snapshot;
use sitegraph_core::store::SnapshotStore;
use std::io::Write;
use std::path::PathBuf;
use tempfile::{NamedTempFile, TempDir};
use uuid::Uuid;

const CRAWL_JSON: &str = r#"{
    "root_url": "https://example.com/",
    "pages": [
        {"url": "https://example.com/", "http_status": 200, "title": "Home", "word_count": 900},
        {"url": "https://example.com/about", "http_status": 200, "title": "About",
         "word_count": 700},
        {"url": "https://example.com/legacy", "http_status": 200, "title": "Legacy",
         "word_count": 700}
    ],
    "edges": [
        {"source_url": "https://example.com/", "target_url": "/about", "position": "nav"},
        {"source_url": "https://example.com/about", "target_url": "/team"}
    ]
}"#;

fn crawl_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", json).unwrap();
    file
}

fn test_store() -> (TempDir, SnapshotStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(&temp_dir.path().join(DATABASE_FILE)).unwrap();
    (temp_dir, store)
}

#[test]
fn test_extract_url_path() {
    assert_eq!(extract_url_path("https://example.com/api/users"), "/api/users");
    assert_eq!(extract_url_path("https://example.com/"), "/");
    assert_eq!(extract_url_path("https://example.com"), "/");
}

#[test]
fn test_resolve_db_path() {
    let path = resolve_db_path("/var/lib/sitegraph");
    assert_eq!(path, PathBuf::from("/var/lib/sitegraph/sitegraph.db"));

    let expanded = resolve_db_path("~/.config/sitegraph/");
    assert!(!expanded.to_string_lossy().starts_with('~'));
    assert!(expanded.ends_with("sitegraph.db"));
}

#[test]
fn test_open_store_requires_init() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().to_string_lossy().to_string();

    assert!(open_store(&data_dir).is_err());

    SnapshotStore::new(&resolve_db_path(&data_dir)).unwrap();
    assert!(open_store(&data_dir).is_ok());
}

#[test]
fn test_load_crawl_data() {
    let file = crawl_file(CRAWL_JSON);
    let data = load_crawl_data(file.path()).unwrap();

    assert_eq!(data.root_url.as_deref(), Some("https://example.com/"));
    assert_eq!(data.pages.len(), 3);
    assert_eq!(data.edges.len(), 2);
}

#[test]
fn test_load_crawl_data_errors() {
    let file = crawl_file("{ not json");
    let err = load_crawl_data(file.path()).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to load crawl data"));

    assert!(load_crawl_data(&PathBuf::from("/nonexistent/crawl.json")).is_err());
}

#[test]
fn test_load_analysis_config() {
    assert_eq!(load_analysis_config(None).unwrap(), AnalysisConfig::default());

    let file = crawl_file(r#"{"deep_page_threshold": 2}"#);
    let path = file.path().to_path_buf();
    let config = load_analysis_config(Some(&path)).unwrap();
    assert_eq!(config.deep_page_threshold, 2);
    assert_eq!(config.equity_max_iterations, 20);

    let file = crawl_file(r#"{"deep_page_treshold": 2}"#);
    let path = file.path().to_path_buf();
    assert!(load_analysis_config(Some(&path)).is_err());
}

#[test]
fn test_load_export_config() {
    let config = load_export_config(ExportFormat::Svg, None).unwrap();
    assert_eq!(config.format(), ExportFormat::Svg);

    let file = crawl_file(r#"{"max_label_length": 0}"#);
    let path = file.path().to_path_buf();
    assert!(load_export_config(ExportFormat::Mermaid, Some(&path)).is_err());
}

#[test]
fn test_export_cache_key_covers_options_and_filter() {
    let default = ExportConfig::Mermaid(MermaidOptions::default());
    let short = ExportConfig::Mermaid(MermaidOptions {
        max_label_length: 12,
        ..Default::default()
    });
    let filter = ExportFilter::default();
    let strict = ExportFilter {
        exclude_errors: true,
        exclude_external: false,
    };

    let key = export_cache_key(&default, &filter).unwrap();
    assert!(key.starts_with("mermaid|"));
    assert_ne!(key, export_cache_key(&short, &filter).unwrap());
    assert_ne!(key, export_cache_key(&default, &strict).unwrap());
    assert_eq!(key, export_cache_key(&default, &filter).unwrap());
}

#[test]
fn test_parse_snapshot_id() {
    let id = Uuid::new_v4();
    assert_eq!(parse_snapshot_id(&format!(" {} ", id)).unwrap(), id);
    assert!(parse_snapshot_id("latest").is_err());
}

#[test]
fn test_run_analysis_without_store() {
    let data = load_crawl_data(crawl_file(CRAWL_JSON).path()).unwrap();
    let (analysis, snapshot) =
        run_analysis(None, "site", &data, AnalysisConfig::default()).unwrap();

    assert!(snapshot.is_none());
    assert_eq!(analysis.summary.totals.node_count, 3);
    assert_eq!(analysis.summary.severity_counts.critical, 1);
    assert_eq!(analysis.summary.severity_counts.serious, 1);
}

#[test]
fn test_run_analysis_stores_snapshots() {
    let (_temp_dir, store) = test_store();
    let data = load_crawl_data(crawl_file(CRAWL_JSON).path()).unwrap();

    let (_, first) = run_analysis(Some(&store), "site", &data, AnalysisConfig::default()).unwrap();
    let first = first.unwrap();
    assert!(first.diff_summary().is_none());
    assert_eq!(store.get_issues(first.id()).unwrap().len(), 2);

    let (_, second) = run_analysis(Some(&store), "site", &data, AnalysisConfig::default()).unwrap();
    let second = second.unwrap();
    let summary = second.diff_summary().unwrap();
    assert_eq!(summary.base_snapshot_id, first.id());
    assert_eq!(summary.nodes_added, 0);

    let listings = store.list_snapshots("site").unwrap();
    assert_eq!(listings.len(), 2);
    assert_eq!(listings[1].id, second.id());
}

#[test]
fn test_run_analysis_keeps_resolutions() {
    let (_temp_dir, store) = test_store();
    let data = load_crawl_data(crawl_file(CRAWL_JSON).path()).unwrap();

    run_analysis(Some(&store), "site", &data, AnalysisConfig::default()).unwrap();
    store
        .resolve_issue("site", "orphan|https://example.com/legacy|")
        .unwrap();

    let (analysis, snapshot) =
        run_analysis(Some(&store), "site", &data, AnalysisConfig::default()).unwrap();
    assert_eq!(analysis.summary.severity_counts.serious, 0);
    assert_eq!(analysis.summary.severity_counts.total(), 1);

    let stored = store.get_issues(snapshot.unwrap().id()).unwrap();
    assert_eq!(stored.iter().filter(|i| i.resolved).count(), 1);
}

#[test]
fn test_run_analysis_invalidates_export_cache() {
    let (_temp_dir, store) = test_store();
    let data = load_crawl_data(crawl_file(CRAWL_JSON).path()).unwrap();
    let (_, snapshot) =
        run_analysis(Some(&store), "site", &data, AnalysisConfig::default()).unwrap();
    let snapshot = snapshot.unwrap();

    store
        .cache_export("site", "svg|{}|{}", snapshot.id(), "<svg/>")
        .unwrap();
    run_analysis(Some(&store), "site", &data, AnalysisConfig::default()).unwrap();

    assert!(
        store
            .cached_export("site", "svg|{}|{}", snapshot.id())
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_render_export_uses_cache() {
    let (_temp_dir, store) = test_store();
    let data = load_crawl_data(crawl_file(CRAWL_JSON).path()).unwrap();
    let (_, snapshot) =
        run_analysis(Some(&store), "site", &data, AnalysisConfig::default()).unwrap();
    let snapshot = snapshot.unwrap();

    let config = ExportConfig::default_for(ExportFormat::Mermaid);
    let filter = ExportFilter::default();

    let rendered = render_export(&store, "site", &snapshot, &config, &filter, true).unwrap();
    assert!(rendered.starts_with("flowchart TD"));

    // Tamper with the cache to prove the second call reads it
    let key = export_cache_key(&config, &filter).unwrap();
    store
        .cache_export("site", &key, snapshot.id(), "cached")
        .unwrap();
    assert_eq!(
        render_export(&store, "site", &snapshot, &config, &filter, true).unwrap(),
        "cached"
    );
    assert_eq!(
        render_export(&store, "site", &snapshot, &config, &filter, false).unwrap(),
        rendered
    );
}

fn recommended_kinds(bundle: &str) -> Vec<String> {
    let bundle: serde_json::Value = serde_json::from_str(bundle).unwrap();
    bundle["recommendations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["kind"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_resolve_issue_refreshes_cached_exports() {
    let (_temp_dir, store) = test_store();
    let data = load_crawl_data(crawl_file(CRAWL_JSON).path()).unwrap();
    let (_, snapshot) =
        run_analysis(Some(&store), "site", &data, AnalysisConfig::default()).unwrap();
    let snapshot = snapshot.unwrap();

    let config = ExportConfig::default_for(ExportFormat::PdfData);
    let filter = ExportFilter::default();

    let before = render_export(&store, "site", &snapshot, &config, &filter, true).unwrap();
    assert_eq!(recommended_kinds(&before).len(), 2);

    assert!(resolve_issue(&store, "site", "orphan|https://example.com/legacy|").unwrap());

    let after = render_export(&store, "site", &snapshot, &config, &filter, true).unwrap();
    let kinds = recommended_kinds(&after);
    assert_eq!(kinds.len(), 1);
    assert!(!kinds.iter().any(|k| k == "orphan"));

    // Resolving twice leaves the cache alone
    let key = export_cache_key(&config, &filter).unwrap();
    assert!(!resolve_issue(&store, "site", "orphan|https://example.com/legacy|").unwrap());
    assert!(
        store
            .cached_export("site", &key, snapshot.id())
            .unwrap()
            .is_some()
    );
}

// ============================================================================
// Diff Pair Selection Tests
// ============================================================================

fn stored_snapshots(count: usize) -> (TempDir, SnapshotStore, Vec<Snapshot>) {
    let (temp_dir, store) = test_store();
    let data = load_crawl_data(crawl_file(CRAWL_JSON).path()).unwrap();
    let snapshots = (0..count)
        .map(|_| {
            run_analysis(Some(&store), "site", &data, AnalysisConfig::default())
                .unwrap()
                .1
                .unwrap()
        })
        .collect();
    (temp_dir, store, snapshots)
}

#[test]
fn test_select_diff_pair_defaults_to_latest_two() {
    let (_temp_dir, store, snapshots) = stored_snapshots(3);
    let listings = store.list_snapshots("site").unwrap();

    let (base, target) = select_diff_pair(&listings, None, None).unwrap();
    assert_eq!(base, snapshots[1].id());
    assert_eq!(target, snapshots[2].id());
}

#[test]
fn test_select_diff_pair_explicit_ids() {
    let (_temp_dir, store, snapshots) = stored_snapshots(3);
    let listings = store.list_snapshots("site").unwrap();

    let (base, target) = select_diff_pair(&listings, Some(snapshots[0].id()), None).unwrap();
    assert_eq!(base, snapshots[0].id());
    assert_eq!(target, snapshots[2].id());

    let (base, target) = select_diff_pair(&listings, None, Some(snapshots[2].id())).unwrap();
    assert_eq!(base, snapshots[1].id());
    assert_eq!(target, snapshots[2].id());
}

#[test]
fn test_select_diff_pair_needs_two_snapshots() {
    let (_temp_dir, store, _) = stored_snapshots(1);
    let listings = store.list_snapshots("site").unwrap();

    assert!(select_diff_pair(&listings, None, None).is_err());
    assert!(select_diff_pair(&[], None, None).is_err());
}
