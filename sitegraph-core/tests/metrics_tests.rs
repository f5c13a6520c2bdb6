// Tests for depth, link counts, orphan detection and link equity

use sitegraph_core::config::AnalysisConfig;
use sitegraph_core::crawl::{CrawlData, CrawlEdge, CrawlPage};
use sitegraph_core::error::GraphError;
use sitegraph_core::graph::{SiteGraph, node_id_for};
use sitegraph_core::metrics::{bfs_depths, compute_metrics, is_deep, is_orphan, link_equity};
use sitegraph_core::model::StatusCategory;

fn url(path: &str) -> String {
    format!("https://example.com{}", path)
}

fn build(paths: &[&str], edges: &[(&str, &str)]) -> SiteGraph {
    let data = CrawlData {
        root_url: Some(url("/")),
        pages: paths.iter().map(|p| CrawlPage::new(&url(p), 200)).collect(),
        edges: edges
            .iter()
            .map(|(from, to)| CrawlEdge::new(&url(from), &url(to)))
            .collect(),
    };
    SiteGraph::from_crawl(&data).unwrap()
}

/// R -> A, R -> B, A -> C; D has no inbound links
fn sample_graph() -> SiteGraph {
    build(
        &["/", "/a", "/b", "/c", "/d"],
        &[("/", "/a"), ("/", "/b"), ("/a", "/c")],
    )
}

fn node<'a>(graph: &'a SiteGraph, path: &str) -> &'a sitegraph_core::model::Node {
    graph.node_by_url(&url(path)).unwrap()
}

// ============================================================================
// Depth Tests
// ============================================================================

#[test]
fn test_sample_depths() {
    let mut graph = sample_graph();
    compute_metrics(&mut graph, &AnalysisConfig::default()).unwrap();

    assert_eq!(node(&graph, "/").depth, Some(0));
    assert_eq!(node(&graph, "/a").depth, Some(1));
    assert_eq!(node(&graph, "/b").depth, Some(1));
    assert_eq!(node(&graph, "/c").depth, Some(2));
    assert_eq!(node(&graph, "/d").depth, None);

    for path in ["/", "/a", "/b", "/c"] {
        assert!(!node(&graph, path).is_orphan, "{} should not be orphan", path);
    }
    assert!(node(&graph, "/d").is_orphan);
    assert_eq!(node(&graph, "/d").status, StatusCategory::Orphan);
}

#[test]
fn test_bfs_uses_minimum_distance() {
    // Long chain R -> A -> B -> C plus a shortcut R -> C
    let graph = build(
        &["/", "/a", "/b", "/c"],
        &[("/", "/a"), ("/a", "/b"), ("/b", "/c"), ("/", "/c")],
    );
    let depths = bfs_depths(&graph).unwrap();

    assert_eq!(depths[&node_id_for(&url("/c"))], 1);
    assert_eq!(depths[&node_id_for(&url("/b"))], 2);
}

#[test]
fn test_bfs_is_deterministic() {
    let graph = sample_graph();
    let first = bfs_depths(&graph).unwrap();
    for _ in 0..5 {
        assert_eq!(bfs_depths(&graph).unwrap(), first);
    }
}

#[test]
fn test_bfs_ignores_external_and_broken_links() {
    let data = CrawlData {
        root_url: Some(url("/")),
        pages: vec![CrawlPage::new(&url("/"), 200)],
        edges: vec![
            CrawlEdge::new(&url("/"), "https://other.org/"),
            CrawlEdge::new(&url("/"), &url("/missing")),
        ],
    };
    let graph = SiteGraph::from_crawl(&data).unwrap();
    let depths = bfs_depths(&graph).unwrap();

    assert_eq!(depths.len(), 1);
}

#[test]
fn test_no_root_fails_without_touching_graph() {
    let data = CrawlData {
        root_url: None,
        pages: vec![CrawlPage::new(&url("/a"), 200), CrawlPage::new(&url("/b"), 200)],
        edges: vec![CrawlEdge::new(&url("/a"), &url("/b"))],
    };
    let mut graph = SiteGraph::from_crawl(&data).unwrap();
    let before = graph.nodes().to_vec();

    let result = compute_metrics(&mut graph, &AnalysisConfig::default());
    assert!(matches!(result, Err(GraphError::NoRootNode)));
    assert_eq!(graph.nodes(), before.as_slice());
    assert!(matches!(bfs_depths(&graph), Err(GraphError::NoRootNode)));
}

// ============================================================================
// Orphan / Deep / Unreachable Tests
// ============================================================================

#[test]
fn test_is_orphan_rule() {
    assert!(is_orphan(0, None));
    assert!(is_orphan(0, Some(3)));
    assert!(!is_orphan(0, Some(0)));
    assert!(!is_orphan(2, None));
}

#[test]
fn test_root_never_orphan() {
    let mut graph = build(&["/"], &[]);
    compute_metrics(&mut graph, &AnalysisConfig::default()).unwrap();

    let root = graph.root().unwrap();
    assert_eq!(root.inbound_count, 0);
    assert!(!root.is_orphan);
}

#[test]
fn test_unreachable_with_inbound_links() {
    // X -> Y but nothing reaches X from the root
    let mut graph = build(&["/", "/x", "/y"], &[("/x", "/y")]);
    compute_metrics(&mut graph, &AnalysisConfig::default()).unwrap();

    let x = node(&graph, "/x");
    let y = node(&graph, "/y");
    assert!(x.is_orphan);
    assert!(!x.unreachable);
    assert!(!y.is_orphan);
    assert!(y.unreachable);
    assert_eq!(y.depth, None);
}

#[test]
fn test_deep_pages() {
    assert!(!is_deep(Some(4), 4));
    assert!(is_deep(Some(5), 4));
    assert!(!is_deep(None, 4));

    let mut graph = build(
        &["/", "/1", "/2", "/3"],
        &[("/", "/1"), ("/1", "/2"), ("/2", "/3")],
    );
    let config = AnalysisConfig {
        deep_page_threshold: 2,
        ..Default::default()
    };
    compute_metrics(&mut graph, &config).unwrap();

    assert!(!node(&graph, "/2").is_deep);
    assert!(node(&graph, "/3").is_deep);
    assert_eq!(node(&graph, "/3").status, StatusCategory::Deep);
}

#[test]
fn test_http_status_takes_precedence() {
    let data = CrawlData {
        root_url: Some(url("/")),
        pages: vec![
            CrawlPage::new(&url("/"), 200),
            CrawlPage::new(&url("/gone"), 404),
            CrawlPage {
                url: url("/slow"),
                ..Default::default()
            },
        ],
        edges: vec![],
    };
    let mut graph = SiteGraph::from_crawl(&data).unwrap();
    compute_metrics(&mut graph, &AnalysisConfig::default()).unwrap();

    // Both are orphans, but the HTTP outcome wins
    assert!(node(&graph, "/gone").is_orphan);
    assert_eq!(node(&graph, "/gone").status, StatusCategory::ClientError);
    assert_eq!(node(&graph, "/slow").status, StatusCategory::Timeout);
}

#[test]
fn test_link_counts() {
    let data = CrawlData {
        root_url: Some(url("/")),
        pages: vec![CrawlPage::new(&url("/"), 200), CrawlPage::new(&url("/a"), 200)],
        edges: vec![
            CrawlEdge::new(&url("/"), &url("/a")),
            CrawlEdge::new(&url("/"), "https://other.org/"),
            CrawlEdge::new(&url("/"), &url("/missing")),
        ],
    };
    let mut graph = SiteGraph::from_crawl(&data).unwrap();
    compute_metrics(&mut graph, &AnalysisConfig::default()).unwrap();

    assert_eq!(graph.root().unwrap().outbound_count, 3);
    assert_eq!(node(&graph, "/a").inbound_count, 1);
    assert_eq!(node(&graph, "/a").outbound_count, 0);
}

// ============================================================================
// Link Equity Tests
// ============================================================================

#[test]
fn test_equity_total_never_increases() {
    let graph = build(
        &["/", "/a", "/b", "/c", "/d"],
        &[
            ("/", "/a"),
            ("/", "/b"),
            ("/a", "/c"),
            ("/b", "/c"),
            ("/c", "/"),
            ("/c", "/d"),
        ],
    );
    let (_, stats) = link_equity(&graph, &AnalysisConfig::default()).unwrap();

    assert!(!stats.totals.is_empty());
    let mut previous = 1.0;
    for total in &stats.totals {
        assert!(*total <= previous + 1e-12, "{} > {}", total, previous);
        previous = *total;
    }
}

#[test]
fn test_equity_dead_end_keeps_score() {
    // R -> A, A has no outbound links
    let graph = build(&["/", "/a"], &[("/", "/a")]);
    let config = AnalysisConfig::default();
    let (scores, stats) = link_equity(&graph, &config).unwrap();

    assert!((scores[&node_id_for(&url("/a"))] - 1.0).abs() < 1e-12);
    assert!(scores[&node_id_for(&url("/"))].abs() < 1e-12);
    assert!(stats.converged);
    assert!(stats.iterations < config.equity_max_iterations);
}

#[test]
fn test_equity_split_evenly() {
    // R -> A, R -> B, A and B are dead ends
    let graph = build(&["/", "/a", "/b"], &[("/", "/a"), ("/", "/b")]);
    let (scores, _) = link_equity(&graph, &AnalysisConfig::default()).unwrap();

    assert!((scores[&node_id_for(&url("/a"))] - 0.5).abs() < 1e-12);
    assert!((scores[&node_id_for(&url("/b"))] - 0.5).abs() < 1e-12);
}

#[test]
fn test_equity_stops_at_max_iterations() {
    // Two-node cycle never converges
    let graph = build(&["/", "/a"], &[("/", "/a"), ("/a", "/")]);
    let config = AnalysisConfig {
        equity_max_iterations: 7,
        ..Default::default()
    };
    let (_, stats) = link_equity(&graph, &config).unwrap();

    assert_eq!(stats.iterations, 7);
    assert!(!stats.converged);
    assert_eq!(stats.totals.len(), 7);
}

#[test]
fn test_nofollow_does_not_pass_equity() {
    let mut nofollow = CrawlEdge::new(&url("/"), &url("/b"));
    nofollow.nofollow = true;
    let data = CrawlData {
        root_url: Some(url("/")),
        pages: vec![
            CrawlPage::new(&url("/"), 200),
            CrawlPage::new(&url("/a"), 200),
            CrawlPage::new(&url("/b"), 200),
        ],
        edges: vec![CrawlEdge::new(&url("/"), &url("/a")), nofollow],
    };
    let graph = SiteGraph::from_crawl(&data).unwrap();

    let (scores, _) = link_equity(&graph, &AnalysisConfig::default()).unwrap();
    assert!(scores[&node_id_for(&url("/b"))].abs() < 1e-12);

    let config = AnalysisConfig {
        nofollow_passes_equity: true,
        ..Default::default()
    };
    let (scores, _) = link_equity(&graph, &config).unwrap();
    assert!((scores[&node_id_for(&url("/b"))] - 0.5).abs() < 1e-12);
}

#[test]
fn test_compute_metrics_writes_equity() {
    let mut graph = sample_graph();
    let summary = compute_metrics(&mut graph, &AnalysisConfig::default()).unwrap();

    let total: f64 = graph.nodes().iter().map(|n| n.link_equity).sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert_eq!(summary.depth.reached, 4);
    assert_eq!(summary.depth.max_depth, 2);
    assert_eq!(summary.depth.orphans, 1);
}
