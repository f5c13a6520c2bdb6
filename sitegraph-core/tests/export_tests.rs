// Tests for graph exports

use chrono::{TimeZone, Utc};
use sitegraph_core::analysis::{Analyzer, SiteAnalysis};
use sitegraph_core::config::AnalysisConfig;
use sitegraph_core::crawl::{CrawlData, CrawlEdge, CrawlPage};
use sitegraph_core::error::GraphError;
use sitegraph_core::export::sitemap::priority;
use sitegraph_core::export::{
    ColorScheme, ExportConfig, ExportFilter, ExportFormat, MermaidDiagram, MermaidDirection,
    MermaidOptions, Orientation, PageSize, PdfBundle, PdfOptions, SitemapOptions, SvgOptions,
    export, truncate_label,
};
use sitegraph_core::model::{IssueKind, Position};

fn url(path: &str) -> String {
    format!("https://example.com{}", path)
}

fn page(path: &str, status: u16, title: &str) -> CrawlPage {
    let mut page = CrawlPage::new(&url(path), status);
    page.title = Some(title.to_string());
    page.word_count = 600;
    page.crawled_at = Some(Utc.with_ymd_and_hms(2024, 5, 17, 9, 30, 0).unwrap());
    page
}

/// Home links to a product page, a failing page and an external site.
/// The blog is never linked.
fn sample_analysis() -> SiteAnalysis {
    let data = CrawlData {
        root_url: Some(url("/")),
        pages: vec![
            page("/", 200, "Home"),
            page("/products/widgets", 200, "A very long page title for testing"),
            page("/gone", 404, "Gone"),
            page("/blog", 200, "Blog"),
        ],
        edges: vec![
            CrawlEdge::new(&url("/"), &url("/products/widgets")),
            CrawlEdge::new(&url("/"), &url("/gone")),
            CrawlEdge::new(&url("/"), "https://partner.org/"),
        ],
    };
    Analyzer::new(AnalysisConfig::default())
        .unwrap()
        .analyze(&data)
        .unwrap()
}

fn render(analysis: &SiteAnalysis, filter: &ExportFilter, config: ExportConfig) -> String {
    export(&analysis.graph, &analysis.issues, filter, &config)
        .unwrap()
        .content
}

fn analyze(pages: Vec<CrawlPage>, edges: Vec<CrawlEdge>) -> SiteAnalysis {
    let data = CrawlData {
        root_url: Some(url("/")),
        pages,
        edges,
    };
    Analyzer::new(AnalysisConfig::default())
        .unwrap()
        .analyze(&data)
        .unwrap()
}

fn is_invalid_config<T: std::fmt::Debug>(result: Result<T, GraphError>) -> bool {
    matches!(result, Err(GraphError::InvalidExportConfig { .. }))
}

/// Text between `["` and `"]` on each flowchart node line
fn flow_labels(mermaid: &str) -> Vec<String> {
    mermaid
        .lines()
        .filter_map(|line| {
            let start = line.find("[\"")? + 2;
            let end = line.rfind("\"]")?;
            Some(line[start..end].to_string())
        })
        .collect()
}

// ============================================================================
// Format and Option Parsing Tests
// ============================================================================

#[test]
fn test_export_format_from_str() {
    assert_eq!("svg".parse::<ExportFormat>().unwrap(), ExportFormat::Svg);
    assert_eq!(
        "sitemap-xml".parse::<ExportFormat>().unwrap(),
        ExportFormat::SitemapXml
    );
    assert_eq!("PDF-DATA".parse::<ExportFormat>().unwrap(), ExportFormat::PdfData);
    assert!(is_invalid_config("png".parse::<ExportFormat>()));
}

#[test]
fn test_option_enums_from_str() {
    assert_eq!("lr".parse::<MermaidDirection>().unwrap(), MermaidDirection::LR);
    assert_eq!("mindmap".parse::<MermaidDiagram>().unwrap(), MermaidDiagram::Mindmap);
    assert_eq!("Equity".parse::<ColorScheme>().unwrap(), ColorScheme::Equity);
    assert_eq!("letter".parse::<PageSize>().unwrap(), PageSize::Letter);
    assert_eq!("landscape".parse::<Orientation>().unwrap(), Orientation::Landscape);

    assert!(is_invalid_config("up".parse::<MermaidDirection>()));
    assert!(is_invalid_config("rainbow".parse::<ColorScheme>()));
    assert!(is_invalid_config("b5".parse::<PageSize>()));
}

#[test]
fn test_from_json_fills_defaults() {
    let config = ExportConfig::from_json(ExportFormat::Mermaid, r#"{"direction": "LR"}"#).unwrap();
    match config {
        ExportConfig::Mermaid(options) => {
            assert_eq!(options.direction, MermaidDirection::LR);
            assert_eq!(options.max_label_length, 40);
            assert_eq!(options.diagram, MermaidDiagram::Flowchart);
        }
        other => panic!("unexpected config {:?}", other),
    }
}

#[test]
fn test_from_json_rejects_unknown_field() {
    assert!(is_invalid_config(ExportConfig::from_json(
        ExportFormat::Svg,
        r#"{"widht": 900}"#
    )));
}

#[test]
fn test_from_json_rejects_unknown_value() {
    assert!(is_invalid_config(ExportConfig::from_json(
        ExportFormat::Mermaid,
        r#"{"direction": "XY"}"#
    )));
}

#[test]
fn test_from_json_rejects_out_of_range() {
    assert!(is_invalid_config(ExportConfig::from_json(
        ExportFormat::Mermaid,
        r#"{"max_label_length": 0}"#
    )));
    assert!(is_invalid_config(ExportConfig::from_json(
        ExportFormat::Svg,
        r#"{"width": 50}"#
    )));
    assert!(is_invalid_config(ExportConfig::from_json(
        ExportFormat::SitemapXml,
        r#"{"max_priority": 1.5}"#
    )));
    assert!(is_invalid_config(ExportConfig::from_json(
        ExportFormat::SitemapXml,
        r#"{"min_priority": 0.8, "max_priority": 0.5}"#
    )));
    assert!(is_invalid_config(ExportConfig::from_json(
        ExportFormat::PdfData,
        r#"{"title": "  "}"#
    )));
}

#[test]
fn test_export_rejects_invalid_options_without_clamping() {
    let analysis = sample_analysis();
    let config = ExportConfig::Svg(SvgOptions {
        node_radius: -3.0,
        ..Default::default()
    });
    let result = export(
        &analysis.graph,
        &analysis.issues,
        &ExportFilter::default(),
        &config,
    );
    assert!(is_invalid_config(result));
}

#[test]
fn test_pdf_requires_a_section() {
    let options = PdfOptions {
        include_cover: false,
        include_toc: false,
        include_stats: false,
        include_inventory: false,
        include_recommendations: false,
        ..Default::default()
    };
    assert!(is_invalid_config(options.validate()));
}

// ============================================================================
// Mermaid Tests
// ============================================================================

#[test]
fn test_truncate_label() {
    assert_eq!(truncate_label("short", 10), "short");
    assert_eq!(truncate_label("exactly10!", 10), "exactly10!");
    assert_eq!(truncate_label("A very long title", 6), "A very…");
    assert_eq!(truncate_label("  Products\n\tAll items ", 40), "Products All items");
    assert_eq!(truncate_label("Products\r\nAll items", 10), "Products A…");
}

#[test]
fn test_mermaid_labels_truncated() {
    let analysis = sample_analysis();
    let output = render(
        &analysis,
        &ExportFilter::default(),
        ExportConfig::Mermaid(MermaidOptions {
            max_label_length: 10,
            ..Default::default()
        }),
    );

    assert!(output.starts_with("flowchart TD\n"));
    let labels = flow_labels(&output);
    assert_eq!(labels.len(), 4);
    for label in &labels {
        let chars = label.chars().count();
        assert!(chars <= 11, "label too long: {}", label);
        if chars == 11 {
            assert!(label.ends_with('…'));
        }
    }
    assert!(labels.contains(&"A very lon…".to_string()));
}

#[test]
fn test_mermaid_edges_and_external() {
    let analysis = sample_analysis();
    let output = render(
        &analysis,
        &ExportFilter::default(),
        ExportConfig::Mermaid(MermaidOptions {
            include_external: true,
            ..Default::default()
        }),
    );

    assert!(output.contains("x0([\"partner.org\"])"));
    assert!(output.contains("n0 --> x0"));
    assert_eq!(output.matches("-->").count(), 3);
}

#[test]
fn test_mermaid_group_by_depth() {
    let analysis = sample_analysis();
    let output = render(
        &analysis,
        &ExportFilter::default(),
        ExportConfig::Mermaid(MermaidOptions {
            group_by_depth: true,
            direction: MermaidDirection::LR,
            ..Default::default()
        }),
    );

    assert!(output.starts_with("flowchart LR\n"));
    assert!(output.contains("subgraph depth_0[\"Depth 0\"]"));
    assert!(output.contains("subgraph depth_1[\"Depth 1\"]"));
    assert!(output.contains("subgraph unreached[\"Unreached\"]"));
    assert_eq!(output.matches("    end\n").count(), 3);
}

#[test]
fn test_mermaid_mindmap() {
    let analysis = sample_analysis();
    let output = render(
        &analysis,
        &ExportFilter::default(),
        ExportConfig::Mermaid(MermaidOptions {
            diagram: MermaidDiagram::Mindmap,
            ..Default::default()
        }),
    );

    assert!(output.starts_with("mindmap\n  root((Home))\n"));
    assert!(output.contains("    Unreached\n      Blog\n"));
}

#[test]
fn test_mermaid_multiline_titles_stay_on_one_line() {
    let analysis = analyze(
        vec![page("/", 200, "Home"), page("/products", 200, "Products\nAll items")],
        vec![CrawlEdge::new(&url("/"), &url("/products"))],
    );

    let mindmap = render(
        &analysis,
        &ExportFilter::default(),
        ExportConfig::Mermaid(MermaidOptions {
            diagram: MermaidDiagram::Mindmap,
            ..Default::default()
        }),
    );
    assert_eq!(mindmap, "mindmap\n  root((Home))\n    Products All items\n");
    assert!(!mindmap.lines().any(|line| line.trim_start().starts_with("All items")));

    let flowchart = render(
        &analysis,
        &ExportFilter::default(),
        ExportConfig::Mermaid(MermaidOptions {
            max_label_length: 10,
            ..Default::default()
        }),
    );
    let labels = flow_labels(&flowchart);
    assert!(labels.contains(&"Products A…".to_string()));
    assert!(labels.iter().all(|label| !label.contains('\n')));
    assert_eq!(flowchart.lines().filter(|l| l.contains("[\"")).count(), 2);
}

#[test]
fn test_export_filters() {
    let analysis = sample_analysis();
    let filter = ExportFilter {
        exclude_errors: true,
        exclude_external: true,
    };
    let output = render(
        &analysis,
        &filter,
        ExportConfig::Mermaid(MermaidOptions {
            include_external: true,
            ..Default::default()
        }),
    );

    assert_eq!(flow_labels(&output).len(), 3);
    assert!(!output.contains("Gone"));
    assert!(!output.contains("partner.org"));
    assert_eq!(output.matches("-->").count(), 1);
}

// ============================================================================
// SVG Tests
// ============================================================================

#[test]
fn test_svg_document() {
    let analysis = sample_analysis();
    let output = render(
        &analysis,
        &ExportFilter::default(),
        ExportConfig::Svg(SvgOptions {
            title: Some("Example <site>".to_string()),
            ..Default::default()
        }),
    );

    assert!(output.starts_with("<svg "));
    assert!(output.trim_end().ends_with("</svg>"));
    let metadata = r#"<metadata>{"pages":4,"links":3,"color_scheme":"status"}</metadata>"#;
    assert!(output.contains(metadata));
    assert!(output.contains("<title>Example &lt;site&gt;</title>"));
    assert!(output.contains("<title>https://example.com/blog</title>"));
    assert!(output.contains("class=\"legend\""));
}

#[test]
fn test_svg_without_extras() {
    let analysis = sample_analysis();
    let output = render(
        &analysis,
        &ExportFilter::default(),
        ExportConfig::Svg(SvgOptions {
            show_labels: false,
            show_legend: false,
            show_metadata: false,
            color_scheme: ColorScheme::Depth,
            ..Default::default()
        }),
    );

    assert!(!output.contains("<metadata>"));
    assert!(!output.contains("<text"));
    assert_eq!(output.matches("<circle ").count(), 4);
    assert!(!output.contains("class=\"legend\""));
}

#[test]
fn test_svg_uses_stored_positions() {
    let mut analysis = sample_analysis();
    let ids: Vec<_> = analysis.graph.nodes().iter().map(|n| n.id).collect();
    for (i, id) in ids.iter().enumerate() {
        let position = Position {
            x: 100.0 + i as f64 * 50.0,
            y: 300.0,
        };
        assert!(analysis.graph.set_position(*id, position));
    }

    let output = render(
        &analysis,
        &ExportFilter::default(),
        ExportConfig::Svg(SvgOptions::default()),
    );
    for i in 0..ids.len() {
        let expected = format!("<circle cx=\"{:.1}\" cy=\"300.0\"", 100.0 + i as f64 * 50.0);
        assert!(output.contains(&expected), "missing {}", expected);
    }
}

// ============================================================================
// Sitemap Tests
// ============================================================================

#[test]
fn test_sitemap_xml_lists_successful_pages() {
    let analysis = sample_analysis();
    let output = render(
        &analysis,
        &ExportFilter::default(),
        ExportConfig::SitemapXml(SitemapOptions::default()),
    );

    assert!(output.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(output.contains("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">"));
    assert_eq!(output.matches("<url>").count(), 3);
    assert!(output.contains("<loc>https://example.com/</loc>"));
    assert!(!output.contains("/gone"));
    assert!(output.contains("<lastmod>2024-05-17</lastmod>"));
    assert!(output.contains("<priority>1.0</priority>"));
    assert!(!output.contains("<changefreq>"));
}

#[test]
fn test_sitemap_max_urls() {
    let analysis = sample_analysis();
    let output = render(
        &analysis,
        &ExportFilter::default(),
        ExportConfig::SitemapXml(SitemapOptions {
            max_urls: 1,
            include_lastmod: false,
            ..Default::default()
        }),
    );

    assert_eq!(output.matches("<url>").count(), 1);
    assert!(!output.contains("<lastmod>"));
}

#[test]
fn test_sitemap_priority() {
    let analysis = sample_analysis();
    let options = SitemapOptions::default();

    let root = analysis.graph.root().unwrap();
    assert_eq!(priority(root, 0.5, &options), 1.0);

    let widgets = analysis.graph.node_by_url(&url("/products/widgets")).unwrap();
    assert!((priority(widgets, widgets.link_equity, &options) - 1.0).abs() < 1e-9);
    assert_eq!(priority(widgets, 0.0, &options), options.min_priority);
}

#[test]
fn test_sitemap_html_nests_paths() {
    let analysis = sample_analysis();
    let output = render(
        &analysis,
        &ExportFilter::default(),
        ExportConfig::SitemapHtml(SitemapOptions::default()),
    );

    assert!(output.contains("<title>Sitemap: Home</title>"));
    assert!(output.contains("<li>products/"));
    assert!(output.contains("<a href=\"https://example.com/products/widgets\">"));
    assert!(output.contains("<a href=\"https://example.com/blog\">Blog</a>"));
    assert!(!output.contains("/gone"));
}

#[test]
fn test_sitemap_html_keeps_pages_sharing_a_path() {
    let analysis = analyze(
        vec![
            page("/", 200, "Home"),
            page("/p?id=1", 200, "One"),
            page("/p?id=2", 200, "Two"),
        ],
        vec![
            CrawlEdge::new(&url("/"), &url("/p?id=1")),
            CrawlEdge::new(&url("/"), &url("/p?id=2")),
        ],
    );

    let xml = render(
        &analysis,
        &ExportFilter::default(),
        ExportConfig::SitemapXml(SitemapOptions::default()),
    );
    let html = render(
        &analysis,
        &ExportFilter::default(),
        ExportConfig::SitemapHtml(SitemapOptions::default()),
    );

    assert_eq!(xml.matches("<loc>").count(), 3);
    assert_eq!(html.matches("<a href=").count(), 3);
    assert!(html.contains("<li><a href=\"https://example.com/p?id=1\">One</a></li>"));
    assert!(html.contains("<li><a href=\"https://example.com/p?id=2\">Two</a></li>"));
}

// ============================================================================
// PDF Bundle Tests
// ============================================================================

#[test]
fn test_pdf_bundle_sections() {
    let analysis = sample_analysis();
    let generated_at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let output = render(
        &analysis,
        &ExportFilter::default(),
        ExportConfig::PdfData(PdfOptions {
            generated_at: Some(generated_at),
            ..Default::default()
        }),
    );
    let bundle: PdfBundle = serde_json::from_str(&output).unwrap();

    assert_eq!(bundle.page.width_mm, 210.0);
    assert_eq!(bundle.page.height_mm, 297.0);

    let cover = bundle.cover.unwrap();
    assert_eq!(cover.site, url("/"));
    assert_eq!(cover.generated_at, generated_at);
    assert_eq!(cover.page_count, 4);

    let toc: Vec<String> = bundle
        .table_of_contents
        .unwrap()
        .into_iter()
        .map(|e| e.title)
        .collect();
    assert_eq!(toc, vec!["Site Statistics", "Page Inventory", "Recommendations"]);

    let inventory = bundle.inventory.unwrap();
    assert_eq!(inventory.total_pages, 4);
    assert!(!inventory.truncated);
    assert_eq!(inventory.rows[0].url, url("/"));

    let recommendations = bundle.recommendations.unwrap();
    assert_eq!(recommendations[0].kind, IssueKind::BrokenLink);
    assert!(recommendations.iter().any(|r| r.kind == IssueKind::Orphan));
}

#[test]
fn test_pdf_bundle_toggles() {
    let analysis = sample_analysis();
    let output = render(
        &analysis,
        &ExportFilter::default(),
        ExportConfig::PdfData(PdfOptions {
            page_size: PageSize::Letter,
            orientation: Orientation::Landscape,
            include_cover: false,
            include_stats: false,
            max_inventory_rows: 2,
            ..Default::default()
        }),
    );
    let bundle: PdfBundle = serde_json::from_str(&output).unwrap();

    assert_eq!(bundle.page.width_mm, 279.4);
    assert_eq!(bundle.page.height_mm, 215.9);
    assert!(bundle.cover.is_none());
    assert!(bundle.stats.is_none());

    let toc = bundle.table_of_contents.unwrap();
    assert_eq!(toc.len(), 2);
    assert_eq!(toc[0].number, 1);
    assert_eq!(toc[0].title, "Page Inventory");

    let inventory = bundle.inventory.unwrap();
    assert!(inventory.truncated);
    assert_eq!(inventory.rows.len(), 2);
}

#[test]
fn test_export_file_name() {
    let analysis = sample_analysis();
    let result = export(
        &analysis.graph,
        &analysis.issues,
        &ExportFilter::default(),
        &ExportConfig::default_for(ExportFormat::Mermaid),
    )
    .unwrap();

    assert_eq!(result.format, ExportFormat::Mermaid);
    assert_eq!(result.file_name("site"), "site.mmd");
    assert_eq!(result.mime_type(), "text/plain");
}
