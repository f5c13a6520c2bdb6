//! Graph exports: SVG, Mermaid, sitemap XML/HTML and a PDF data bundle.
//!
//! Every format takes an explicit options object. Options are validated
//! before any output is produced; out-of-range or unknown values fail with
//! [`GraphError::InvalidExportConfig`] instead of being clamped.

pub mod mermaid;
pub mod pdf;
pub mod sitemap;
pub mod svg;

use crate::error::{GraphError, Result};
use crate::graph::SiteGraph;
use crate::model::{Issue, Link, Node};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use uuid::Uuid;

pub use mermaid::{MermaidDiagram, MermaidDirection, MermaidOptions};
pub use pdf::{Orientation, PageSize, PdfBundle, PdfOptions};
pub use sitemap::{ChangeFrequency, SitemapOptions};
pub use svg::{ColorScheme, SvgOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportFormat {
    Svg,
    Mermaid,
    SitemapXml,
    SitemapHtml,
    PdfData,
}

impl FromStr for ExportFormat {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "svg" => Ok(ExportFormat::Svg),
            "mermaid" | "mmd" => Ok(ExportFormat::Mermaid),
            "sitemap-xml" | "sitemap" | "xml" => Ok(ExportFormat::SitemapXml),
            "sitemap-html" | "html" => Ok(ExportFormat::SitemapHtml),
            "pdf-data" | "pdf" => Ok(ExportFormat::PdfData),
            _ => Err(GraphError::export_config(
                "format",
                s,
                "one of svg, mermaid, sitemap-xml, sitemap-html, pdf-data",
            )),
        }
    }
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Svg => "svg",
            ExportFormat::Mermaid => "mermaid",
            ExportFormat::SitemapXml => "sitemap-xml",
            ExportFormat::SitemapHtml => "sitemap-html",
            ExportFormat::PdfData => "pdf-data",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Svg => "image/svg+xml",
            ExportFormat::Mermaid => "text/plain",
            ExportFormat::SitemapXml => "application/xml",
            ExportFormat::SitemapHtml => "text/html",
            ExportFormat::PdfData => "application/json",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Svg => "svg",
            ExportFormat::Mermaid => "mmd",
            ExportFormat::SitemapXml => "xml",
            ExportFormat::SitemapHtml => "html",
            ExportFormat::PdfData => "json",
        }
    }
}

/// Which parts of the graph make it into an export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportFilter {
    /// Drop pages that failed (4xx, 5xx, timeout) and broken links
    pub exclude_errors: bool,
    pub exclude_external: bool,
}

/// Format plus its options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "options", rename_all = "kebab-case")]
pub enum ExportConfig {
    Svg(SvgOptions),
    Mermaid(MermaidOptions),
    SitemapXml(SitemapOptions),
    SitemapHtml(SitemapOptions),
    PdfData(PdfOptions),
}

impl ExportConfig {
    pub fn default_for(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Svg => ExportConfig::Svg(SvgOptions::default()),
            ExportFormat::Mermaid => ExportConfig::Mermaid(MermaidOptions::default()),
            ExportFormat::SitemapXml => ExportConfig::SitemapXml(SitemapOptions::default()),
            ExportFormat::SitemapHtml => ExportConfig::SitemapHtml(SitemapOptions::default()),
            ExportFormat::PdfData => ExportConfig::PdfData(PdfOptions::default()),
        }
    }

    /// Parse the options object for a format. Missing fields take defaults.
    pub fn from_json(format: ExportFormat, json: &str) -> Result<Self> {
        let invalid = |e: serde_json::Error| {
            GraphError::export_config(format.as_str(), e, "valid options for this format")
        };

        let config = match format {
            ExportFormat::Svg => ExportConfig::Svg(serde_json::from_str(json).map_err(invalid)?),
            ExportFormat::Mermaid => {
                ExportConfig::Mermaid(serde_json::from_str(json).map_err(invalid)?)
            }
            ExportFormat::SitemapXml => {
                ExportConfig::SitemapXml(serde_json::from_str(json).map_err(invalid)?)
            }
            ExportFormat::SitemapHtml => {
                ExportConfig::SitemapHtml(serde_json::from_str(json).map_err(invalid)?)
            }
            ExportFormat::PdfData => {
                ExportConfig::PdfData(serde_json::from_str(json).map_err(invalid)?)
            }
        };

        config.validate()?;
        Ok(config)
    }

    pub fn format(&self) -> ExportFormat {
        match self {
            ExportConfig::Svg(_) => ExportFormat::Svg,
            ExportConfig::Mermaid(_) => ExportFormat::Mermaid,
            ExportConfig::SitemapXml(_) => ExportFormat::SitemapXml,
            ExportConfig::SitemapHtml(_) => ExportFormat::SitemapHtml,
            ExportConfig::PdfData(_) => ExportFormat::PdfData,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            ExportConfig::Svg(options) => options.validate(),
            ExportConfig::Mermaid(options) => options.validate(),
            ExportConfig::SitemapXml(options) | ExportConfig::SitemapHtml(options) => {
                options.validate()
            }
            ExportConfig::PdfData(options) => options.validate(),
        }
    }
}

/// A rendered export
#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub format: ExportFormat,
    pub content: String,
}

impl Export {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn file_name(&self, stem: &str) -> String {
        format!("{}.{}", stem, self.format.extension())
    }
}

/// Render the graph in the configured format.
///
/// Issues feed the recommendations of the PDF bundle and are ignored by
/// the other formats.
pub fn export(
    graph: &SiteGraph,
    issues: &[Issue],
    filter: &ExportFilter,
    config: &ExportConfig,
) -> Result<Export> {
    config.validate()?;
    let view = GraphView::new(graph, filter);

    let content = match config {
        ExportConfig::Svg(options) => svg::render(&view, options),
        ExportConfig::Mermaid(options) => mermaid::render(&view, options),
        ExportConfig::SitemapXml(options) => sitemap::render_xml(&view, options),
        ExportConfig::SitemapHtml(options) => sitemap::render_html(&view, options),
        ExportConfig::PdfData(options) => {
            let issues: Vec<&Issue> = issues
                .iter()
                .filter(|issue| view.is_visible(issue.node_id))
                .collect();
            let bundle = pdf::build_bundle(&view, &issues, options);
            serde_json::to_string_pretty(&bundle)?
        }
    };

    Ok(Export {
        format: config.format(),
        content,
    })
}

/// Filtered, read-only view over a graph
pub(crate) struct GraphView<'a> {
    pub graph: &'a SiteGraph,
    pub nodes: Vec<&'a Node>,
    pub links: Vec<&'a Link>,
    visible: HashSet<Uuid>,
}

impl<'a> GraphView<'a> {
    fn new(graph: &'a SiteGraph, filter: &ExportFilter) -> Self {
        let nodes: Vec<&Node> = graph
            .nodes()
            .iter()
            .filter(|n| !(filter.exclude_errors && n.http_category().is_error()))
            .collect();
        let visible: HashSet<Uuid> = nodes.iter().map(|n| n.id).collect();

        let links = graph
            .links()
            .iter()
            .filter(|l| visible.contains(&l.source))
            .filter(|l| match l.target_node_id() {
                Some(target) => visible.contains(&target),
                None if l.is_external() => !filter.exclude_external,
                None => !filter.exclude_errors,
            })
            .collect();

        Self {
            graph,
            nodes,
            links,
            visible,
        }
    }

    pub fn is_visible(&self, id: Uuid) -> bool {
        self.visible.contains(&id)
    }

    /// Nodes ordered by depth (unreached last), then URL
    pub fn nodes_by_depth(&self) -> Vec<&'a Node> {
        let mut nodes = self.nodes.clone();
        nodes.sort_by(|a, b| {
            let da = a.depth.unwrap_or(u32::MAX);
            let db = b.depth.unwrap_or(u32::MAX);
            da.cmp(&db).then_with(|| a.url.cmp(&b.url))
        });
        nodes
    }

    /// BFS-tree parent: the first visible linking page one level up
    pub fn tree_parent(&self, node: &Node) -> Option<&'a Node> {
        let depth = node.depth?;
        if depth == 0 {
            return None;
        }
        self.graph
            .inbound(node.id)
            .filter_map(|link| self.graph.node(link.source))
            .find(|source| source.depth == Some(depth - 1) && self.is_visible(source.id))
    }
}

pub(crate) fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Collapse whitespace runs (line breaks included) to single spaces and cut
/// the label to `max` characters, marking the cut with an ellipsis
pub fn truncate_label(label: &str, max: usize) -> String {
    let label = label.split_whitespace().collect::<Vec<_>>().join(" ");
    if label.chars().count() <= max {
        label
    } else {
        let mut truncated: String = label.chars().take(max).collect();
        truncated.push('…');
        truncated
    }
}
