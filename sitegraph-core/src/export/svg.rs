use super::{GraphView, escape_xml, truncate_label};
use crate::error::{GraphError, Result};
use crate::model::{Node, Position, StatusCategory};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write;
use std::str::FromStr;
use uuid::Uuid;

const MARGIN: f64 = 60.0;
const LEGEND_ROW: f64 = 18.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorScheme {
    Status,
    Depth,
    Equity,
}

impl FromStr for ColorScheme {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "status" => Ok(ColorScheme::Status),
            "depth" => Ok(ColorScheme::Depth),
            "equity" => Ok(ColorScheme::Equity),
            _ => Err(GraphError::export_config(
                "color_scheme",
                s,
                "one of status, depth, equity",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SvgOptions {
    pub width: u32,
    pub height: u32,
    pub node_radius: f64,
    pub color_scheme: ColorScheme,
    pub show_labels: bool,
    pub label_length: usize,
    pub show_legend: bool,
    pub show_metadata: bool,
    pub title: Option<String>,
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
            node_radius: 8.0,
            color_scheme: ColorScheme::Status,
            show_labels: true,
            label_length: 24,
            show_legend: true,
            show_metadata: true,
            title: None,
        }
    }
}

impl SvgOptions {
    pub fn validate(&self) -> Result<()> {
        if !(200..=20_000).contains(&self.width) {
            return Err(GraphError::export_config("width", self.width, "200..=20000"));
        }
        if !(200..=20_000).contains(&self.height) {
            return Err(GraphError::export_config("height", self.height, "200..=20000"));
        }
        if !self.node_radius.is_finite() || self.node_radius <= 0.0 || self.node_radius > 50.0 {
            return Err(GraphError::export_config(
                "node_radius",
                self.node_radius,
                "a number in (0, 50]",
            ));
        }
        if self.label_length == 0 || self.label_length > 200 {
            return Err(GraphError::export_config(
                "label_length",
                self.label_length,
                "1..=200",
            ));
        }
        Ok(())
    }
}

pub fn status_color(status: StatusCategory) -> &'static str {
    match status {
        StatusCategory::Ok => "#22c55e",
        StatusCategory::Redirect => "#3b82f6",
        StatusCategory::ClientError => "#f97316",
        StatusCategory::ServerError => "#ef4444",
        StatusCategory::Timeout => "#6b7280",
        StatusCategory::Orphan => "#a855f7",
        StatusCategory::Deep => "#eab308",
    }
}

const DEPTH_COLORS: [&str; 6] = ["#1e3a8a", "#1d4ed8", "#2563eb", "#3b82f6", "#60a5fa", "#93c5fd"];
const EQUITY_COLORS: [&str; 5] = ["#fee2e2", "#fca5a5", "#f87171", "#dc2626", "#7f1d1d"];
const UNREACHED_COLOR: &str = "#9ca3af";
const EXTERNAL_COLOR: &str = "#d1d5db";

fn depth_color(depth: Option<u32>) -> &'static str {
    match depth {
        Some(d) => DEPTH_COLORS[(d as usize).min(DEPTH_COLORS.len() - 1)],
        None => UNREACHED_COLOR,
    }
}

fn equity_color(equity: f64, max_equity: f64) -> &'static str {
    if max_equity <= 0.0 {
        return EQUITY_COLORS[0];
    }
    let bucket = ((equity / max_equity) * (EQUITY_COLORS.len() - 1) as f64).round() as usize;
    EQUITY_COLORS[bucket.min(EQUITY_COLORS.len() - 1)]
}

/// Stored positions when every node has one, otherwise a layered layout
/// with one row per depth and unreached pages on the last row.
fn layout(view: &GraphView, options: &SvgOptions) -> HashMap<Uuid, Position> {
    if !view.nodes.is_empty() && view.nodes.iter().all(|n| n.position.is_some()) {
        return view
            .nodes
            .iter()
            .filter_map(|n| n.position.map(|p| (n.id, p)))
            .collect();
    }

    let mut layers: BTreeMap<u32, Vec<&Node>> = BTreeMap::new();
    for node in view.nodes_by_depth() {
        layers.entry(node.depth.unwrap_or(u32::MAX)).or_default().push(node);
    }

    let width = options.width as f64;
    // Leave the right-hand column for external domains
    let usable_width = width - 2.0 * MARGIN - 120.0;
    let usable_height = options.height as f64 - 2.0 * MARGIN;
    let row_gap = if layers.len() > 1 {
        usable_height / (layers.len() - 1) as f64
    } else {
        0.0
    };

    let mut positions = HashMap::new();
    for (row, nodes) in layers.values().enumerate() {
        let y = MARGIN + row as f64 * row_gap;
        let column_gap = usable_width / (nodes.len() + 1) as f64;
        for (col, node) in nodes.iter().enumerate() {
            let x = MARGIN + (col + 1) as f64 * column_gap;
            positions.insert(node.id, Position { x, y });
        }
    }
    positions
}

pub(crate) fn render(view: &GraphView, options: &SvgOptions) -> String {
    let positions = layout(view, options);
    let max_equity = view.nodes.iter().map(|n| n.link_equity).fold(0.0, f64::max);
    let r = options.node_radius;

    let external_domains: BTreeSet<&str> = view
        .links
        .iter()
        .filter_map(|l| l.external_domain())
        .collect();
    let external_gap = (options.height as f64 - 2.0 * MARGIN) / (external_domains.len() + 1) as f64;
    let external_positions: BTreeMap<&str, Position> = external_domains
        .iter()
        .enumerate()
        .map(|(i, domain)| {
            (
                *domain,
                Position {
                    x: options.width as f64 - MARGIN,
                    y: MARGIN + (i + 1) as f64 * external_gap,
                },
            )
        })
        .collect();

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" \
         viewBox=\"0 0 {w} {h}\" font-family=\"sans-serif\" font-size=\"11\">",
        w = options.width,
        h = options.height
    );

    if options.show_metadata {
        let _ = writeln!(
            svg,
            r#"  <metadata>{{"pages":{},"links":{},"color_scheme":"{}"}}</metadata>"#,
            view.nodes.len(),
            view.links.len(),
            scheme_name(options.color_scheme)
        );
    }
    if let Some(title) = &options.title {
        let _ = writeln!(svg, "  <title>{}</title>", escape_xml(title));
    }
    svg.push_str("  <rect width=\"100%\" height=\"100%\" fill=\"#ffffff\"/>\n");

    svg.push_str("  <g class=\"links\" stroke=\"#94a3b8\" stroke-width=\"1\">\n");
    for link in &view.links {
        let Some(from) = positions.get(&link.source) else {
            continue;
        };
        let to = match (link.target_node_id(), link.external_domain()) {
            (Some(target), _) => positions.get(&target).copied(),
            (None, Some(domain)) => external_positions.get(domain).copied(),
            _ => None,
        };
        let Some(to) = to else {
            continue;
        };
        let dash = if link.nofollow || link.is_external() {
            " stroke-dasharray=\"4 3\""
        } else {
            ""
        };
        let _ = writeln!(
            svg,
            "    <line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\"{}/>",
            from.x, from.y, to.x, to.y, dash
        );
    }
    svg.push_str("  </g>\n");

    svg.push_str("  <g class=\"nodes\">\n");
    for node in view.nodes_by_depth() {
        let Some(pos) = positions.get(&node.id) else {
            continue;
        };
        let fill = match options.color_scheme {
            ColorScheme::Status => status_color(node.status),
            ColorScheme::Depth => depth_color(node.depth),
            ColorScheme::Equity => equity_color(node.link_equity, max_equity),
        };
        let radius = if node.is_root { r * 1.5 } else { r };
        let _ = writeln!(
            svg,
            "    <circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"{:.1}\" fill=\"{}\" \
             stroke=\"#1f2937\"><title>{}</title></circle>",
            pos.x,
            pos.y,
            radius,
            fill,
            escape_xml(&node.url)
        );
        if options.show_labels {
            let _ = writeln!(
                svg,
                "    <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\">{}</text>",
                pos.x,
                pos.y + radius + 12.0,
                escape_xml(&truncate_label(node.label(), options.label_length))
            );
        }
    }
    for (domain, pos) in &external_positions {
        let _ = writeln!(
            svg,
            "    <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"{}\"/>",
            pos.x - r,
            pos.y - r,
            r * 2.0,
            r * 2.0,
            EXTERNAL_COLOR
        );
        if options.show_labels {
            let _ = writeln!(
                svg,
                "    <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\">{}</text>",
                pos.x - r - 4.0,
                pos.y + 4.0,
                escape_xml(domain)
            );
        }
    }
    svg.push_str("  </g>\n");

    if options.show_legend {
        render_legend(&mut svg, options);
    }

    svg.push_str("</svg>\n");
    svg
}

fn scheme_name(scheme: ColorScheme) -> &'static str {
    match scheme {
        ColorScheme::Status => "status",
        ColorScheme::Depth => "depth",
        ColorScheme::Equity => "equity",
    }
}

fn legend_entries(scheme: ColorScheme) -> Vec<(String, &'static str)> {
    match scheme {
        ColorScheme::Status => [
            StatusCategory::Ok,
            StatusCategory::Redirect,
            StatusCategory::ClientError,
            StatusCategory::ServerError,
            StatusCategory::Timeout,
            StatusCategory::Orphan,
            StatusCategory::Deep,
        ]
        .iter()
        .map(|s| (s.as_str().replace('_', " "), status_color(*s)))
        .collect(),
        ColorScheme::Depth => {
            let mut entries: Vec<(String, &'static str)> = DEPTH_COLORS
                .iter()
                .enumerate()
                .map(|(d, color)| {
                    let label = if d == DEPTH_COLORS.len() - 1 {
                        format!("depth {}+", d)
                    } else {
                        format!("depth {}", d)
                    };
                    (label, *color)
                })
                .collect();
            entries.push(("unreached".to_string(), UNREACHED_COLOR));
            entries
        }
        ColorScheme::Equity => vec![
            ("lowest equity".to_string(), EQUITY_COLORS[0]),
            ("highest equity".to_string(), EQUITY_COLORS[EQUITY_COLORS.len() - 1]),
        ],
    }
}

fn render_legend(svg: &mut String, options: &SvgOptions) {
    let entries = legend_entries(options.color_scheme);
    let top = options.height as f64 - MARGIN / 2.0 - entries.len() as f64 * LEGEND_ROW;

    svg.push_str("  <g class=\"legend\">\n");
    for (i, (label, color)) in entries.iter().enumerate() {
        let y = top + i as f64 * LEGEND_ROW;
        let _ = writeln!(
            svg,
            "    <circle cx=\"16\" cy=\"{:.1}\" r=\"5\" fill=\"{}\"/>\
             <text x=\"28\" y=\"{:.1}\">{}</text>",
            y,
            color,
            y + 4.0,
            escape_xml(label)
        );
    }
    svg.push_str("  </g>\n");
}
