//! Structured data for a printable site architecture report.
//!
//! The bundle is laid out section by section so a renderer only has to
//! paginate it; no layout decisions beyond page geometry are made here.

use super::GraphView;
use crate::analysis::SeverityCounts;
use crate::error::{GraphError, Result};
use crate::model::{Issue, IssueKind, Node, Severity};
use crate::snapshot::SnapshotMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

const TOP_PAGES: usize = 10;
const RECOMMENDATION_EXAMPLES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSize {
    A4,
    Letter,
    Legal,
    A3,
}

impl PageSize {
    /// Portrait dimensions in millimetres
    pub fn dimensions_mm(&self) -> (f64, f64) {
        match self {
            PageSize::A4 => (210.0, 297.0),
            PageSize::Letter => (215.9, 279.4),
            PageSize::Legal => (215.9, 355.6),
            PageSize::A3 => (297.0, 420.0),
        }
    }
}

impl FromStr for PageSize {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "a4" => Ok(PageSize::A4),
            "letter" => Ok(PageSize::Letter),
            "legal" => Ok(PageSize::Legal),
            "a3" => Ok(PageSize::A3),
            _ => Err(GraphError::export_config(
                "page_size",
                s,
                "one of a4, letter, legal, a3",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl FromStr for Orientation {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            _ => Err(GraphError::export_config(
                "orientation",
                s,
                "portrait or landscape",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PdfOptions {
    pub page_size: PageSize,
    pub orientation: Orientation,
    pub title: String,
    pub include_cover: bool,
    pub include_toc: bool,
    pub include_stats: bool,
    pub include_inventory: bool,
    pub include_recommendations: bool,
    pub max_inventory_rows: usize,
    /// Fixed timestamp for the cover page; now when unset
    pub generated_at: Option<DateTime<Utc>>,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            orientation: Orientation::Portrait,
            title: "Site Architecture Report".to_string(),
            include_cover: true,
            include_toc: true,
            include_stats: true,
            include_inventory: true,
            include_recommendations: true,
            max_inventory_rows: 500,
            generated_at: None,
        }
    }
}

impl PdfOptions {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(GraphError::export_config("title", "\"\"", "a non-empty title"));
        }
        if self.max_inventory_rows == 0 || self.max_inventory_rows > 10_000 {
            return Err(GraphError::export_config(
                "max_inventory_rows",
                self.max_inventory_rows,
                "1..=10000",
            ));
        }
        let any_section = self.include_cover
            || self.include_toc
            || self.include_stats
            || self.include_inventory
            || self.include_recommendations;
        if !any_section {
            return Err(GraphError::export_config(
                "include_*",
                "all false",
                "at least one enabled section",
            ));
        }
        Ok(())
    }

    /// Page width and height in millimetres after orientation
    pub fn page_dimensions_mm(&self) -> (f64, f64) {
        let (w, h) = self.page_size.dimensions_mm();
        match self.orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSetup {
    pub size: PageSize,
    pub orientation: Orientation,
    pub width_mm: f64,
    pub height_mm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverSection {
    pub title: String,
    pub site: String,
    pub generated_at: DateTime<Utc>,
    pub page_count: usize,
    pub issue_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocEntry {
    pub number: usize,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopPage {
    pub url: String,
    pub label: String,
    pub link_equity: f64,
    pub inbound_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSection {
    pub totals: SnapshotMetadata,
    pub severity_counts: SeverityCounts,
    pub top_pages: Vec<TopPage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRow {
    pub id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub http_status: Option<u16>,
    pub status: String,
    pub depth: Option<u32>,
    pub inbound_count: usize,
    pub outbound_count: usize,
    pub link_equity: f64,
    pub issue_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySection {
    pub total_pages: usize,
    /// True when rows were cut at `max_inventory_rows`
    pub truncated: bool,
    pub rows: Vec<InventoryRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: IssueKind,
    pub severity: Severity,
    pub affected_pages: usize,
    pub recommendation: String,
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfBundle {
    pub page: PageSetup,
    pub cover: Option<CoverSection>,
    pub table_of_contents: Option<Vec<TocEntry>>,
    pub stats: Option<StatsSection>,
    pub inventory: Option<InventorySection>,
    pub recommendations: Option<Vec<Recommendation>>,
}

pub(crate) fn build_bundle(view: &GraphView, issues: &[&Issue], options: &PdfOptions) -> PdfBundle {
    let (width_mm, height_mm) = options.page_dimensions_mm();
    let nodes: Vec<Node> = view.nodes.iter().map(|n| (*n).clone()).collect();
    let links: Vec<_> = view.links.iter().map(|l| (*l).clone()).collect();
    let totals = SnapshotMetadata::from_parts(&nodes, &links);
    let unresolved = issues.iter().filter(|i| !i.resolved).count();

    let cover = options.include_cover.then(|| CoverSection {
        title: options.title.clone(),
        site: view
            .graph
            .root()
            .map(|r| r.url.clone())
            .unwrap_or_default(),
        generated_at: options.generated_at.unwrap_or_else(Utc::now),
        page_count: view.nodes.len(),
        issue_count: unresolved,
    });

    let stats = options.include_stats.then(|| StatsSection {
        totals,
        severity_counts: SeverityCounts::from_issues(issues.iter().copied()),
        top_pages: top_pages(view),
    });

    let inventory = options
        .include_inventory
        .then(|| inventory(view, options.max_inventory_rows));

    let recommendations = options
        .include_recommendations
        .then(|| recommendations(view, issues));

    let table_of_contents = options.include_toc.then(|| {
        [
            (stats.is_some(), "Site Statistics"),
            (inventory.is_some(), "Page Inventory"),
            (recommendations.is_some(), "Recommendations"),
        ]
        .iter()
        .filter(|(present, _)| *present)
        .enumerate()
        .map(|(i, (_, title))| TocEntry {
            number: i + 1,
            title: title.to_string(),
        })
        .collect()
    });

    PdfBundle {
        page: PageSetup {
            size: options.page_size,
            orientation: options.orientation,
            width_mm,
            height_mm,
        },
        cover,
        table_of_contents,
        stats,
        inventory,
        recommendations,
    }
}

fn top_pages(view: &GraphView) -> Vec<TopPage> {
    let mut nodes = view.nodes.clone();
    nodes.sort_by(|a, b| {
        b.link_equity
            .total_cmp(&a.link_equity)
            .then_with(|| a.url.cmp(&b.url))
    });
    nodes
        .into_iter()
        .take(TOP_PAGES)
        .map(|n| TopPage {
            url: n.url.clone(),
            label: n.label().to_string(),
            link_equity: n.link_equity,
            inbound_count: n.inbound_count,
        })
        .collect()
}

fn inventory(view: &GraphView, max_rows: usize) -> InventorySection {
    let nodes = view.nodes_by_depth();
    let rows = nodes
        .iter()
        .take(max_rows)
        .map(|n| InventoryRow {
            id: n.id,
            url: n.url.clone(),
            title: n.title.clone(),
            http_status: n.http_status,
            status: n.status.as_str().to_string(),
            depth: n.depth,
            inbound_count: n.inbound_count,
            outbound_count: n.outbound_count,
            link_equity: n.link_equity,
            issue_count: n.issue_count,
        })
        .collect();

    InventorySection {
        total_pages: nodes.len(),
        truncated: nodes.len() > max_rows,
        rows,
    }
}

/// One entry per issue kind, most severe first
fn recommendations(view: &GraphView, issues: &[&Issue]) -> Vec<Recommendation> {
    let mut by_kind: BTreeMap<(Severity, IssueKind), Vec<&Issue>> = BTreeMap::new();
    for issue in issues.iter().copied().filter(|i| !i.resolved) {
        by_kind
            .entry((issue.severity, issue.kind))
            .or_default()
            .push(issue);
    }

    by_kind
        .into_iter()
        .map(|((severity, kind), group)| {
            let mut pages: Vec<Uuid> = group.iter().map(|i| i.node_id).collect();
            pages.sort();
            pages.dedup();

            let mut examples: Vec<String> = pages
                .iter()
                .filter_map(|id| view.graph.node(*id))
                .map(|n| n.url.clone())
                .collect();
            examples.sort();
            examples.truncate(RECOMMENDATION_EXAMPLES);

            Recommendation {
                kind,
                severity,
                affected_pages: pages.len(),
                recommendation: group[0].recommendation.clone(),
                examples,
            }
        })
        .collect()
}
