//! Analysis entry point: crawl data in, annotated graph and issues out.

use crate::config::AnalysisConfig;
use crate::crawl::CrawlData;
use crate::error::Result;
use crate::graph::SiteGraph;
use crate::issues::{apply_issue_counts, detect_issues, reconcile_issues};
use crate::metrics::{EquityStats, compute_metrics};
use crate::model::{Issue, Severity};
use crate::snapshot::SnapshotMetadata;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub serious: usize,
    pub moderate: usize,
    pub minor: usize,
}

impl SeverityCounts {
    /// Counts unresolved issues only
    pub fn from_issues<'a>(issues: impl IntoIterator<Item = &'a Issue>) -> Self {
        let mut counts = SeverityCounts::default();
        for issue in issues.into_iter().filter(|i| !i.resolved) {
            match issue.severity {
                Severity::Critical => counts.critical += 1,
                Severity::Serious => counts.serious += 1,
                Severity::Moderate => counts.moderate += 1,
                Severity::Minor => counts.minor += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.critical + self.serious + self.moderate + self.minor
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub root_url: String,
    pub totals: SnapshotMetadata,
    pub severity_counts: SeverityCounts,
    pub equity: EquityStats,
}

#[derive(Debug, Clone)]
pub struct SiteAnalysis {
    pub graph: SiteGraph,
    pub issues: Vec<Issue>,
    pub summary: AnalysisSummary,
}

pub struct Analyzer {
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Build the graph from crawl data and run every pass over it
    pub fn analyze(&self, data: &CrawlData) -> Result<SiteAnalysis> {
        let graph = SiteGraph::from_crawl(data)?;
        self.analyze_graph(graph)
    }

    /// Like [`Analyzer::analyze`], keeping manual resolutions from a previous
    /// run of the same project
    pub fn reanalyze(&self, data: &CrawlData, previous: &[Issue]) -> Result<SiteAnalysis> {
        let mut analysis = self.analyze(data)?;
        analysis.issues = reconcile_issues(previous, analysis.issues);
        apply_issue_counts(&mut analysis.graph, &analysis.issues);
        analysis.summary.totals = SnapshotMetadata::from_graph(&analysis.graph);
        analysis.summary.severity_counts = SeverityCounts::from_issues(&analysis.issues);
        Ok(analysis)
    }

    pub fn analyze_graph(&self, mut graph: SiteGraph) -> Result<SiteAnalysis> {
        let metrics = compute_metrics(&mut graph, &self.config)?;
        let issues = detect_issues(&mut graph, &self.config);

        let summary = AnalysisSummary {
            root_url: graph.root().map(|n| n.url.clone()).unwrap_or_default(),
            totals: SnapshotMetadata::from_graph(&graph),
            severity_counts: SeverityCounts::from_issues(&issues),
            equity: metrics.equity,
        };

        info!(
            "Analysis complete: {} pages, {} issues",
            summary.totals.node_count,
            summary.severity_counts.total()
        );

        Ok(SiteAnalysis {
            graph,
            issues,
            summary,
        })
    }
}
