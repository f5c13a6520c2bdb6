//! Site graph analysis: build a link graph from crawl data, compute depth,
//! link equity and issues, capture snapshots, diff them and export.

pub mod analysis;
pub mod config;
pub mod crawl;
pub mod diff;
pub mod error;
pub mod export;
pub mod graph;
pub mod issues;
pub mod metrics;
pub mod model;
pub mod report;
pub mod snapshot;
pub mod store;

use colored::Colorize;

pub use analysis::{AnalysisSummary, Analyzer, SeverityCounts, SiteAnalysis};
pub use config::AnalysisConfig;
pub use crawl::{CrawlData, CrawlEdge, CrawlPage};
pub use diff::{GraphDiff, diff_snapshots};
pub use error::{GraphError, InvalidGraphReason, Result};
pub use export::{Export, ExportConfig, ExportFilter, ExportFormat, export};
pub use graph::SiteGraph;
pub use model::{Issue, IssueKind, Link, LinkTarget, LinkType, Node, Severity, StatusCategory};
pub use snapshot::{Snapshot, SnapshotMetadata};

pub fn print_banner() {
    let banner = r#"
       _ _                                _
   ___(_) |_ ___  __ _ _ __ __ _ _ __ | |__
  / __| | __/ _ \/ _` | '__/ _` | '_ \| '_ \
  \__ \ | ||  __/ (_| | | | (_| | |_) | | | |
  |___/_|\__\___|\__, |_|  \__,_| .__/|_| |_|
                 |___/          |_|
"#;
    println!("{}", banner.bright_cyan().bold());
    println!(
        "  {} {}\n",
        "site architecture analysis".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black()
    );
}
