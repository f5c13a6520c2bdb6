// Report generation from analysis results and snapshot diffs

use crate::analysis::SiteAnalysis;
use crate::diff::GraphDiff;
use crate::model::{Issue, Node};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const HEAVY_RULE: &str =
    "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
const LIGHT_RULE: &str =
    "────────────────────────────────────────────────────────────────────────────────\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

fn section(report: &mut String, title: &str) {
    report.push_str(HEAVY_RULE);
    report.push_str(title);
    report.push('\n');
    report.push_str(HEAVY_RULE);
    report.push('\n');
}

pub fn generate_text_report(analysis: &SiteAnalysis, include_sitemap: bool) -> String {
    let summary = &analysis.summary;
    let totals = &summary.totals;
    let mut report = String::new();

    // Header
    report.push_str(HEAVY_RULE);
    report.push_str("                       SITEGRAPH ARCHITECTURE REPORT\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');

    report.push_str(&format!("Site:         {}\n", summary.root_url));
    report.push_str(&format!("Pages:        {}\n", totals.node_count));
    report.push_str(&format!(
        "Links:        {} ({} internal, {} external, {} broken)\n",
        totals.link_count,
        totals.internal_link_count,
        totals.external_link_count,
        totals.broken_link_count
    ));
    report.push_str(&format!(
        "Depth:        max {}, average {:.2}\n",
        totals.max_depth, totals.average_depth
    ));
    report.push_str(&format!(
        "Link equity:  {} iterations{}\n",
        summary.equity.iterations,
        if summary.equity.converged {
            " (converged)"
        } else {
            ""
        }
    ));
    report.push('\n');

    if include_sitemap {
        section(&mut report, "SITE MAP");
        report.push_str(&generate_sitemap_tree(analysis.graph.nodes()));
        report.push('\n');
    }

    // Executive Summary
    section(&mut report, "EXECUTIVE SUMMARY");

    let counts = &summary.severity_counts;
    report.push_str(&format!("Open Issues: {}\n\n", counts.total()));

    if counts.critical > 0 {
        report.push_str(&format!("  [CRITICAL] {}  (Fix immediately)\n", counts.critical));
    }
    if counts.serious > 0 {
        report.push_str(&format!("  [SERIOUS]  {}  (High priority)\n", counts.serious));
    }
    if counts.moderate > 0 {
        report.push_str(&format!("  [MODERATE] {}  (Should be addressed)\n", counts.moderate));
    }
    if counts.minor > 0 {
        report.push_str(&format!("  [MINOR]    {}  (Minor issues)\n", counts.minor));
    }
    report.push_str(&format!(
        "\n  Orphan pages: {}   Deep pages: {}   Unreachable: {}   Errors: {}\n\n",
        totals.orphan_count, totals.deep_count, totals.unreachable_count, totals.error_count
    ));

    let open: Vec<&Issue> = analysis.issues.iter().filter(|i| !i.resolved).collect();
    if !open.is_empty() {
        section(&mut report, "DETAILED ISSUES");

        for (idx, issue) in open.iter().enumerate() {
            let url = analysis
                .graph
                .node(issue.node_id)
                .map(|n| n.url.as_str())
                .unwrap_or("unknown");

            report.push_str(&format!("[{}] {}\n", idx + 1, issue.message));
            report.push_str(&format!("Severity:     {}\n", issue.severity.as_str().to_uppercase()));
            report.push_str(&format!("Type:         {}\n", format_issue_kind(issue.kind.as_str())));
            report.push_str(&format!("URL:          {}\n", url));
            report.push_str(&format!("Fingerprint:  {}\n", issue.fingerprint));

            report.push_str("\nRecommendation:\n");
            report.push_str(&wrap_text(&issue.recommendation, 80, "  "));
            report.push('\n');

            report.push_str(LIGHT_RULE);
            report.push('\n');
        }
    }

    let resolved = analysis.issues.len() - open.len();
    if resolved > 0 {
        report.push_str(&format!("{} resolved issue(s) not shown.\n\n", resolved));
    }

    // Footer
    report.push_str(HEAVY_RULE);
    report.push_str("                                End of Report\n");
    report.push_str(HEAVY_RULE);
    report.push_str("\nGenerated by sitegraph\n\n");

    report
}

pub fn generate_json_report(analysis: &SiteAnalysis) -> Result<String, serde_json::Error> {
    let summary = &analysis.summary;
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "sitegraph",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "site": {
                "root_url": summary.root_url,
                "totals": summary.totals,
                "equity": summary.equity
            },
            "summary": {
                "open_issues": summary.severity_counts.total(),
                "severity_breakdown": summary.severity_counts
            },
            "issues": analysis.issues,
            "pages": analysis.graph.nodes()
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn generate_diff_report(diff: &GraphDiff) -> String {
    let mut report = String::new();

    report.push_str(HEAVY_RULE);
    report.push_str("                          SITEGRAPH SNAPSHOT DIFF\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');

    report.push_str(&format!("Base:         {}\n", diff.base_id));
    report.push_str(&format!("Target:       {}\n", diff.target_id));
    report.push('\n');

    if diff.is_empty() {
        report.push_str("No structural changes.\n\n");
    } else {
        section(&mut report, "CHANGES");
        report.push_str(&format!(
            "Pages:  +{}  -{}  ~{}\n",
            diff.nodes_added,
            diff.nodes_removed,
            diff.nodes.changed.len()
        ));
        report.push_str(&format!(
            "Links:  +{}  -{}  ~{}\n\n",
            diff.links_added,
            diff.links_removed,
            diff.links.changed.len()
        ));

        for change in &diff.nodes.changed {
            report.push_str(&format!("  {}\n", change.url));
            for attr in &change.changes {
                report.push_str(&format!(
                    "      {:?}: {} -> {}\n",
                    attr.attribute, attr.before, attr.after
                ));
            }
        }
        report.push('\n');
    }

    if !diff.highlights.is_empty() {
        section(&mut report, "HIGHLIGHTS");
        for highlight in &diff.highlights {
            report.push_str(&format!("  • {}\n", highlight));
        }
        report.push('\n');
    }

    section(&mut report, "METRICS");
    report.push_str(&format!(
        "{:<22} {:>12} {:>12} {:>12} {:>10}\n",
        "metric", "base", "target", "delta", "change"
    ));
    for metric in &diff.metrics {
        let change = match metric.percent_change {
            Some(p) => format!("{:+.1}%", p),
            None => "n/a".to_string(),
        };
        report.push_str(&format!(
            "{:<22} {:>12.2} {:>12.2} {:>+12.2} {:>10}\n",
            metric.metric, metric.base, metric.target, metric.delta, change
        ));
    }
    report.push('\n');

    report
}

pub fn generate_diff_json(diff: &GraphDiff) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "sitegraph",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "diff": diff
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

// Helper functions
pub fn format_issue_kind(kind: &str) -> String {
    kind.replace('_', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn wrap_text(text: &str, width: usize, indent: &str) -> String {
    let mut result = String::new();
    let mut current_line = String::new();
    let available = width.saturating_sub(indent.len()).max(1);

    for word in text.split_whitespace() {
        if current_line.len() + word.len() + 1 > available && !current_line.is_empty() {
            result.push_str(indent);
            result.push_str(&current_line);
            result.push('\n');
            current_line.clear();
        }

        if !current_line.is_empty() {
            current_line.push(' ');
        }
        current_line.push_str(word);
    }

    if !current_line.is_empty() {
        result.push_str(indent);
        result.push_str(&current_line);
        result.push('\n');
    }

    result
}

/// Pages listed by URL with status and depth
fn generate_sitemap_tree(nodes: &[Node]) -> String {
    if nodes.is_empty() {
        return "  (empty)\n".to_string();
    }

    let mut sorted: Vec<&Node> = nodes.iter().collect();
    sorted.sort_by(|a, b| a.url.cmp(&b.url));

    let mut result = String::new();
    for (i, node) in sorted.iter().enumerate() {
        let prefix = if i == sorted.len() - 1 {
            "└── "
        } else {
            "├── "
        };
        let status = node
            .http_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "---".to_string());
        let depth = node
            .depth
            .map(|d| format!("depth {}", d))
            .unwrap_or_else(|| "unreached".to_string());
        result.push_str(&format!(
            "{}{} [{}] ({})\n",
            prefix, node.path, status, depth
        ));
    }

    result
}
