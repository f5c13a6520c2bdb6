//! Immutable, timestamped captures of an analysed graph.

use crate::diff::{DiffSummary, diff_snapshots};
use crate::error::Result;
use crate::graph::SiteGraph;
use crate::model::{Link, Node};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregate counts stored alongside a snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub node_count: usize,
    pub link_count: usize,
    pub internal_link_count: usize,
    pub external_link_count: usize,
    pub broken_link_count: usize,
    pub max_depth: u32,
    pub average_depth: f64,
    pub orphan_count: usize,
    pub deep_count: usize,
    pub unreachable_count: usize,
    pub error_count: usize,
    pub issue_count: usize,
}

impl SnapshotMetadata {
    pub fn from_parts(nodes: &[Node], links: &[Link]) -> Self {
        let depths: Vec<u32> = nodes.iter().filter_map(|n| n.depth).collect();
        let average_depth = if depths.is_empty() {
            0.0
        } else {
            depths.iter().map(|&d| d as f64).sum::<f64>() / depths.len() as f64
        };

        Self {
            node_count: nodes.len(),
            link_count: links.len(),
            internal_link_count: links.iter().filter(|l| l.target_node_id().is_some()).count(),
            external_link_count: links.iter().filter(|l| l.is_external()).count(),
            broken_link_count: links.iter().filter(|l| l.is_broken()).count(),
            max_depth: depths.iter().copied().max().unwrap_or(0),
            average_depth,
            orphan_count: nodes.iter().filter(|n| n.is_orphan).count(),
            deep_count: nodes.iter().filter(|n| n.is_deep).count(),
            unreachable_count: nodes.iter().filter(|n| n.unreachable).count(),
            error_count: nodes.iter().filter(|n| n.http_category().is_error()).count(),
            issue_count: nodes.iter().map(|n| n.issue_count).sum(),
        }
    }

    pub fn from_graph(graph: &SiteGraph) -> Self {
        Self::from_parts(graph.nodes(), graph.links())
    }

    /// Numeric metrics compared by the differencer, in display order
    pub fn metrics(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("node_count", self.node_count as f64),
            ("link_count", self.link_count as f64),
            ("internal_link_count", self.internal_link_count as f64),
            ("external_link_count", self.external_link_count as f64),
            ("broken_link_count", self.broken_link_count as f64),
            ("max_depth", self.max_depth as f64),
            ("average_depth", self.average_depth),
            ("orphan_count", self.orphan_count as f64),
            ("deep_count", self.deep_count as f64),
            ("unreachable_count", self.unreachable_count as f64),
            ("error_count", self.error_count as f64),
            ("issue_count", self.issue_count as f64),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    id: Uuid,
    project: String,
    created_at: DateTime<Utc>,
    nodes: Vec<Node>,
    links: Vec<Link>,
    metadata: SnapshotMetadata,
    diff_summary: Option<DiffSummary>,
}

impl Snapshot {
    /// Capture the current state of a graph, diffed against the previous
    /// snapshot of the same project when one is given.
    pub fn capture(project: &str, graph: &SiteGraph, previous: Option<&Snapshot>) -> Self {
        Self::capture_at(project, graph, previous, Utc::now())
    }

    pub fn capture_at(
        project: &str,
        graph: &SiteGraph,
        previous: Option<&Snapshot>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut snapshot = Snapshot {
            id: Uuid::new_v4(),
            project: project.to_string(),
            created_at,
            nodes: graph.nodes().to_vec(),
            links: graph.links().to_vec(),
            metadata: SnapshotMetadata::from_graph(graph),
            diff_summary: None,
        };

        if let Some(previous) = previous {
            snapshot.diff_summary = Some(diff_snapshots(previous, &snapshot).summary());
        }

        snapshot
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn metadata(&self) -> &SnapshotMetadata {
        &self.metadata
    }

    pub fn diff_summary(&self) -> Option<&DiffSummary> {
        self.diff_summary.as_ref()
    }

    pub fn node(&self, id: Uuid) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Rebuild a graph from the captured nodes and links
    pub fn to_graph(&self) -> Result<SiteGraph> {
        SiteGraph::from_parts(self.nodes.clone(), self.links.clone())
    }
}
