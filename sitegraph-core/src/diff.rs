//! Snapshot comparison.
//!
//! Nodes and links are matched by id. A node counts as changed when its
//! depth, link equity or status differ; a link when its effective type,
//! nofollow flag or target resolution differ. Both definitions are
//! symmetric, so swapping base and target only swaps added/removed and
//! flips the sign of the numeric deltas.

use crate::model::{Link, LinkTarget, Node};
use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

const EQUITY_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeAttribute {
    Depth,
    LinkEquity,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkAttribute {
    LinkType,
    Nofollow,
    Target,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeChange<A> {
    pub attribute: A,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeChange {
    pub id: Uuid,
    pub url: String,
    pub changes: Vec<AttributeChange<NodeAttribute>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkChange {
    pub id: Uuid,
    pub target_url: String,
    pub changes: Vec<AttributeChange<LinkAttribute>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetDiff<C> {
    pub added: Vec<Uuid>,
    pub removed: Vec<Uuid>,
    pub changed: Vec<C>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDelta {
    pub metric: String,
    pub base: f64,
    pub target: f64,
    pub delta: f64,
    /// `None` when the base value is zero and the target is not
    pub percent_change: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDiff {
    pub base_id: Uuid,
    pub target_id: Uuid,
    pub nodes: SetDiff<NodeChange>,
    pub links: SetDiff<LinkChange>,
    pub nodes_added: usize,
    pub nodes_removed: usize,
    pub links_added: usize,
    pub links_removed: usize,
    pub metrics: Vec<MetricDelta>,
    pub highlights: Vec<String>,
}

/// Compact form of a diff stored on the newer snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub base_snapshot_id: Uuid,
    pub nodes_added: usize,
    pub nodes_removed: usize,
    pub nodes_changed: usize,
    pub links_added: usize,
    pub links_removed: usize,
    pub links_changed: usize,
    pub highlights: Vec<String>,
}

impl GraphDiff {
    pub fn is_empty(&self) -> bool {
        self.nodes.added.is_empty()
            && self.nodes.removed.is_empty()
            && self.nodes.changed.is_empty()
            && self.links.added.is_empty()
            && self.links.removed.is_empty()
            && self.links.changed.is_empty()
    }

    pub fn changed_node_ids(&self) -> Vec<Uuid> {
        self.nodes.changed.iter().map(|c| c.id).collect()
    }

    pub fn changed_link_ids(&self) -> Vec<Uuid> {
        self.links.changed.iter().map(|c| c.id).collect()
    }

    pub fn metric(&self, name: &str) -> Option<&MetricDelta> {
        self.metrics.iter().find(|m| m.metric == name)
    }

    pub fn summary(&self) -> DiffSummary {
        DiffSummary {
            base_snapshot_id: self.base_id,
            nodes_added: self.nodes_added,
            nodes_removed: self.nodes_removed,
            nodes_changed: self.nodes.changed.len(),
            links_added: self.links_added,
            links_removed: self.links_removed,
            links_changed: self.links.changed.len(),
            highlights: self.highlights.clone(),
        }
    }
}

pub fn diff_snapshots(base: &Snapshot, target: &Snapshot) -> GraphDiff {
    let base_nodes: HashMap<Uuid, &Node> = base.nodes().iter().map(|n| (n.id, n)).collect();
    let target_nodes: HashMap<Uuid, &Node> = target.nodes().iter().map(|n| (n.id, n)).collect();
    let base_links: HashMap<Uuid, &Link> = base.links().iter().map(|l| (l.id, l)).collect();
    let target_links: HashMap<Uuid, &Link> = target.links().iter().map(|l| (l.id, l)).collect();

    let nodes = SetDiff {
        added: only_in(&target_nodes, &base_nodes),
        removed: only_in(&base_nodes, &target_nodes),
        changed: changed_nodes(&base_nodes, &target_nodes),
    };
    let links = SetDiff {
        added: only_in(&target_links, &base_links),
        removed: only_in(&base_links, &target_links),
        changed: changed_links(&base_links, &target_links),
    };

    let metrics = base
        .metadata()
        .metrics()
        .into_iter()
        .zip(target.metadata().metrics())
        .map(|((name, before), (_, after))| metric_delta(name, before, after))
        .collect();

    let highlights = highlights(base, target, &nodes);

    GraphDiff {
        base_id: base.id(),
        target_id: target.id(),
        nodes_added: nodes.added.len(),
        nodes_removed: nodes.removed.len(),
        links_added: links.added.len(),
        links_removed: links.removed.len(),
        nodes,
        links,
        metrics,
        highlights,
    }
}

fn only_in<T>(left: &HashMap<Uuid, T>, right: &HashMap<Uuid, T>) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = left
        .keys()
        .filter(|id| !right.contains_key(id))
        .copied()
        .collect();
    ids.sort();
    ids
}

fn changed_nodes(
    base: &HashMap<Uuid, &Node>,
    target: &HashMap<Uuid, &Node>,
) -> Vec<NodeChange> {
    let mut changed: Vec<NodeChange> = base
        .iter()
        .filter_map(|(id, before)| {
            let after = target.get(id)?;
            let changes = node_changes(before, after);
            (!changes.is_empty()).then(|| NodeChange {
                id: *id,
                url: after.url.clone(),
                changes,
            })
        })
        .collect();
    changed.sort_by(|a, b| a.url.cmp(&b.url));
    changed
}

fn node_changes(before: &Node, after: &Node) -> Vec<AttributeChange<NodeAttribute>> {
    let mut changes = Vec::new();

    if before.depth != after.depth {
        changes.push(AttributeChange {
            attribute: NodeAttribute::Depth,
            before: format_depth(before.depth),
            after: format_depth(after.depth),
        });
    }
    if (before.link_equity - after.link_equity).abs() > EQUITY_TOLERANCE {
        changes.push(AttributeChange {
            attribute: NodeAttribute::LinkEquity,
            before: format!("{:.6}", before.link_equity),
            after: format!("{:.6}", after.link_equity),
        });
    }
    if before.status != after.status {
        changes.push(AttributeChange {
            attribute: NodeAttribute::Status,
            before: before.status.as_str().to_string(),
            after: after.status.as_str().to_string(),
        });
    }

    changes
}

fn changed_links(
    base: &HashMap<Uuid, &Link>,
    target: &HashMap<Uuid, &Link>,
) -> Vec<LinkChange> {
    let mut changed: Vec<LinkChange> = base
        .iter()
        .filter_map(|(id, before)| {
            let after = target.get(id)?;
            let changes = link_changes(before, after);
            (!changes.is_empty()).then(|| LinkChange {
                id: *id,
                target_url: after.target_url.clone(),
                changes,
            })
        })
        .collect();
    changed.sort_by(|a, b| a.target_url.cmp(&b.target_url).then(a.id.cmp(&b.id)));
    changed
}

fn link_changes(before: &Link, after: &Link) -> Vec<AttributeChange<LinkAttribute>> {
    let mut changes = Vec::new();

    if before.effective_type() != after.effective_type() {
        changes.push(AttributeChange {
            attribute: LinkAttribute::LinkType,
            before: before.effective_type().as_str().to_string(),
            after: after.effective_type().as_str().to_string(),
        });
    }
    if before.nofollow != after.nofollow {
        changes.push(AttributeChange {
            attribute: LinkAttribute::Nofollow,
            before: before.nofollow.to_string(),
            after: after.nofollow.to_string(),
        });
    }
    if before.target != after.target {
        changes.push(AttributeChange {
            attribute: LinkAttribute::Target,
            before: describe_target(&before.target),
            after: describe_target(&after.target),
        });
    }

    changes
}

fn describe_target(target: &LinkTarget) -> String {
    match target {
        LinkTarget::Internal { node_id } => format!("internal:{}", node_id),
        LinkTarget::External { domain } => format!("external:{}", domain),
        LinkTarget::Broken => "broken".to_string(),
    }
}

fn format_depth(depth: Option<u32>) -> String {
    depth.map(|d| d.to_string()).unwrap_or_else(|| "unreached".to_string())
}

pub fn percent_change(base: f64, target: f64) -> Option<f64> {
    if base == 0.0 {
        if target == 0.0 { Some(0.0) } else { None }
    } else {
        Some((target - base) / base * 100.0)
    }
}

fn metric_delta(name: &str, base: f64, target: f64) -> MetricDelta {
    MetricDelta {
        metric: name.to_string(),
        base,
        target,
        delta: target - base,
        percent_change: percent_change(base, target),
    }
}

fn plural(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("1 {}", singular)
    } else {
        format!("{} {}", count, plural)
    }
}

fn highlights(base: &Snapshot, target: &Snapshot, nodes: &SetDiff<NodeChange>) -> Vec<String> {
    let mut highlights = Vec::new();

    if !nodes.added.is_empty() {
        highlights.push(format!("{} added", plural(nodes.added.len(), "page", "pages")));
    }
    if !nodes.removed.is_empty() {
        highlights.push(format!(
            "{} removed",
            plural(nodes.removed.len(), "page", "pages")
        ));
    }

    let orphans_before: HashSet<Uuid> = base
        .nodes()
        .iter()
        .filter(|n| n.is_orphan)
        .map(|n| n.id)
        .collect();
    let orphans_after: HashSet<Uuid> = target
        .nodes()
        .iter()
        .filter(|n| n.is_orphan)
        .map(|n| n.id)
        .collect();
    let appeared = orphans_after.difference(&orphans_before).count();
    let cleared = orphans_before.difference(&orphans_after).count();
    if appeared > 0 {
        highlights.push(format!(
            "{} appeared",
            plural(appeared, "orphan page", "orphan pages")
        ));
    }
    if cleared > 0 {
        highlights.push(format!(
            "{} no longer orphaned",
            plural(cleared, "page is", "pages are")
        ));
    }

    let errors_before: HashSet<Uuid> = base
        .nodes()
        .iter()
        .filter(|n| n.http_category().is_error())
        .map(|n| n.id)
        .collect();
    let new_errors = target
        .nodes()
        .iter()
        .filter(|n| n.http_category().is_error() && !errors_before.contains(&n.id))
        .count();
    if new_errors > 0 {
        highlights.push(format!(
            "{} started failing",
            plural(new_errors, "page", "pages")
        ));
    }

    let broken_before = base.metadata().broken_link_count;
    let broken_after = target.metadata().broken_link_count;
    if broken_after > broken_before {
        highlights.push(format!(
            "{} appeared",
            plural(broken_after - broken_before, "broken link", "broken links")
        ));
    } else if broken_before > broken_after {
        highlights.push(format!(
            "{} fixed",
            plural(broken_before - broken_after, "broken link", "broken links")
        ));
    }

    let depth_before = base.metadata().max_depth;
    let depth_after = target.metadata().max_depth;
    if depth_before != depth_after {
        let direction = if depth_after > depth_before { "increased" } else { "decreased" };
        highlights.push(format!(
            "Max depth {} from {} to {}",
            direction, depth_before, depth_after
        ));
    }

    highlights
}

/// Relative position (0.0 to 1.0) of `at` between two snapshots, used to
/// scrub through a history view.
pub fn timeline_position(base: &Snapshot, target: &Snapshot, at: DateTime<Utc>) -> f64 {
    let start = base.created_at().timestamp_millis();
    let end = target.created_at().timestamp_millis();
    if end == start {
        return 1.0;
    }

    let position = (at.timestamp_millis() - start) as f64 / (end - start) as f64;
    position.clamp(0.0, 1.0)
}

/// Linearly interpolated metadata metrics at a timeline position
pub fn interpolate_metrics(
    base: &Snapshot,
    target: &Snapshot,
    position: f64,
) -> Vec<(String, f64)> {
    let position = position.clamp(0.0, 1.0);
    base.metadata()
        .metrics()
        .into_iter()
        .zip(target.metadata().metrics())
        .map(|((name, before), (_, after))| {
            (name.to_string(), before + (after - before) * position)
        })
        .collect()
}
