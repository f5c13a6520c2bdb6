//! Derived graph metrics: BFS depth, link counts, orphan/deep flags and
//! link-equity propagation.
//!
//! Every metric is computed into scratch buffers first and only written to
//! the graph once all of them succeeded.

use crate::config::AnalysisConfig;
use crate::error::{GraphError, Result};
use crate::graph::SiteGraph;
use crate::model::StatusCategory;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepthStats {
    pub reached: usize,
    pub max_depth: u32,
    pub orphans: usize,
    pub unreachable: usize,
    pub deep: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquityStats {
    pub iterations: usize,
    pub converged: bool,
    pub final_delta: f64,
    /// Total score held by all nodes after each iteration
    pub totals: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub depth: DepthStats,
    pub equity: EquityStats,
}

/// Minimum hop distance from the root over internal links.
/// Unreached pages are absent from the map.
pub fn bfs_depths(graph: &SiteGraph) -> Result<HashMap<Uuid, u32>> {
    let root = graph.root_slot().ok_or(GraphError::NoRootNode)?;
    let depths = depth_slots(graph, root);

    Ok(depths
        .into_iter()
        .enumerate()
        .filter_map(|(slot, depth)| depth.map(|d| (graph.nodes()[slot].id, d)))
        .collect())
}

fn depth_slots(graph: &SiteGraph, root: usize) -> Vec<Option<u32>> {
    let mut depths = vec![None; graph.node_count()];
    let mut queue = VecDeque::new();

    depths[root] = Some(0);
    queue.push_back(root);

    while let Some(slot) = queue.pop_front() {
        let next_depth = depths[slot].unwrap_or(0) + 1;
        for neighbor in graph.internal_neighbors(slot) {
            if depths[neighbor].is_none() {
                depths[neighbor] = Some(next_depth);
                queue.push_back(neighbor);
            }
        }
    }

    depths
}

/// Link-equity scores keyed by node id, plus convergence details
pub fn link_equity(
    graph: &SiteGraph,
    config: &AnalysisConfig,
) -> Result<(HashMap<Uuid, f64>, EquityStats)> {
    let root = graph.root_slot().ok_or(GraphError::NoRootNode)?;
    let (scores, stats) = propagate_equity(graph, root, config);

    let by_id = scores
        .into_iter()
        .enumerate()
        .map(|(slot, score)| (graph.nodes()[slot].id, score))
        .collect();
    Ok((by_id, stats))
}

// The root starts with 1.0. Each round a node splits its score evenly over
// its followed internal link instances. Nodes without any keep their score,
// so nothing leaks and nothing is injected after the first round.
fn propagate_equity(
    graph: &SiteGraph,
    root: usize,
    config: &AnalysisConfig,
) -> (Vec<f64>, EquityStats) {
    let n = graph.node_count();
    let targets: Vec<Vec<usize>> = (0..n)
        .map(|slot| graph.equity_targets(slot, config.nofollow_passes_equity))
        .collect();

    let mut scores = vec![0.0; n];
    scores[root] = 1.0;

    let mut stats = EquityStats::default();

    for _ in 0..config.equity_max_iterations {
        let mut next = vec![0.0; n];

        for (slot, outs) in targets.iter().enumerate() {
            let score = scores[slot];
            if score == 0.0 {
                continue;
            }
            if outs.is_empty() {
                next[slot] += score;
                continue;
            }
            let share = score / outs.len() as f64;
            for &target in outs {
                next[target] += share;
            }
        }

        let delta: f64 = scores
            .iter()
            .zip(&next)
            .map(|(before, after)| (before - after).abs())
            .sum();

        scores = next;
        stats.iterations += 1;
        stats.final_delta = delta;
        stats.totals.push(scores.iter().sum());

        if delta < config.equity_epsilon {
            stats.converged = true;
            break;
        }
    }

    debug!(
        "Link equity: {} iterations, delta {:.3e}, converged {}",
        stats.iterations, stats.final_delta, stats.converged
    );
    (scores, stats)
}

/// Compute all node metrics and write them into the graph.
///
/// Fails with [`GraphError::NoRootNode`] before touching the graph when no
/// homepage can be identified.
pub fn compute_metrics(graph: &mut SiteGraph, config: &AnalysisConfig) -> Result<MetricsSummary> {
    let root = graph.root_slot().ok_or(GraphError::NoRootNode)?;

    let depths = depth_slots(graph, root);
    let inbound = graph.inbound_counts();
    let outbound = graph.outbound_counts();
    let (scores, equity) = propagate_equity(graph, root, config);

    let mut depth_stats = DepthStats::default();

    for (slot, node) in graph.nodes_mut().iter_mut().enumerate() {
        node.depth = depths[slot];
        node.inbound_count = inbound[slot];
        node.outbound_count = outbound[slot];
        node.link_equity = scores[slot];
        node.is_root = slot == root;
        node.issue_count = 0;

        node.is_orphan = is_orphan(node.inbound_count, node.depth);
        node.is_deep = is_deep(node.depth, config.deep_page_threshold);
        node.unreachable = node.depth.is_none() && node.inbound_count > 0;
        node.status = categorize(node.http_category(), node.is_orphan, node.is_deep);

        match node.depth {
            Some(depth) => {
                depth_stats.reached += 1;
                depth_stats.max_depth = depth_stats.max_depth.max(depth);
            }
            None => {
                if node.unreachable {
                    depth_stats.unreachable += 1;
                }
            }
        }
        if node.is_orphan {
            depth_stats.orphans += 1;
        }
        if node.is_deep {
            depth_stats.deep += 1;
        }
    }

    info!(
        "Metrics computed: {} reached, max depth {}, {} orphans, {} deep",
        depth_stats.reached, depth_stats.max_depth, depth_stats.orphans, depth_stats.deep
    );

    Ok(MetricsSummary {
        depth: depth_stats,
        equity,
    })
}

pub fn is_orphan(inbound_count: usize, depth: Option<u32>) -> bool {
    inbound_count == 0 && depth != Some(0)
}

pub fn is_deep(depth: Option<u32>, threshold: u32) -> bool {
    matches!(depth, Some(d) if d > threshold)
}

/// HTTP problems take precedence over structural ones
fn categorize(http: StatusCategory, orphan: bool, deep: bool) -> StatusCategory {
    if http != StatusCategory::Ok {
        http
    } else if orphan {
        StatusCategory::Orphan
    } else if deep {
        StatusCategory::Deep
    } else {
        StatusCategory::Ok
    }
}
