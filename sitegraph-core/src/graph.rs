// In-memory site graph: an arena of nodes and links indexed once at build
// time. Internal links are mirrored into a petgraph DiGraph whose edge
// weights point back into the link arena.

use crate::crawl::{
    CrawlData, CrawlPage, extract_domain, extract_url_path, normalize_url, resolve_link,
    strip_scheme,
};
use crate::error::{InvalidGraphReason, Result};
use crate::model::{Link, LinkTarget, LinkType, Node, Position, StatusCategory};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};
use uuid::Uuid;

/// Stable node id derived from the normalised page URL
pub fn node_id_for(url: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, url.as_bytes())
}

fn link_id_for(source_url: &str, target_url: &str, ordinal: u32) -> Uuid {
    let key = format!("{}\n{}\n{}", source_url, target_url, ordinal);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes())
}

#[derive(Debug, Clone, Default)]
pub struct SiteGraph {
    graph: DiGraph<Uuid, usize>,
    nodes: Vec<Node>,
    links: Vec<Link>,
    /// Link slots leaving each node, in discovery order
    outgoing: Vec<Vec<usize>>,
    index: HashMap<Uuid, NodeIndex>,
    url_index: HashMap<String, NodeIndex>,
    root: Option<NodeIndex>,
}

impl SiteGraph {
    /// Build a graph from raw crawler output.
    ///
    /// Pages are de-duplicated by normalised URL, first record wins. Link
    /// targets are resolved against the crawled pages: other hosts become
    /// external links, same-host URLs that were never crawled become broken
    /// links. Self-links and exact duplicate edges are dropped.
    pub fn from_crawl(data: &CrawlData) -> Result<Self> {
        let mut graph = SiteGraph::default();
        let root_url = data.root_url.as_deref().and_then(normalize_url);
        let mut root_claims = Vec::new();

        for page in &data.pages {
            let url = normalize_url(&page.url)
                .ok_or_else(|| InvalidGraphReason::InvalidUrl(page.url.clone()))?;

            if graph.url_index.contains_key(&url) {
                debug!("Skipping duplicate page record {}", url);
                continue;
            }

            let claims_root =
                page.is_root || page.depth == Some(0) || root_url.as_deref() == Some(url.as_str());
            if claims_root {
                root_claims.push(url.clone());
            }

            let idx = graph.insert_node(node_from_page(page, url, claims_root));
            if claims_root {
                graph.root = Some(idx);
            }
        }

        if root_claims.len() > 1 {
            return Err(InvalidGraphReason::DuplicateRoot(root_claims).into());
        }

        let site_hosts: HashSet<String> = graph
            .nodes
            .iter()
            .filter_map(|n| extract_domain(&n.url))
            .collect();

        // Fallback for links that switch between http and https
        let mut scheme_free: HashMap<String, NodeIndex> = HashMap::new();
        for (i, node) in graph.nodes.iter().enumerate() {
            scheme_free
                .entry(strip_scheme(&node.url).to_string())
                .or_insert(NodeIndex::new(i));
        }

        let mut seen_edges = HashSet::new();
        let mut ordinals: HashMap<(usize, String), u32> = HashMap::new();

        for edge in &data.edges {
            let source_idx = normalize_url(&edge.source_url)
                .and_then(|url| graph.url_index.get(&url).copied())
                .ok_or_else(|| InvalidGraphReason::UnknownSource(edge.source_url.clone()))?;
            let source_url = graph.nodes[source_idx.index()].url.clone();

            let Some(target_url) = resolve_link(&source_url, &edge.target_url) else {
                debug!("Ignoring non-page link {} on {}", edge.target_url, source_url);
                continue;
            };

            let target = match extract_domain(&target_url) {
                Some(host) if !site_hosts.contains(&host) => LinkTarget::External { domain: host },
                _ => match graph
                    .url_index
                    .get(&target_url)
                    .or_else(|| scheme_free.get(strip_scheme(&target_url)))
                {
                    Some(&idx) => LinkTarget::Internal {
                        node_id: graph.nodes[idx.index()].id,
                    },
                    None => LinkTarget::Broken,
                },
            };

            let source_id = graph.nodes[source_idx.index()].id;
            if matches!(target, LinkTarget::Internal { node_id } if node_id == source_id) {
                debug!("Dropping self-link on {}", source_url);
                continue;
            }

            let dedupe_key = (
                source_idx.index(),
                target_url.clone(),
                edge.anchor_text.clone(),
                edge.position.clone(),
            );
            if !seen_edges.insert(dedupe_key) {
                continue;
            }

            let ordinal = ordinals
                .entry((source_idx.index(), target_url.clone()))
                .or_insert(0);
            let id = link_id_for(&source_url, &target_url, *ordinal);
            *ordinal += 1;

            let is_external = matches!(target, LinkTarget::External { .. });
            graph.insert_link(Link {
                id,
                source: source_id,
                target,
                target_url,
                detected_type: LinkType::detect(edge.position.as_deref(), is_external),
                type_override: edge.link_type,
                anchor_text: edge.anchor_text.clone(),
                nofollow: edge.nofollow,
                position: edge.position.clone(),
            });
        }

        info!(
            "Built site graph: {} pages, {} links",
            graph.nodes.len(),
            graph.links.len()
        );
        Ok(graph)
    }

    /// Rebuild a graph from previously computed nodes and links, e.g. a
    /// stored snapshot. Node attributes are kept as they are.
    pub fn from_parts(nodes: Vec<Node>, links: Vec<Link>) -> Result<Self> {
        let mut graph = SiteGraph::default();
        let mut root_claims = Vec::new();

        for node in nodes {
            if graph.index.contains_key(&node.id) {
                return Err(InvalidGraphReason::DuplicateNode(node.id).into());
            }
            let claims_root = node.is_root || node.depth == Some(0);
            if claims_root {
                root_claims.push(node.url.clone());
            }
            let idx = graph.insert_node(node);
            if claims_root {
                graph.root = Some(idx);
            }
        }

        if root_claims.len() > 1 {
            return Err(InvalidGraphReason::DuplicateRoot(root_claims).into());
        }

        for link in links {
            if !graph.index.contains_key(&link.source) {
                return Err(InvalidGraphReason::DanglingLink {
                    link: link.id,
                    node: link.source,
                }
                .into());
            }
            if let Some(target) = link.target_node_id()
                && !graph.index.contains_key(&target)
            {
                return Err(InvalidGraphReason::DanglingLink {
                    link: link.id,
                    node: target,
                }
                .into());
            }
            graph.insert_link(link);
        }

        Ok(graph)
    }

    fn insert_node(&mut self, node: Node) -> NodeIndex {
        let idx = self.graph.add_node(node.id);
        self.index.insert(node.id, idx);
        self.url_index.insert(node.url.clone(), idx);
        self.nodes.push(node);
        self.outgoing.push(Vec::new());
        idx
    }

    fn insert_link(&mut self, link: Link) {
        let slot = self.links.len();
        let source = self.index[&link.source];
        if let Some(target) = link.target_node_id() {
            let target = self.index[&target];
            self.graph.add_edge(source, target, slot);
        }
        self.outgoing[source.index()].push(slot);
        self.links.push(link);
    }

    pub fn node(&self, id: Uuid) -> Option<&Node> {
        self.index.get(&id).map(|idx| &self.nodes[idx.index()])
    }

    pub fn node_by_url(&self, url: &str) -> Option<&Node> {
        let url = normalize_url(url)?;
        self.url_index.get(&url).map(|idx| &self.nodes[idx.index()])
    }

    /// The homepage node, if one was identified
    pub fn root(&self) -> Option<&Node> {
        self.root.map(|idx| &self.nodes[idx.index()])
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// All links found on a page: internal, external and broken
    pub fn outbound(&self, id: Uuid) -> impl Iterator<Item = &Link> + '_ {
        self.index.get(&id).into_iter().flat_map(move |idx| {
            self.outgoing[idx.index()]
                .iter()
                .map(move |&slot| &self.links[slot])
        })
    }

    /// Internal links pointing at a page, in discovery order
    pub fn inbound(&self, id: Uuid) -> impl Iterator<Item = &Link> + '_ {
        let mut slots: Vec<usize> = match self.index.get(&id) {
            Some(&idx) => self
                .graph
                .edges_directed(idx, Direction::Incoming)
                .map(|edge| *edge.weight())
                .collect(),
            None => Vec::new(),
        };
        slots.sort_unstable();
        slots.into_iter().map(move |slot| &self.links[slot])
    }

    /// Pin a page to a layout position. Returns false for unknown ids.
    pub fn set_position(&mut self, id: Uuid, position: Position) -> bool {
        match self.index.get(&id) {
            Some(idx) => {
                self.nodes[idx.index()].position = Some(position);
                true
            }
            None => false,
        }
    }

    pub fn into_parts(self) -> (Vec<Node>, Vec<Link>) {
        (self.nodes, self.links)
    }

    // Slot-level access for the metric and issue passes

    pub(crate) fn root_slot(&self) -> Option<usize> {
        self.root.map(|idx| idx.index())
    }

    pub(crate) fn internal_neighbors(&self, slot: usize) -> impl Iterator<Item = usize> + '_ {
        self.graph
            .neighbors_directed(NodeIndex::new(slot), Direction::Outgoing)
            .map(|idx| idx.index())
    }

    /// Target slots of every internal link instance that passes equity
    pub(crate) fn equity_targets(&self, slot: usize, include_nofollow: bool) -> Vec<usize> {
        let mut targets: Vec<(usize, usize)> = self
            .graph
            .edges_directed(NodeIndex::new(slot), Direction::Outgoing)
            .filter(|edge| include_nofollow || !self.links[*edge.weight()].nofollow)
            .map(|edge| (*edge.weight(), edge.target().index()))
            .collect();
        targets.sort_unstable();
        targets.into_iter().map(|(_, target)| target).collect()
    }

    pub(crate) fn inbound_counts(&self) -> Vec<usize> {
        (0..self.nodes.len())
            .map(|slot| {
                self.graph
                    .edges_directed(NodeIndex::new(slot), Direction::Incoming)
                    .count()
            })
            .collect()
    }

    pub(crate) fn outbound_counts(&self) -> Vec<usize> {
        self.outgoing.iter().map(Vec::len).collect()
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }
}

fn node_from_page(page: &CrawlPage, url: String, is_root: bool) -> Node {
    Node {
        id: node_id_for(&url),
        path: extract_url_path(&url),
        url,
        title: page.title.clone(),
        http_status: page.http_status,
        status: StatusCategory::from_http_status(page.http_status),
        depth: None,
        inbound_count: 0,
        outbound_count: 0,
        link_equity: 0.0,
        word_count: page.word_count,
        issue_count: 0,
        is_root,
        is_orphan: false,
        is_deep: false,
        unreachable: false,
        position: None,
        content_hash: page.content_hash.clone(),
        redirect_to: page.redirect_to.clone(),
        crawled_at: page.crawled_at,
    }
}
