use super::{GraphView, truncate_label};
use crate::error::{GraphError, Result};
use crate::model::Node;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MermaidDiagram {
    Flowchart,
    Mindmap,
    Graph,
}

impl FromStr for MermaidDiagram {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "flowchart" => Ok(MermaidDiagram::Flowchart),
            "mindmap" => Ok(MermaidDiagram::Mindmap),
            "graph" => Ok(MermaidDiagram::Graph),
            _ => Err(GraphError::export_config(
                "diagram",
                s,
                "one of flowchart, mindmap, graph",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MermaidDirection {
    TB,
    TD,
    BT,
    LR,
    RL,
}

impl MermaidDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MermaidDirection::TB => "TB",
            MermaidDirection::TD => "TD",
            MermaidDirection::BT => "BT",
            MermaidDirection::LR => "LR",
            MermaidDirection::RL => "RL",
        }
    }
}

impl FromStr for MermaidDirection {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TB" => Ok(MermaidDirection::TB),
            "TD" => Ok(MermaidDirection::TD),
            "BT" => Ok(MermaidDirection::BT),
            "LR" => Ok(MermaidDirection::LR),
            "RL" => Ok(MermaidDirection::RL),
            _ => Err(GraphError::export_config(
                "direction",
                s,
                "one of TB, TD, BT, LR, RL",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MermaidOptions {
    pub diagram: MermaidDiagram,
    pub direction: MermaidDirection,
    pub max_label_length: usize,
    /// Wrap each depth level in a subgraph. Flowchart and graph only.
    pub group_by_depth: bool,
    pub include_external: bool,
}

impl Default for MermaidOptions {
    fn default() -> Self {
        Self {
            diagram: MermaidDiagram::Flowchart,
            direction: MermaidDirection::TD,
            max_label_length: 40,
            group_by_depth: false,
            include_external: false,
        }
    }
}

impl MermaidOptions {
    pub fn validate(&self) -> Result<()> {
        if self.max_label_length == 0 || self.max_label_length > 500 {
            return Err(GraphError::export_config(
                "max_label_length",
                self.max_label_length,
                "1..=500",
            ));
        }
        Ok(())
    }
}

pub(crate) fn render(view: &GraphView, options: &MermaidOptions) -> String {
    match options.diagram {
        MermaidDiagram::Flowchart => render_flow(view, options, "flowchart"),
        MermaidDiagram::Graph => render_flow(view, options, "graph"),
        MermaidDiagram::Mindmap => render_mindmap(view, options),
    }
}

fn flow_label(label: &str, max: usize) -> String {
    truncate_label(label, max).replace('"', "#quot;")
}

fn render_flow(view: &GraphView, options: &MermaidOptions, keyword: &str) -> String {
    let nodes = view.nodes_by_depth();
    let ids: HashMap<Uuid, String> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.id, format!("n{}", i)))
        .collect();

    let mut out = String::new();
    let _ = writeln!(out, "{} {}", keyword, options.direction.as_str());

    if options.group_by_depth {
        let mut levels: BTreeMap<Option<u32>, Vec<&Node>> = BTreeMap::new();
        for node in &nodes {
            levels.entry(node.depth).or_default().push(node);
        }
        // Some(_) levels first, unreached pages last
        let ordered = levels
            .iter()
            .filter(|(depth, _)| depth.is_some())
            .chain(levels.iter().filter(|(depth, _)| depth.is_none()));
        for (depth, members) in ordered {
            match depth {
                Some(d) => {
                    let _ = writeln!(out, "    subgraph depth_{}[\"Depth {}\"]", d, d);
                }
                None => out.push_str("    subgraph unreached[\"Unreached\"]\n"),
            }
            for node in members {
                let _ = writeln!(
                    out,
                    "        {}[\"{}\"]",
                    ids[&node.id],
                    flow_label(node.label(), options.max_label_length)
                );
            }
            out.push_str("    end\n");
        }
    } else {
        for node in &nodes {
            let _ = writeln!(
                out,
                "    {}[\"{}\"]",
                ids[&node.id],
                flow_label(node.label(), options.max_label_length)
            );
        }
    }

    let mut external_ids: BTreeMap<&str, String> = BTreeMap::new();
    if options.include_external {
        let domains: BTreeSet<&str> = view
            .links
            .iter()
            .filter_map(|l| l.external_domain())
            .collect();
        for (i, domain) in domains.into_iter().enumerate() {
            let id = format!("x{}", i);
            let _ = writeln!(
                out,
                "    {}([\"{}\"])",
                id,
                flow_label(domain, options.max_label_length)
            );
            external_ids.insert(domain, id);
        }
    }

    let mut seen = BTreeSet::new();
    for link in &view.links {
        let Some(source) = ids.get(&link.source) else {
            continue;
        };
        let target = match (link.target_node_id(), link.external_domain()) {
            (Some(target), _) => ids.get(&target),
            (None, Some(domain)) => external_ids.get(domain),
            _ => None,
        };
        let Some(target) = target else {
            continue;
        };
        let arrow = if link.nofollow { "-.->" } else { "-->" };
        if seen.insert((source.clone(), target.clone(), arrow)) {
            let _ = writeln!(out, "    {} {} {}", source, arrow, target);
        }
    }

    out
}

/// Mermaid mindmap node text cannot contain shape delimiters
fn mindmap_label(label: &str, max: usize) -> String {
    let cleaned: String = label
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | '[' | ']' | '{' | '}'))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "page".to_string()
    } else {
        truncate_label(cleaned, max)
    }
}

fn render_mindmap(view: &GraphView, options: &MermaidOptions) -> String {
    let nodes = view.nodes_by_depth();
    let mut children: HashMap<Uuid, Vec<&Node>> = HashMap::new();
    let mut top_level: Vec<&Node> = Vec::new();
    let mut unreached: Vec<&Node> = Vec::new();

    for node in &nodes {
        if node.depth.is_none() {
            unreached.push(node);
        } else if let Some(parent) = view.tree_parent(node) {
            children.entry(parent.id).or_default().push(node);
        } else {
            top_level.push(node);
        }
    }

    let mut out = String::from("mindmap\n");
    let max = options.max_label_length;

    // A visible root becomes the mindmap root; otherwise a synthetic one
    let mut level = 1;
    let visible_root = match top_level.as_slice() {
        [only] if only.depth == Some(0) => Some(*only),
        _ => None,
    };
    match visible_root {
        Some(root) => {
            let _ = writeln!(out, "  root(({}))", mindmap_label(root.label(), max));
            write_mindmap_children(&mut out, root, &children, level + 1, max);
        }
        None => {
            out.push_str("  root((Site))\n");
            level += 1;
            for node in &top_level {
                write_mindmap_branch(&mut out, node, &children, level, max);
            }
        }
    }

    if options.include_external {
        let domains: BTreeSet<&str> = view
            .links
            .iter()
            .filter_map(|l| l.external_domain())
            .collect();
        if !domains.is_empty() {
            out.push_str("    External\n");
            for domain in domains {
                let _ = writeln!(out, "      {}", mindmap_label(domain, max));
            }
        }
    }

    if !unreached.is_empty() {
        out.push_str("    Unreached\n");
        for node in unreached {
            let _ = writeln!(out, "      {}", mindmap_label(node.label(), max));
        }
    }

    out
}

fn write_mindmap_branch(
    out: &mut String,
    node: &Node,
    children: &HashMap<Uuid, Vec<&Node>>,
    level: usize,
    max: usize,
) {
    let _ = writeln!(out, "{}{}", "  ".repeat(level), mindmap_label(node.label(), max));
    write_mindmap_children(out, node, children, level + 1, max);
}

fn write_mindmap_children(
    out: &mut String,
    node: &Node,
    children: &HashMap<Uuid, Vec<&Node>>,
    level: usize,
    max: usize,
) {
    if let Some(kids) = children.get(&node.id) {
        for child in kids {
            write_mindmap_branch(out, child, children, level, max);
        }
    }
}
