// Structural checks over an analysed site graph

use crate::config::AnalysisConfig;
use crate::crawl::resolve_link;
use crate::graph::SiteGraph;
use crate::model::{Issue, IssueEvidence, Node, StatusCategory};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::info;
use uuid::Uuid;

fn new_issue(
    node: &Node,
    evidence: IssueEvidence,
    detail: &str,
    message: String,
    recommendation: &str,
) -> Issue {
    let kind = evidence.kind();
    let fingerprint = format!("{}|{}|{}", kind.as_str(), node.url, detail);

    Issue {
        id: Uuid::new_v5(&Uuid::NAMESPACE_URL, fingerprint.as_bytes()),
        node_id: node.id,
        kind,
        severity: kind.severity(),
        message,
        recommendation: recommendation.to_string(),
        evidence,
        resolved: false,
        fingerprint,
    }
}

pub fn check_orphan(node: &Node) -> Option<Issue> {
    if !node.is_orphan {
        return None;
    }

    Some(new_issue(
        node,
        IssueEvidence::Orphan,
        "",
        format!("{} has no internal links pointing to it.", node.url),
        "Link to this page from a relevant section or navigation, or remove it if it is obsolete.",
    ))
}

pub fn check_deep(node: &Node, threshold: u32) -> Option<Issue> {
    let depth = node.depth?;
    if depth <= threshold {
        return None;
    }

    Some(new_issue(
        node,
        IssueEvidence::Deep { depth, threshold },
        "",
        format!(
            "{} is {} clicks from the homepage (threshold {}).",
            node.url, depth, threshold
        ),
        "Flatten the navigation or add links from higher-level pages to bring it closer to the \
         homepage.",
    ))
}

/// One issue per distinct broken target on the page. Internal links to
/// pages that answered with 4xx/5xx count as broken too.
pub fn check_broken_links(graph: &SiteGraph, node: &Node) -> Vec<Issue> {
    let mut issues = Vec::new();
    let mut seen = HashSet::new();

    for link in graph.outbound(node.id) {
        let http_status = match link.target_node_id() {
            Some(target_id) => match graph.node(target_id) {
                Some(target)
                    if matches!(
                        target.http_category(),
                        StatusCategory::ClientError | StatusCategory::ServerError
                    ) =>
                {
                    target.http_status
                }
                _ => continue,
            },
            None if link.is_broken() => None,
            None => continue,
        };

        if !seen.insert(link.target_url.clone()) {
            continue;
        }

        let message = match http_status {
            Some(code) => format!(
                "{} links to {} which returned HTTP {}.",
                node.url, link.target_url, code
            ),
            None => format!(
                "{} links to {} which was not found during the crawl.",
                node.url, link.target_url
            ),
        };

        issues.push(new_issue(
            node,
            IssueEvidence::BrokenLink {
                link_id: link.id,
                target_url: link.target_url.clone(),
                http_status,
            },
            &link.target_url,
            message,
            "Update the link to a working URL or remove it.",
        ));
    }

    issues
}

/// Follows `redirect_to` from a redirecting page. Reports when at least
/// `min_hops` redirects are chained, or the chain loops.
pub fn check_redirect_chain(graph: &SiteGraph, node: &Node, min_hops: usize) -> Option<Issue> {
    if node.http_category() != StatusCategory::Redirect {
        return None;
    }

    let mut hops = vec![node.url.clone()];
    let mut seen: HashSet<String> = HashSet::from([node.url.clone()]);
    let mut current = node;
    let mut is_loop = false;

    while current.http_category() == StatusCategory::Redirect {
        let Some(next_url) = current
            .redirect_to
            .as_deref()
            .and_then(|target| resolve_link(&current.url, target))
        else {
            break;
        };

        hops.push(next_url.clone());
        if !seen.insert(next_url.clone()) {
            is_loop = true;
            break;
        }

        match graph.node_by_url(&next_url) {
            Some(next) => current = next,
            None => break,
        }
    }

    let redirects = hops.len() - 1;
    if !is_loop && redirects < min_hops {
        return None;
    }

    let message = if is_loop {
        format!("{} is part of a redirect loop: {}.", node.url, hops.join(" -> "))
    } else {
        format!(
            "{} passes through {} redirects: {}.",
            node.url,
            redirects,
            hops.join(" -> ")
        )
    };

    Some(new_issue(
        node,
        IssueEvidence::RedirectChain { hops, is_loop },
        "",
        message,
        "Point links and the first redirect directly at the final destination URL.",
    ))
}

pub fn check_thin_content(node: &Node, minimum: u32) -> Option<Issue> {
    if !node.is_success() || node.word_count >= minimum {
        return None;
    }

    Some(new_issue(
        node,
        IssueEvidence::ThinContent {
            word_count: node.word_count,
            minimum,
        },
        "",
        format!(
            "{} has only {} words of content (minimum {}).",
            node.url, node.word_count, minimum
        ),
        "Expand the page with useful content or consolidate it into a related page.",
    ))
}

/// Successful pages sharing a content hash
pub fn check_duplicate_content(graph: &SiteGraph) -> Vec<Issue> {
    let mut groups: BTreeMap<&str, Vec<&Node>> = BTreeMap::new();

    for node in graph.nodes() {
        if let Some(hash) = node.content_hash.as_deref()
            && !hash.is_empty()
            && node.is_success()
        {
            groups.entry(hash).or_default().push(node);
        }
    }

    let mut issues = Vec::new();
    for (hash, nodes) in groups {
        if nodes.len() < 2 {
            continue;
        }

        for node in &nodes {
            let mut duplicates: Vec<Uuid> = nodes
                .iter()
                .filter(|other| other.id != node.id)
                .map(|other| other.id)
                .collect();
            duplicates.sort();

            issues.push(new_issue(
                node,
                IssueEvidence::DuplicateContent {
                    content_hash: hash.to_string(),
                    duplicates,
                },
                hash,
                format!(
                    "{} has the same content as {} other page(s).",
                    node.url,
                    nodes.len() - 1
                ),
                "Consolidate the duplicates or mark the preferred version with a canonical link.",
            ));
        }
    }

    issues
}

/// Run every check over an analysed graph and update node issue counts.
/// Expects metrics to be computed already.
pub fn detect_issues(graph: &mut SiteGraph, config: &AnalysisConfig) -> Vec<Issue> {
    let mut issues = Vec::new();

    for node in graph.nodes() {
        issues.extend(check_orphan(node));
        issues.extend(check_deep(node, config.deep_page_threshold));
        issues.extend(check_broken_links(graph, node));
        issues.extend(check_redirect_chain(
            graph,
            node,
            config.redirect_chain_min_hops,
        ));
        issues.extend(check_thin_content(node, config.thin_content_words));
    }
    issues.extend(check_duplicate_content(graph));

    sort_issues(graph, &mut issues);
    apply_issue_counts(graph, &issues);

    info!("Detected {} issues", issues.len());
    issues
}

/// Carry manual resolutions from a previous run forward. Previous issues
/// whose condition no longer holds are dropped.
pub fn reconcile_issues(previous: &[Issue], fresh: Vec<Issue>) -> Vec<Issue> {
    let resolved: HashSet<&str> = previous
        .iter()
        .filter(|issue| issue.resolved)
        .map(|issue| issue.fingerprint.as_str())
        .collect();

    fresh
        .into_iter()
        .map(|mut issue| {
            if resolved.contains(issue.fingerprint.as_str()) {
                issue.resolve();
            }
            issue
        })
        .collect()
}

/// Severity first, then page URL
pub(crate) fn sort_issues(graph: &SiteGraph, issues: &mut [Issue]) {
    issues.sort_by(|a, b| {
        let url_a = graph.node(a.node_id).map(|n| n.url.as_str()).unwrap_or("");
        let url_b = graph.node(b.node_id).map(|n| n.url.as_str()).unwrap_or("");
        a.severity
            .cmp(&b.severity)
            .then_with(|| url_a.cmp(url_b))
            .then_with(|| a.fingerprint.cmp(&b.fingerprint))
    });
}

/// Unresolved issue count per node
pub(crate) fn apply_issue_counts(graph: &mut SiteGraph, issues: &[Issue]) {
    let mut counts: HashMap<Uuid, usize> = HashMap::new();
    for issue in issues.iter().filter(|issue| !issue.resolved) {
        *counts.entry(issue.node_id).or_default() += 1;
    }

    for node in graph.nodes_mut() {
        node.issue_count = counts.get(&node.id).copied().unwrap_or(0);
    }
}
