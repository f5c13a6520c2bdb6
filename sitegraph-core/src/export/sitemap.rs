use super::{GraphView, escape_xml};
use crate::error::{GraphError, Result};
use crate::model::Node;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::str::FromStr;

pub const SITEMAP_URL_LIMIT: usize = 50_000;
const SITEMAP_NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeFrequency {
    Always,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Never,
}

impl ChangeFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeFrequency::Always => "always",
            ChangeFrequency::Hourly => "hourly",
            ChangeFrequency::Daily => "daily",
            ChangeFrequency::Weekly => "weekly",
            ChangeFrequency::Monthly => "monthly",
            ChangeFrequency::Yearly => "yearly",
            ChangeFrequency::Never => "never",
        }
    }
}

impl FromStr for ChangeFrequency {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "always" => Ok(ChangeFrequency::Always),
            "hourly" => Ok(ChangeFrequency::Hourly),
            "daily" => Ok(ChangeFrequency::Daily),
            "weekly" => Ok(ChangeFrequency::Weekly),
            "monthly" => Ok(ChangeFrequency::Monthly),
            "yearly" => Ok(ChangeFrequency::Yearly),
            "never" => Ok(ChangeFrequency::Never),
            _ => Err(GraphError::export_config(
                "changefreq",
                s,
                "one of always, hourly, daily, weekly, monthly, yearly, never",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SitemapOptions {
    pub min_priority: f64,
    pub max_priority: f64,
    pub changefreq: Option<ChangeFrequency>,
    pub include_lastmod: bool,
    pub max_urls: usize,
    /// Heading of the HTML sitemap
    pub title: Option<String>,
}

impl Default for SitemapOptions {
    fn default() -> Self {
        Self {
            min_priority: 0.1,
            max_priority: 1.0,
            changefreq: None,
            include_lastmod: true,
            max_urls: SITEMAP_URL_LIMIT,
            title: None,
        }
    }
}

impl SitemapOptions {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_priority) {
            return Err(GraphError::export_config(
                "min_priority",
                self.min_priority,
                "a number in [0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.max_priority) {
            return Err(GraphError::export_config(
                "max_priority",
                self.max_priority,
                "a number in [0, 1]",
            ));
        }
        if self.min_priority > self.max_priority {
            return Err(GraphError::export_config(
                "min_priority",
                self.min_priority,
                "no greater than max_priority",
            ));
        }
        if self.max_urls == 0 || self.max_urls > SITEMAP_URL_LIMIT {
            return Err(GraphError::export_config(
                "max_urls",
                self.max_urls,
                "1..=50000",
            ));
        }
        Ok(())
    }
}

/// Successful pages, highest equity first, capped at `max_urls`
fn sitemap_pages<'a>(view: &GraphView<'a>, options: &SitemapOptions) -> Vec<&'a Node> {
    let mut pages: Vec<&Node> = view.nodes.iter().copied().filter(|n| n.is_success()).collect();
    pages.sort_by(|a, b| {
        b.link_equity
            .total_cmp(&a.link_equity)
            .then_with(|| a.url.cmp(&b.url))
    });
    pages.truncate(options.max_urls);
    pages
}

pub fn priority(node: &Node, max_equity: f64, options: &SitemapOptions) -> f64 {
    if node.is_root {
        return options.max_priority;
    }
    if max_equity <= 0.0 {
        return options.min_priority;
    }
    let share = (node.link_equity / max_equity).clamp(0.0, 1.0);
    options.min_priority + (options.max_priority - options.min_priority) * share
}

pub(crate) fn render_xml(view: &GraphView, options: &SitemapOptions) -> String {
    let pages = sitemap_pages(view, options);
    let max_equity = pages.iter().map(|n| n.link_equity).fold(0.0, f64::max);

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(xml, "<urlset xmlns=\"{}\">", SITEMAP_NAMESPACE);
    for page in pages {
        xml.push_str("  <url>\n");
        let _ = writeln!(xml, "    <loc>{}</loc>", escape_xml(&page.url));
        if options.include_lastmod
            && let Some(crawled_at) = page.crawled_at
        {
            let _ = writeln!(xml, "    <lastmod>{}</lastmod>", crawled_at.format("%Y-%m-%d"));
        }
        if let Some(changefreq) = options.changefreq {
            let _ = writeln!(xml, "    <changefreq>{}</changefreq>", changefreq.as_str());
        }
        let _ = writeln!(
            xml,
            "    <priority>{:.1}</priority>",
            priority(page, max_equity, options)
        );
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

#[derive(Default)]
struct PathTree<'a> {
    /// Pages whose path ends here. Several URLs can share a path when they
    /// differ only in query string.
    pages: Vec<&'a Node>,
    children: BTreeMap<String, PathTree<'a>>,
}

impl<'a> PathTree<'a> {
    fn insert(&mut self, segments: &[&str], page: &'a Node) {
        match segments.split_first() {
            None => self.pages.push(page),
            Some((head, rest)) => self
                .children
                .entry(head.to_string())
                .or_default()
                .insert(rest, page),
        }
    }

    fn write(&self, html: &mut String, indent: usize) {
        if self.children.is_empty() {
            return;
        }
        let pad = "  ".repeat(indent);
        let _ = writeln!(html, "{}<ul>", pad);
        for (segment, child) in &self.children {
            match child.pages.first() {
                Some(page) => {
                    let _ = write!(html, "{}  <li>{}", pad, page_link(page));
                }
                None => {
                    let _ = write!(html, "{}  <li>{}/", pad, escape_xml(segment));
                }
            }
            if child.children.is_empty() {
                html.push_str("</li>\n");
            } else {
                html.push('\n');
                child.write(html, indent + 2);
                let _ = writeln!(html, "{}  </li>", pad);
            }
            for page in child.pages.iter().skip(1) {
                let _ = writeln!(html, "{}  <li>{}</li>", pad, page_link(page));
            }
        }
        let _ = writeln!(html, "{}</ul>", pad);
    }
}

fn page_link(page: &Node) -> String {
    format!(
        "<a href=\"{}\">{}</a>",
        escape_xml(&page.url),
        escape_xml(page.label())
    )
}

/// Human-readable sitemap: pages nested by URL path
pub(crate) fn render_html(view: &GraphView, options: &SitemapOptions) -> String {
    let mut pages = sitemap_pages(view, options);
    pages.sort_by(|a, b| a.url.cmp(&b.url));

    let mut tree = PathTree::default();
    for page in &pages {
        let path = url::Url::parse(&page.url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| page.path.clone());
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        tree.insert(&segments, page);
    }

    let title = options
        .title
        .clone()
        .or_else(|| view.graph.root().map(|r| format!("Sitemap: {}", r.label())))
        .unwrap_or_else(|| "Sitemap".to_string());

    let mut html = String::from("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("  <meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "  <title>{}</title>", escape_xml(&title));
    html.push_str("</head>\n<body>\n");
    let _ = writeln!(html, "  <h1>{}</h1>", escape_xml(&title));

    for home in &tree.pages {
        let _ = writeln!(html, "  <p>{}</p>", page_link(home));
    }
    tree.write(&mut html, 1);

    html.push_str("</body>\n</html>\n");
    html
}
